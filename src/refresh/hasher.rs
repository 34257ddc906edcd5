//! One-way digests of refresh tokens.
//!
//! bcrypt only reads the first 72 bytes of its input. Both `digest` and
//! `matches` cut the input there explicitly so stored digests stay
//! verifiable no matter how the underlying crate handles longer input.

use thiserror::Error;

/// Number of input bytes bcrypt consumes.
pub const BCRYPT_INPUT_LIMIT: usize = 72;
/// Default work factor.
pub const DEFAULT_HASH_COST: u32 = 10;
/// Smallest work factor bcrypt accepts.
pub const MIN_HASH_COST: u32 = 4;
/// Largest work factor bcrypt accepts.
pub const MAX_HASH_COST: u32 = 31;

/// Digest failures.
#[derive(Error, Debug)]
pub enum HashError {
    /// Cost outside `MIN_HASH_COST..=MAX_HASH_COST`.
    #[error("Invalid hash cost {0}, expected {MIN_HASH_COST}..={MAX_HASH_COST}")]
    InvalidCost(u32),

    /// The bcrypt primitive failed.
    #[error("Hashing failed: {0}")]
    Failed(String),
}

/// Salted, cost-tunable refresh token hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTokenHasher {
    cost: u32,
}

impl Default for RefreshTokenHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_HASH_COST }
    }
}

impl RefreshTokenHasher {
    /// Create a hasher with the given bcrypt cost.
    ///
    /// # Errors
    ///
    /// Returns `HashError::InvalidCost` if `cost` is out of range.
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&cost) {
            return Err(HashError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    /// Configured work factor.
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Produce a salted digest of `token`.
    ///
    /// # Errors
    ///
    /// Returns `HashError::Failed` if bcrypt rejects the input.
    pub fn digest(&self, token: &str) -> Result<String, HashError> {
        bcrypt::hash(truncate(token.as_bytes()), self.cost).map_err(|e| HashError::Failed(e.to_string()))
    }

    /// Check `candidate` against a stored digest. Malformed digests never match.
    #[must_use]
    pub fn matches(&self, candidate: &str, digest: &str) -> bool {
        bcrypt::verify(truncate(candidate.as_bytes()), digest).unwrap_or(false)
    }
}

fn truncate(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(BCRYPT_INPUT_LIMIT)]
}
