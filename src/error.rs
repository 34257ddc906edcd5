//! Error types for the token rotation service.
//!
//! Component errors (signer, hasher, storage, notifier) live next to the
//! component. `TokenError` is what the rotation engine returns to callers.

use thiserror::Error;

/// Errors surfaced by issuance and redemption.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Account identifier is not exactly 16 bytes.
    #[error("Invalid account id: got length {len}, expected 16")]
    InvalidAccountId {
        /// Length of the rejected identifier
        len: usize,
    },

    /// Signing an access or refresh token failed.
    #[error("Token generation failed: {0}")]
    TokenGenerationFailed(String),

    /// Digesting the refresh token failed.
    #[error("Hashing refresh token failed: {0}")]
    HashingFailed(String),

    /// The refresh record could not be stored.
    #[error("Saving refresh token failed: {0}")]
    PersistenceFailed(String),

    /// Presented refresh token is invalid, expired, or unknown.
    #[error("Refresh token unauthorized")]
    Unauthorized,

    /// Presented refresh token has been revoked.
    #[error("Refresh token revoked")]
    Revoked,

    /// Server-side failure during redemption.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller sent bad input (400)
    BadRequest,
    /// Authentication failed (401)
    Unauthenticated,
    /// Server-side fault (500)
    Internal,
}

impl TokenError {
    /// Create a token generation error.
    #[must_use]
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::TokenGenerationFailed(msg.into())
    }

    /// Create a hashing error.
    #[must_use]
    pub fn hashing(msg: impl Into<String>) -> Self {
        Self::HashingFailed(msg.into())
    }

    /// Create a persistence error.
    #[must_use]
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailed(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify the error for transport mapping.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidAccountId { .. } => ErrorClass::BadRequest,
            Self::Unauthorized | Self::Revoked => ErrorClass::Unauthenticated,
            Self::TokenGenerationFailed(_)
            | Self::HashingFailed(_)
            | Self::PersistenceFailed(_)
            | Self::Internal(_)
            | Self::Config(_) => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAccountId { .. } => TOKEN_INVALID_ACCOUNT_ID,
            Self::TokenGenerationFailed(_) => TOKEN_GENERATION_FAILED,
            Self::HashingFailed(_) => TOKEN_HASHING_FAILED,
            Self::PersistenceFailed(_) => TOKEN_PERSISTENCE_FAILED,
            Self::Unauthorized => TOKEN_UNAUTHORIZED,
            Self::Revoked => TOKEN_REVOKED,
            Self::Internal(_) => TOKEN_INTERNAL,
            Self::Config(_) => TOKEN_CONFIG,
        }
    }
}

// Error codes for transport responses and metrics labels
pub const TOKEN_INVALID_ACCOUNT_ID: &str = "TOKEN_INVALID_ACCOUNT_ID";
pub const TOKEN_GENERATION_FAILED: &str = "TOKEN_GENERATION_FAILED";
pub const TOKEN_HASHING_FAILED: &str = "TOKEN_HASHING_FAILED";
pub const TOKEN_PERSISTENCE_FAILED: &str = "TOKEN_PERSISTENCE_FAILED";
pub const TOKEN_UNAUTHORIZED: &str = "TOKEN_UNAUTHORIZED";
pub const TOKEN_REVOKED: &str = "TOKEN_REVOKED";
pub const TOKEN_INTERNAL: &str = "TOKEN_INTERNAL";
pub const TOKEN_CONFIG: &str = "TOKEN_CONFIG";
