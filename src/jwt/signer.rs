//! HMAC token signing and verification.
//!
//! Access tokens are signed with HS512 and refresh tokens with HS256,
//! both keyed with the process-wide secret. Verification accepts only the
//! HMAC family and additionally requires the header algorithm to match the
//! algorithm assigned to the token's claimed kind.

use crate::account::AccountId;
use crate::jwt::claims::{Claims, TokenKind};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Algorithms accepted on verification.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Length of a generated development secret.
const GENERATED_SECRET_LEN: usize = 64;

/// Signing and verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// Token is past its `exp` claim.
    #[error("Token expired")]
    Expired,

    /// Signature does not verify, or the token is malformed.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Header names an algorithm outside the accepted HMAC family.
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Encoding a new token failed.
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Process-wide signing secret. Zeroed on drop, never printed.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Wrap secret bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    /// Generate a random secret for development use.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; GENERATED_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Secret length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

/// Validity windows per token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    /// Access token lifetime
    pub access: Duration,
    /// Refresh token lifetime
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: TokenKind::Access.default_ttl(),
            refresh: TokenKind::Refresh.default_ttl(),
        }
    }
}

impl TokenTtls {
    /// Lifetime for the given kind.
    #[must_use]
    pub const fn for_kind(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access,
            TokenKind::Refresh => self.refresh,
        }
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Creates and verifies signed tokens.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttls: TokenTtls,
}

impl TokenSigner {
    /// Create a signer keyed with `secret`.
    #[must_use]
    pub fn new(secret: &SigningSecret, ttls: TokenTtls) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.expose()),
            decoding_key: DecodingKey::from_secret(secret.expose()),
            ttls,
        }
    }

    /// Configured validity windows.
    #[must_use]
    pub const fn ttls(&self) -> &TokenTtls {
        &self.ttls
    }

    /// Sign a new token of `kind` for `account`, expiring `ttl(kind)` after `now`.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::Encoding` if the claims cannot be encoded.
    pub fn issue(
        &self,
        kind: TokenKind,
        account: AccountId,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SignerError> {
        let claims = Claims::new(kind, account, client_ip, now + self.ttls.for_kind(kind));
        encode(&Header::new(kind.algorithm()), &claims, &self.encoding_key)
            .map_err(|e| SignerError::Encoding(e.to_string()))
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm` if the header names a non-HMAC algorithm
    /// - `InvalidSignature` if the token is malformed, the signature does not
    ///   verify, or the algorithm does not belong to the claimed kind
    /// - `Expired` if `exp <= now`
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SignerError> {
        let algorithm = header_algorithm(token)?;

        let mut validation = Validation::new(algorithm);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidAlgorithm => SignerError::UnsupportedAlgorithm(format!("{algorithm:?}")),
                _ => SignerError::InvalidSignature,
            }
        })?;

        if data.header.alg != data.claims.kind.algorithm() {
            return Err(SignerError::InvalidSignature);
        }

        if data.claims.is_expired_at(now) {
            return Err(SignerError::Expired);
        }

        Ok(data.claims)
    }
}

/// Read the header algorithm without trusting anything else in the token.
fn header_algorithm(token: &str) -> Result<Algorithm, SignerError> {
    let encoded = token.split('.').next().ok_or(SignerError::InvalidSignature)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SignerError::InvalidSignature)?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|_| SignerError::InvalidSignature)?;

    match header.alg.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(SignerError::UnsupportedAlgorithm(header.alg)),
    }
}
