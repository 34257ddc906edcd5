use crate::account::AccountId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// Default access token lifetime.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
/// Default refresh token lifetime (72 hours).
pub const REFRESH_TOKEN_TTL_MINUTES: i64 = 4320;

/// Kind of a signed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived resource credential
    Access,
    /// Credential exchanged for a new pair
    Refresh,
}

impl TokenKind {
    /// Signing algorithm assigned to this kind.
    ///
    /// Access and refresh tokens never share an algorithm, so one kind
    /// cannot be passed off as the other.
    #[must_use]
    pub const fn algorithm(self) -> Algorithm {
        match self {
            Self::Access => Algorithm::HS512,
            Self::Refresh => Algorithm::HS256,
        }
    }

    /// Default validity window.
    #[must_use]
    pub fn default_ttl(self) -> Duration {
        match self {
            Self::Access => Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            Self::Refresh => Duration::minutes(REFRESH_TOKEN_TTL_MINUTES),
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Claim set embedded in every token.
///
/// `jti` is serialized first: only the leading 72 bytes of a refresh token
/// reach the digest, and they must differ between tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub jti: String,
    pub guid: AccountId,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub ip: String,
    pub exp: i64,
}

impl Claims {
    pub fn new(kind: TokenKind, guid: AccountId, ip: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            guid,
            kind,
            ip: ip.into(),
            exp: expires_at.timestamp(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
