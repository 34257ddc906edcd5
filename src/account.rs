//! Account identifier ("guid").

use crate::error::TokenError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Required length of a raw account identifier.
pub const ACCOUNT_ID_LEN: usize = 16;

/// Opaque 16-byte account identifier.
///
/// Raw bytes are carried as a UUID so the identifier has a stable textual
/// form inside token claims and storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Build an identifier from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidAccountId` unless `bytes` is exactly
    /// 16 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| TokenError::InvalidAccountId { len: bytes.len() })
    }

    /// The identifier as a UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for AccountId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}
