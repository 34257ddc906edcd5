use crate::account::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate key of a stored refresh record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Persisted trace of one issued refresh token.
///
/// Only the bcrypt digest of the token is kept. `revoked` is the single
/// mutable field and only ever moves from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub id: RecordId,
    pub guid: AccountId,
    pub token_hash: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn new(id: RecordId, guid: AccountId, token_hash: String) -> Self {
        let now = Utc::now();
        RefreshRecord {
            id,
            guid,
            token_hash,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark revoked. Returns false if it already was.
    pub fn revoke(&mut self) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.updated_at = Utc::now();
        true
    }
}
