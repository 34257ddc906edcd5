//! Refresh record persistence.
//!
//! The rotation path needs only `insert` and `list_by_account`.
//! Revocation is an administrative concern kept in its own trait.

pub mod memory;
pub mod redis;

use crate::account::AccountId;
use crate::refresh::{RecordId, RefreshRecord};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryRecordStore;
pub use self::redis::RedisRecordStore;

/// Storage backend failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend rejected or failed the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored record could not be encoded or decoded.
    #[error("Record serialization error: {0}")]
    Serialization(String),
}

impl From<::redis::RedisError> for StorageError {
    fn from(err: ::redis::RedisError) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Durable collection of issued refresh token records.
///
/// A successful `insert` must be visible to every `list_by_account`
/// that starts after it returns.
#[async_trait]
pub trait RefreshRecordStore: Send + Sync {
    /// Store a new, non-revoked record and return its id.
    async fn insert(&self, guid: AccountId, token_hash: String) -> Result<RecordId, StorageError>;

    /// All records of `guid`, ordered by id.
    async fn list_by_account(&self, guid: AccountId) -> Result<Vec<RefreshRecord>, StorageError>;
}

/// Administrative revocation of stored records.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoke one record. Returns true if it was active before the call.
    async fn revoke(&self, guid: AccountId, id: RecordId) -> Result<bool, StorageError>;

    /// Revoke every record of `guid`. Returns how many were newly revoked.
    async fn revoke_all(&self, guid: AccountId) -> Result<u32, StorageError>;
}

/// A store usable by the rotation engine.
pub trait RecordStore: RefreshRecordStore + RevocationStore {}

impl<T: RefreshRecordStore + RevocationStore> RecordStore for T {}
