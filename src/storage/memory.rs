//! In-process record store.

use super::{RefreshRecordStore, RevocationStore, StorageError};
use crate::account::AccountId;
use crate::refresh::{RecordId, RefreshRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    records: HashMap<AccountId, Vec<RefreshRecord>>,
}

/// Record store kept in memory behind an async lock.
///
/// Records are lost on restart; meant for tests and single-node setups.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all accounts.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.values().map(Vec::len).sum()
    }

    /// Whether no record has been stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RefreshRecordStore for InMemoryRecordStore {
    async fn insert(&self, guid: AccountId, token_hash: String) -> Result<RecordId, StorageError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = RecordId(inner.next_id);
        inner
            .records
            .entry(guid)
            .or_default()
            .push(RefreshRecord::new(id, guid, token_hash));
        Ok(id)
    }

    async fn list_by_account(&self, guid: AccountId) -> Result<Vec<RefreshRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(&guid).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RevocationStore for InMemoryRecordStore {
    async fn revoke(&self, guid: AccountId, id: RecordId) -> Result<bool, StorageError> {
        let mut inner = self.inner.write().await;
        let revoked = inner
            .records
            .get_mut(&guid)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .is_some_and(RefreshRecord::revoke);
        Ok(revoked)
    }

    async fn revoke_all(&self, guid: AccountId) -> Result<u32, StorageError> {
        let mut inner = self.inner.write().await;
        let count = inner
            .records
            .get_mut(&guid)
            .map(|records| records.iter_mut().filter_map(|r| r.revoke().then_some(())).count())
            .unwrap_or(0);
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
