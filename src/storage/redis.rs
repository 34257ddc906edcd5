//! Redis-backed record store.
//!
//! Layout: one hash per account at `refresh_records:{guid}` whose fields
//! are record ids and whose values are JSON-encoded records. Ids come from
//! a global counter at `refresh_records:next_id`. Revocation flips the
//! flag inside a Lua script so concurrent callers see exactly one winner.

use super::{RefreshRecordStore, RevocationStore, StorageError};
use crate::account::AccountId;
use crate::refresh::{RecordId, RefreshRecord};
use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use ::redis::Script;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::debug;

const NEXT_ID_KEY: &str = "refresh_records:next_id";

/// KEYS[1] = account hash, ARGV[1] = record id, ARGV[2] = RFC 3339 timestamp.
/// Returns 1 if the record was active and is now revoked, else 0.
static REVOKE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
if not raw then
  return 0
end
local record = cjson.decode(raw)
if record.revoked then
  return 0
end
record.revoked = true
record.updated_at = ARGV[2]
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(record))
return 1
",
    )
});

fn records_key(guid: AccountId) -> String {
    format!("refresh_records:{guid}")
}

/// Record store on top of a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisRecordStore {
    conn: ConnectionManager,
}

impl RedisRecordStore {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the URL is invalid or the server
    /// is unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    async fn flip_revoked(&self, guid: AccountId, id: RecordId) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();
        let mut invocation = REVOKE_SCRIPT.key(records_key(guid));
        invocation.arg(id.0).arg(Utc::now().to_rfc3339());
        let flipped: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(flipped == 1)
    }

    async fn put(&self, record: &RefreshRecord) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(record)?;
        let _: () = conn.hset(records_key(record.guid), record.id.0, value).await?;
        Ok(())
    }
}

#[async_trait]
impl RefreshRecordStore for RedisRecordStore {
    async fn insert(&self, guid: AccountId, token_hash: String) -> Result<RecordId, StorageError> {
        let mut conn = self.conn.clone();
        let id: u64 = conn.incr(NEXT_ID_KEY, 1u64).await?;
        let record = RefreshRecord::new(RecordId(id), guid, token_hash);
        self.put(&record).await?;

        debug!(guid = %guid, record_id = %record.id, "Stored refresh record");
        Ok(record.id)
    }

    async fn list_by_account(&self, guid: AccountId) -> Result<Vec<RefreshRecord>, StorageError> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.hvals(records_key(guid)).await?;

        let mut records = values
            .iter()
            .map(|v| serde_json::from_str::<RefreshRecord>(v))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

#[async_trait]
impl RevocationStore for RedisRecordStore {
    async fn revoke(&self, guid: AccountId, id: RecordId) -> Result<bool, StorageError> {
        self.flip_revoked(guid, id).await
    }

    async fn revoke_all(&self, guid: AccountId) -> Result<u32, StorageError> {
        let mut count = 0u32;
        for record in self.list_by_account(guid).await? {
            if !record.revoked && self.flip_revoked(guid, record.id).await? {
                count += 1;
            }
        }
        Ok(count)
    }
}
