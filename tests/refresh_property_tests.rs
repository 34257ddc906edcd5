//! Property-based and scenario tests for issuance and redemption.
//!
//! Property 8: Invalid Account Ids Are Rejected Without Writes
//! Property 9: Issued Pair Shape
//! Property 10: Rotation Produces A Fresh Pair
//! Property 11: Expired, Unknown, Revoked Tokens Are Refused
//! Property 12: IP Change Alerts Without Blocking

use async_trait::async_trait;
use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use token_rotation::jwt::{SigningSecret, TokenKind, TokenSigner, TokenTtls};
use token_rotation::notify::{Notifier, NotifyError};
use token_rotation::refresh::hasher::MIN_HASH_COST;
use token_rotation::refresh::{RecordId, RefreshRecord, RefreshTokenHasher};
use token_rotation::storage::{
    InMemoryRecordStore, RefreshRecordStore, RevocationStore, StorageError,
};
use token_rotation::{AccountId, RotationEngine, RotationPolicy, TokenError};

const SECRET: &[u8] = b"refresh-property-test-secret";
const GUID: &[u8] = b"0123456789abcdef";

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Alerts are detached; give them a moment to land.
    async fn wait_for(&self, count: usize) -> Vec<(String, String, String)> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), subject.to_string(), body.to_string()));
        if self.fail {
            return Err(NotifyError::Delivery("mail gateway unreachable".to_string()));
        }
        Ok(())
    }
}

/// Store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl RefreshRecordStore for BrokenStore {
    async fn insert(&self, _: AccountId, _: String) -> Result<RecordId, StorageError> {
        Err(StorageError::Backend("connection refused".to_string()))
    }

    async fn list_by_account(&self, _: AccountId) -> Result<Vec<RefreshRecord>, StorageError> {
        Err(StorageError::Backend("connection refused".to_string()))
    }
}

#[async_trait]
impl RevocationStore for BrokenStore {
    async fn revoke(&self, _: AccountId, _: RecordId) -> Result<bool, StorageError> {
        Err(StorageError::Backend("connection refused".to_string()))
    }

    async fn revoke_all(&self, _: AccountId) -> Result<u32, StorageError> {
        Err(StorageError::Backend("connection refused".to_string()))
    }
}

/// In-memory store whose inserts can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryRecordStore,
    fail_inserts: AtomicBool,
}

#[async_trait]
impl RefreshRecordStore for FlakyStore {
    async fn insert(&self, guid: AccountId, token_hash: String) -> Result<RecordId, StorageError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("down".to_string()));
        }
        self.inner.insert(guid, token_hash).await
    }

    async fn list_by_account(&self, guid: AccountId) -> Result<Vec<RefreshRecord>, StorageError> {
        self.inner.list_by_account(guid).await
    }
}

#[async_trait]
impl RevocationStore for FlakyStore {
    async fn revoke(&self, guid: AccountId, id: RecordId) -> Result<bool, StorageError> {
        self.inner.revoke(guid, id).await
    }

    async fn revoke_all(&self, guid: AccountId) -> Result<u32, StorageError> {
        self.inner.revoke_all(guid).await
    }
}

struct Harness {
    engine: RotationEngine,
    store: Arc<InMemoryRecordStore>,
    notifier: Arc<RecordingNotifier>,
    signer: TokenSigner,
}

fn signer() -> TokenSigner {
    TokenSigner::new(&SigningSecret::new(SECRET.to_vec()), TokenTtls::default())
}

fn harness_with(policy: RotationPolicy, notifier: RecordingNotifier) -> Harness {
    let store = Arc::new(InMemoryRecordStore::new());
    let notifier = Arc::new(notifier);
    let engine = RotationEngine::new(
        signer(),
        RefreshTokenHasher::new(MIN_HASH_COST).unwrap(),
        store.clone(),
        notifier.clone(),
        policy,
    );
    Harness {
        engine,
        store,
        notifier,
        signer: signer(),
    }
}

fn harness() -> Harness {
    harness_with(RotationPolicy::default(), RecordingNotifier::default())
}

fn broken_engine() -> RotationEngine {
    RotationEngine::new(
        signer(),
        RefreshTokenHasher::new(MIN_HASH_COST).unwrap(),
        Arc::new(BrokenStore),
        Arc::new(RecordingNotifier::default()),
        RotationPolicy::default(),
    )
}

fn account() -> AccountId {
    AccountId::from_bytes(GUID).unwrap()
}

/// Byte strings of any length except 16.
fn arb_invalid_account() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64).prop_filter("length must not be 16", |v| v.len() != 16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property 8: any identifier not exactly 16 bytes is rejected and
    /// nothing is written.
    #[test]
    fn prop_invalid_account_rejected_without_writes(bytes in arb_invalid_account()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = harness();
            let result = h.engine.issue_pair(&bytes, "1.1.1.1").await;

            prop_assert!(
                matches!(result, Err(TokenError::InvalidAccountId { len }) if len == bytes.len()),
                "expected InvalidAccountId"
            );
            prop_assert!(h.store.is_empty().await);
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property 9: access tokens are `access` with a 15 minute window,
    /// refresh tokens `refresh` with 4320 minutes, both for the caller IP.
    #[test]
    fn prop_issued_pair_shape(
        guid in prop::array::uniform16(any::<u8>()),
        ip in "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}",
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = harness();
            let before = Utc::now().timestamp();
            let pair = h.engine.issue_pair(&guid, &ip).await.unwrap();
            let after = Utc::now().timestamp();

            let access = h.signer.verify(&pair.access_token, Utc::now()).unwrap();
            let refresh = h.signer.verify(&pair.refresh_token, Utc::now()).unwrap();

            prop_assert_eq!(access.kind, TokenKind::Access);
            prop_assert_eq!(refresh.kind, TokenKind::Refresh);
            prop_assert!(access.exp >= before + 15 * 60 && access.exp <= after + 15 * 60);
            prop_assert!(refresh.exp >= before + 4320 * 60 && refresh.exp <= after + 4320 * 60);
            prop_assert_eq!(refresh.exp - access.exp, (4320 - 15) * 60);
            prop_assert_eq!(access.guid.as_uuid().as_bytes(), &guid);
            prop_assert_eq!(&refresh.ip, &ip);

            let records = h.store.list_by_account(access.guid).await.unwrap();
            prop_assert_eq!(records.len(), 1);
            prop_assert!(!records[0].revoked);
            prop_assert!(!records[0].token_hash.contains(&pair.refresh_token));
            Ok(())
        })?;
    }

    /// Property 10: a chain of rotations always yields fresh, redeemable
    /// pairs and one record per issuance.
    #[test]
    fn prop_rotation_chain(rotations in 1usize..5) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = harness();
            let mut current = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

            for _ in 0..rotations {
                let next = h.engine.redeem(&current.refresh_token, "1.1.1.1").await.unwrap();
                prop_assert_ne!(&next.refresh_token, &current.refresh_token);
                prop_assert_ne!(&next.access_token, &current.access_token);
                current = next;
            }

            prop_assert_eq!(h.store.len().await, rotations + 1);
            prop_assert!(h.notifier.sent().is_empty());
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_issue_then_redeem_scenario() {
    let h = harness();

    let first = h.engine.issue_pair(b"0123456789abcdef", "1.1.1.1").await.unwrap();
    let second = h.engine.redeem(&first.refresh_token, "1.1.1.1").await.unwrap();

    assert_ne!(second.refresh_token, first.refresh_token);
    let claims = h.signer.verify(&second.refresh_token, Utc::now()).unwrap();
    assert_eq!(claims.guid, account());
    assert_eq!(claims.ip, "1.1.1.1");
}

#[tokio::test]
async fn test_expired_token_unauthorized_without_writes() {
    let h = harness();
    h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let long_ago = Utc::now() - Duration::minutes(4321);
    let expired = h
        .signer
        .issue(TokenKind::Refresh, account(), "1.1.1.1", long_ago)
        .unwrap();

    let result = h.engine.redeem(&expired, "1.1.1.1").await;
    assert!(matches!(result, Err(TokenError::Unauthorized)));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_revoked_token_refused() {
    let h = harness();
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();
    h.store.revoke_all(account()).await.unwrap();

    let result = h.engine.redeem(&pair.refresh_token, "1.1.1.1").await;
    assert!(matches!(result, Err(TokenError::Revoked)));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_only_matching_record_decides_revocation() {
    let h = harness();
    let old = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();
    let records = h.store.list_by_account(account()).await.unwrap();
    h.store.revoke(account(), records[0].id).await.unwrap();

    let fresh = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    assert!(matches!(
        h.engine.redeem(&old.refresh_token, "1.1.1.1").await,
        Err(TokenError::Revoked)
    ));
    assert!(h.engine.redeem(&fresh.refresh_token, "1.1.1.1").await.is_ok());
}

#[tokio::test]
async fn test_signed_but_unrecorded_token_unauthorized() {
    let h = harness();
    h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let unrecorded = h
        .signer
        .issue(TokenKind::Refresh, account(), "1.1.1.1", Utc::now())
        .unwrap();

    let result = h.engine.redeem(&unrecorded, "1.1.1.1").await;
    assert!(matches!(result, Err(TokenError::Unauthorized)));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_access_token_cannot_be_redeemed() {
    let h = harness();
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let result = h.engine.redeem(&pair.access_token, "1.1.1.1").await;
    assert!(matches!(result, Err(TokenError::Unauthorized)));
}

#[tokio::test]
async fn test_garbage_token_unauthorized() {
    let h = harness();
    let result = h.engine.redeem("definitely.not.a-token", "1.1.1.1").await;
    assert!(matches!(result, Err(TokenError::Unauthorized)));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_ip_change_alerts_once_and_still_rotates() {
    let h = harness();
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let rotated = h.engine.redeem(&pair.refresh_token, "2.2.2.2").await.unwrap();

    let claims = h.signer.verify(&rotated.refresh_token, Utc::now()).unwrap();
    assert_eq!(claims.ip, "2.2.2.2");

    let sent = h.notifier.wait_for(1).await;
    assert_eq!(
        sent,
        vec![(
            "username@example.com".to_string(),
            "Security alert".to_string(),
            "Access from unknown IP: 2.2.2.2".to_string(),
        )]
    );
}

#[tokio::test]
async fn test_failing_notifier_does_not_block_redemption() {
    let h = harness_with(RotationPolicy::default(), RecordingNotifier::failing());
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let result = h.engine.redeem(&pair.refresh_token, "9.9.9.9").await;
    assert!(result.is_ok());
    assert_eq!(h.notifier.wait_for(1).await.len(), 1);
}

#[tokio::test]
async fn test_alert_recipient_follows_policy() {
    let policy = RotationPolicy {
        alert_recipient: "security@example.org".to_string(),
        ..RotationPolicy::default()
    };
    let h = harness_with(policy, RecordingNotifier::default());
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();
    h.engine.redeem(&pair.refresh_token, "3.3.3.3").await.unwrap();

    let sent = h.notifier.wait_for(1).await;
    assert_eq!(sent[0].0, "security@example.org");
}

#[tokio::test]
async fn test_default_policy_keeps_consumed_token_active() {
    let h = harness();
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    assert!(h.engine.redeem(&pair.refresh_token, "1.1.1.1").await.is_ok());
    assert!(h.engine.redeem(&pair.refresh_token, "1.1.1.1").await.is_ok());
    assert!(h
        .store
        .list_by_account(account())
        .await
        .unwrap()
        .iter()
        .all(|r| !r.revoked));
}

#[tokio::test]
async fn test_revoke_on_redeem_makes_tokens_single_use() {
    let policy = RotationPolicy {
        revoke_on_redeem: true,
        ..RotationPolicy::default()
    };
    let h = harness_with(policy, RecordingNotifier::default());
    let first = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let second = h.engine.redeem(&first.refresh_token, "1.1.1.1").await.unwrap();
    assert!(matches!(
        h.engine.redeem(&first.refresh_token, "1.1.1.1").await,
        Err(TokenError::Revoked)
    ));
    assert!(h.engine.redeem(&second.refresh_token, "1.1.1.1").await.is_ok());
}

#[tokio::test]
async fn test_failed_rotation_keeps_consumed_token_redeemable() {
    let store = Arc::new(FlakyStore::default());
    let engine = RotationEngine::new(
        signer(),
        RefreshTokenHasher::new(MIN_HASH_COST).unwrap(),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        RotationPolicy {
            revoke_on_redeem: true,
            ..RotationPolicy::default()
        },
    );
    let pair = engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    store.fail_inserts.store(true, Ordering::SeqCst);
    assert!(matches!(
        engine.redeem(&pair.refresh_token, "1.1.1.1").await,
        Err(TokenError::Internal(_))
    ));
    assert!(store
        .list_by_account(account())
        .await
        .unwrap()
        .iter()
        .all(|r| !r.revoked));

    store.fail_inserts.store(false, Ordering::SeqCst);
    assert!(engine.redeem(&pair.refresh_token, "1.1.1.1").await.is_ok());
    assert!(matches!(
        engine.redeem(&pair.refresh_token, "1.1.1.1").await,
        Err(TokenError::Revoked)
    ));
}

#[tokio::test]
async fn test_concurrent_single_use_redemption_has_one_winner() {
    let policy = RotationPolicy {
        revoke_on_redeem: true,
        ..RotationPolicy::default()
    };
    let h = Arc::new(harness_with(policy, RecordingNotifier::default()));
    let pair = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let h = Arc::clone(&h);
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { h.engine.redeem(&token, "1.1.1.1").await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, TokenError::Revoked), "unexpected {e:?}"),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_revoke_all_tokens() {
    let h = harness();
    let first = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();
    let second = h.engine.issue_pair(GUID, "1.1.1.1").await.unwrap();

    assert_eq!(h.engine.revoke_all_tokens(GUID).await.unwrap(), 2);
    assert_eq!(h.engine.revoke_all_tokens(GUID).await.unwrap(), 0);
    assert!(matches!(
        h.engine.revoke_all_tokens(b"short").await,
        Err(TokenError::InvalidAccountId { len: 5 })
    ));

    for pair in [first, second] {
        assert!(matches!(
            h.engine.redeem(&pair.refresh_token, "1.1.1.1").await,
            Err(TokenError::Revoked)
        ));
    }
}

#[tokio::test]
async fn test_storage_failures() {
    let engine = broken_engine();
    assert!(matches!(
        engine.issue_pair(GUID, "1.1.1.1").await,
        Err(TokenError::PersistenceFailed(_))
    ));

    let token = signer()
        .issue(TokenKind::Refresh, account(), "1.1.1.1", Utc::now())
        .unwrap();
    assert!(matches!(
        engine.redeem(&token, "1.1.1.1").await,
        Err(TokenError::Internal(_))
    ));
    assert!(matches!(
        engine.revoke_all_tokens(GUID).await,
        Err(TokenError::PersistenceFailed(_))
    ));
}

#[tokio::test]
async fn test_concurrent_issue_and_redeem() {
    let h = Arc::new(harness());

    let mut handles = Vec::new();
    for i in 0..8 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            let ip = format!("10.0.0.{i}");
            let pair = h.engine.issue_pair(GUID, &ip).await.unwrap();
            h.engine.redeem(&pair.refresh_token, &ip).await.unwrap()
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(h.store.len().await, 16);
}
