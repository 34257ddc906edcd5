//! Issuance and redemption of access/refresh token pairs.
//!
//! Every issued refresh token leaves a bcrypt digest in the record store.
//! Redemption verifies the token, finds its record among the account's
//! records, refuses revoked ones and mints a fresh pair. A change of client
//! IP between issuance and redemption raises an alert but does not block
//! the redemption.

use crate::account::AccountId;
use crate::error::TokenError;
use crate::jwt::{Claims, TokenKind, TokenSigner};
use crate::metrics;
use crate::notify::{self, Notifier};
use crate::refresh::hasher::RefreshTokenHasher;
use crate::refresh::record::RefreshRecord;
use crate::storage::RecordStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default recipient of IP change alerts.
pub const DEFAULT_ALERT_RECIPIENT: &str = "username@example.com";
/// Subject line of IP change alerts.
pub const ALERT_SUBJECT: &str = "Security alert";

/// Freshly issued token pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Knobs for redemption behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Revoke the consumed refresh record on successful redemption.
    pub revoke_on_redeem: bool,
    /// Where IP change alerts go.
    pub alert_recipient: String,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            revoke_on_redeem: false,
            alert_recipient: DEFAULT_ALERT_RECIPIENT.to_string(),
        }
    }
}

pub struct RotationEngine {
    signer: TokenSigner,
    hasher: RefreshTokenHasher,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    policy: RotationPolicy,
}

impl RotationEngine {
    pub fn new(
        signer: TokenSigner,
        hasher: RefreshTokenHasher,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        policy: RotationPolicy,
    ) -> Self {
        RotationEngine {
            signer,
            hasher,
            store,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Issue and persist a new pair for the raw account id.
    ///
    /// Nothing is returned unless the refresh record was stored: a refresh
    /// token without a record could never be redeemed.
    pub async fn issue_pair(&self, account_id: &[u8], client_ip: &str) -> Result<TokenPair, TokenError> {
        let guid = AccountId::from_bytes(account_id)?;
        self.issue_for(guid, client_ip).await
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// Any issuance failure at the end of a redemption is reported as
    /// `TokenError::Internal`.
    pub async fn redeem(&self, refresh_token: &str, caller_ip: &str) -> Result<TokenPair, TokenError> {
        let result = self.redeem_inner(refresh_token, caller_ip).await;
        metrics::record_redemption(match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        });
        result
    }

    /// Administratively revoke every refresh record of an account.
    ///
    /// Library-only entry point for operator tooling; the HTTP router does
    /// not expose it.
    pub async fn revoke_all_tokens(&self, account_id: &[u8]) -> Result<u32, TokenError> {
        let guid = AccountId::from_bytes(account_id)?;
        let count = self.store.revoke_all(guid).await.map_err(|e| {
            error!(guid = %guid, error = %e, "Revoking refresh records failed");
            TokenError::persistence(e.to_string())
        })?;

        metrics::record_tokens_revoked("admin", count);
        info!(guid = %guid, count = %count, "Revoked all refresh records of account");
        Ok(count)
    }

    async fn redeem_inner(&self, refresh_token: &str, caller_ip: &str) -> Result<TokenPair, TokenError> {
        let claims = self.signer.verify(refresh_token, Utc::now()).map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            TokenError::Unauthorized
        })?;

        if claims.kind != TokenKind::Refresh {
            warn!(guid = %claims.guid, kind = claims.kind.as_str(), "Non-refresh token presented for redemption");
            return Err(TokenError::Unauthorized);
        }

        if claims.ip != caller_ip {
            self.alert_ip_change(&claims, caller_ip);
        }

        let records = self.store.list_by_account(claims.guid).await.map_err(|e| {
            error!(guid = %claims.guid, error = %e, "Loading refresh records failed");
            TokenError::internal(e.to_string())
        })?;

        let Some(record) = self.find_record(refresh_token, records).await? else {
            warn!(guid = %claims.guid, "Refresh token has no stored record");
            return Err(TokenError::Unauthorized);
        };

        if record.revoked {
            warn!(guid = %claims.guid, record_id = %record.id, "Revoked refresh token presented");
            return Err(TokenError::Revoked);
        }

        // A failed insert must leave the presented token redeemable.
        let pair = self
            .issue_for(claims.guid, caller_ip)
            .await
            .map_err(|e| TokenError::internal(e.to_string()))?;

        if self.policy.revoke_on_redeem {
            let revoked = self.store.revoke(claims.guid, record.id).await.map_err(|e| {
                error!(guid = %claims.guid, record_id = %record.id, error = %e, "Revoking consumed record failed");
                TokenError::internal(e.to_string())
            })?;
            // Lost a race with a concurrent redemption of the same token.
            // The record inserted above is unreachable once its token is dropped.
            if !revoked {
                warn!(guid = %claims.guid, record_id = %record.id, "Refresh token already consumed");
                return Err(TokenError::Revoked);
            }
            metrics::record_tokens_revoked("rotation", 1);
        }

        info!(guid = %claims.guid, record_id = %record.id, "Rotated refresh token");
        Ok(pair)
    }

    async fn issue_for(&self, guid: AccountId, client_ip: &str) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_token = self
            .signer
            .issue(TokenKind::Access, guid, client_ip, now)
            .map_err(|e| TokenError::generation(e.to_string()))?;
        let refresh_token = self
            .signer
            .issue(TokenKind::Refresh, guid, client_ip, now)
            .map_err(|e| TokenError::generation(e.to_string()))?;

        let token_hash = self.digest(refresh_token.clone()).await?;

        let record_id = self.store.insert(guid, token_hash).await.map_err(|e| {
            error!(guid = %guid, error = %e, "Saving refresh record failed");
            TokenError::persistence(e.to_string())
        })?;

        metrics::record_token_issued(TokenKind::Access.as_str());
        metrics::record_token_issued(TokenKind::Refresh.as_str());
        info!(guid = %guid, record_id = %record_id, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    // bcrypt is CPU bound; keep it off the async workers.
    async fn digest(&self, token: String) -> Result<String, TokenError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.digest(&token))
            .await
            .map_err(|e| TokenError::hashing(e.to_string()))?
            .map_err(|e| TokenError::hashing(e.to_string()))
    }

    async fn find_record(
        &self,
        token: &str,
        records: Vec<RefreshRecord>,
    ) -> Result<Option<RefreshRecord>, TokenError> {
        let hasher = self.hasher;
        let token = token.to_owned();
        tokio::task::spawn_blocking(move || {
            records
                .into_iter()
                .find(|record| hasher.matches(&token, &record.token_hash))
        })
        .await
        .map_err(|e| TokenError::internal(e.to_string()))
    }

    fn alert_ip_change(&self, claims: &Claims, caller_ip: &str) {
        metrics::record_ip_anomaly();
        warn!(
            guid = %claims.guid,
            issued_ip = %claims.ip,
            caller_ip = %caller_ip,
            "Refresh token presented from a different IP"
        );

        notify::dispatch(
            Arc::clone(&self.notifier),
            self.policy.alert_recipient.clone(),
            ALERT_SUBJECT.to_string(),
            format!("Access from unknown IP: {caller_ip}"),
        );
    }
}
