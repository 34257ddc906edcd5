//! Centralized configuration for the token rotation service.
//!
//! All configuration is loaded from environment variables (optionally via
//! a `.env` file) and validated at startup.

use crate::error::TokenError;
use crate::jwt::{SigningSecret, TokenTtls};
use crate::refresh::hasher::{RefreshTokenHasher, DEFAULT_HASH_COST};
use crate::refresh::rotator::{RotationPolicy, DEFAULT_ALERT_RECIPIENT};
use chrono::Duration;
use std::env;

/// Default sender address of security alerts.
pub const DEFAULT_ALERT_SENDER: &str = "support@goauth.com";

/// Where refresh records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process memory
    Memory,
    /// Redis server
    Redis {
        /// Connection URL
        url: String,
    },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    // Token settings
    /// HMAC secret shared by both token kinds
    pub jwt_secret: SigningSecret,
    /// Whether `jwt_secret` was generated because none was configured
    pub jwt_secret_generated: bool,
    /// Validity windows
    pub token_ttls: TokenTtls,
    /// bcrypt work factor for refresh digests
    pub hash_cost: u32,

    // Storage
    /// Record store backend
    pub store: StoreBackend,

    // Alerts and rotation
    /// Recipient of IP change alerts
    pub alert_recipient: String,
    /// Sender of IP change alerts
    pub alert_sender: String,
    /// Revoke the consumed record on redemption
    pub revoke_on_redeem: bool,

    // Logging
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, TokenError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TokenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port = parse_var(&lookup, "PORT", 3000)?;

        let (jwt_secret, jwt_secret_generated) = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => (SigningSecret::new(secret.into_bytes()), false),
            Some(_) => return Err(TokenError::config("JWT_SECRET must not be empty")),
            None => (SigningSecret::generate(), true),
        };

        let token_ttls = TokenTtls {
            access: Duration::seconds(parse_var(&lookup, "ACCESS_TOKEN_TTL", 900)?),
            refresh: Duration::seconds(parse_var(&lookup, "REFRESH_TOKEN_TTL", 259_200)?),
        };
        if token_ttls.access <= Duration::zero() || token_ttls.refresh <= Duration::zero() {
            return Err(TokenError::config("Token TTLs must be positive"));
        }

        let hash_cost = parse_var(&lookup, "HASH_COST", DEFAULT_HASH_COST)?;
        RefreshTokenHasher::new(hash_cost).map_err(|e| TokenError::config(e.to_string()))?;

        let store = match var("STORE_BACKEND", "memory").to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis {
                url: var("REDIS_URL", "redis://127.0.0.1:6379"),
            },
            other => {
                return Err(TokenError::config(format!("Invalid STORE_BACKEND: {other}")));
            }
        };

        Ok(Self {
            host,
            port,
            jwt_secret,
            jwt_secret_generated,
            token_ttls,
            hash_cost,
            store,
            alert_recipient: var("ALERT_RECIPIENT", DEFAULT_ALERT_RECIPIENT),
            alert_sender: var("ALERT_SENDER", DEFAULT_ALERT_SENDER),
            revoke_on_redeem: parse_var(&lookup, "REVOKE_ON_REDEEM", false)?,
            log_level: var("LOG_LEVEL", "info"),
            log_json: parse_var(&lookup, "LOG_JSON", false)?,
        })
    }

    /// Rotation policy derived from this configuration.
    #[must_use]
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            revoke_on_redeem: self.revoke_on_redeem,
            alert_recipient: self.alert_recipient.clone(),
        }
    }
}

/// Parse a variable with a default value.
fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, TokenError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val
            .parse()
            .map_err(|e| TokenError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}
