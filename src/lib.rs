//! Token Rotation Service library.
//!
//! Issues access/refresh token pairs for 16-byte account identifiers,
//! keeps bcrypt digests of issued refresh tokens, and rotates pairs on
//! redemption while honoring revocation and alerting on client IP changes.

#![forbid(unsafe_code)]

pub mod account;
pub mod config;
pub mod error;
pub mod http;
pub mod jwt;
pub mod metrics;
pub mod notify;
pub mod refresh;
pub mod storage;
pub mod telemetry;

// Re-exports for convenience
pub use account::AccountId;
pub use config::Config;
pub use error::TokenError;
pub use refresh::{RotationEngine, RotationPolicy, TokenPair};
