//! Prometheus metrics for the token rotation service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, Counter, CounterVec, Encoder, TextEncoder,
};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_rotation_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Redemption outcomes counter.
pub static REDEMPTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_rotation_redemptions_total",
        "Total number of refresh token redemptions",
        &["outcome"]
    )
    .expect("Failed to register redemptions metric")
});

/// Refresh records revoked counter.
pub static TOKENS_REVOKED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_rotation_tokens_revoked_total",
        "Total number of refresh records revoked",
        &["reason"]
    )
    .expect("Failed to register tokens_revoked metric")
});

/// Redemptions from an IP other than the issuing one.
pub static IP_ANOMALIES: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "token_rotation_ip_anomalies_total",
        "Total number of redemptions from an unexpected IP"
    )
    .expect("Failed to register ip_anomalies metric")
});

/// Security alerts that could not be delivered.
pub static NOTIFICATION_FAILURES: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "token_rotation_notification_failures_total",
        "Total number of security alerts that failed to send"
    )
    .expect("Failed to register notification_failures metric")
});

/// Record a token issuance.
pub fn record_token_issued(token_type: &str) {
    TOKENS_ISSUED.with_label_values(&[token_type]).inc();
}

/// Record a redemption outcome.
pub fn record_redemption(outcome: &str) {
    REDEMPTIONS.with_label_values(&[outcome]).inc();
}

/// Record revocations.
pub fn record_tokens_revoked(reason: &str, count: u32) {
    TOKENS_REVOKED
        .with_label_values(&[reason])
        .inc_by(f64::from(count));
}

/// Record an IP mismatch on redemption.
pub fn record_ip_anomaly() {
    IP_ANOMALIES.inc();
}

/// Record an undeliverable alert.
pub fn record_notification_failure() {
    NOTIFICATION_FAILURES.inc();
}

/// Render every registered metric in the Prometheus text format.
#[must_use]
pub fn render() -> String {
    let mut buffer = Vec::new();
    if TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .is_err()
    {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
