//! HTTP transport for the rotation engine.
//!
//! Routes:
//! - `POST /auth/token?guid=<16 chars>` issues a pair
//! - `POST /auth/refresh` with `{"refresh_token": "..."}` rotates a pair
//! - `GET /health`, `GET /metrics`

use crate::error::{ErrorClass, TokenError};
use crate::metrics;
use crate::refresh::{RotationEngine, TokenPair};
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

type SharedEngine = Arc<RotationEngine>;

/// Client address: socket peer, then proxy headers, then loopback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip().to_string()));
        }

        if let Some(forwarded) = parts.headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            let ip = forwarded.split(',').next().unwrap_or(forwarded).trim();
            if !ip.is_empty() {
                return Ok(ClientIp(ip.to_string()));
            }
        }

        if let Some(real_ip) = parts.headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            let ip = real_ip.trim();
            if !ip.is_empty() {
                return Ok(ClientIp(ip.to_string()));
            }
        }

        Ok(ClientIp("127.0.0.1".to_string()))
    }
}

/// Error body `{"error": message}` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        let status = match err.class() {
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            TokenError::InvalidAccountId { .. } => "GUID must be 16 characters long",
            TokenError::TokenGenerationFailed(_) => "Error generating tokens",
            TokenError::HashingFailed(_) => "Error hashing token",
            TokenError::PersistenceFailed(_) => "Error saving token to database",
            TokenError::Unauthorized => "Invalid or expired refresh token",
            TokenError::Revoked => "Refresh token is revoked",
            TokenError::Internal(_) | TokenError::Config(_) => "Internal server error",
        };
        Self { status, message }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request body",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(default)]
    guid: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Token to redeem
    pub refresh_token: String,
}

/// Build the service router.
pub fn create_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/auth/token", post(issue_tokens))
        .route("/auth/refresh", post(refresh_tokens))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .with_state(engine)
}

async fn issue_tokens(
    State(engine): State<SharedEngine>,
    ClientIp(ip): ClientIp,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = engine.issue_pair(query.guid.as_bytes(), &ip).await?;
    Ok(Json(pair))
}

async fn refresh_tokens(
    State(engine): State<SharedEngine>,
    ClientIp(ip): ClientIp,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = body?;
    let pair = engine.redeem(&request.refresh_token, &ip).await?;
    Ok(Json(pair))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
