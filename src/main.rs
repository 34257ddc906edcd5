use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use token_rotation::config::{Config, StoreBackend};
use token_rotation::jwt::TokenSigner;
use token_rotation::notify::LogNotifier;
use token_rotation::refresh::{RefreshTokenHasher, RotationEngine};
use token_rotation::storage::{InMemoryRecordStore, RecordStore, RedisRecordStore};
use token_rotation::telemetry::{init_tracing, TracingConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(
        &TracingConfig::default()
            .with_log_level(config.log_level.clone())
            .with_json_output(config.log_json),
    );

    info!("Starting Token Rotation Service");

    if config.jwt_secret_generated {
        warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
    }

    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Memory => {
            warn!("Using in-memory refresh record store");
            Arc::new(InMemoryRecordStore::new())
        }
        StoreBackend::Redis { url } => Arc::new(
            RedisRecordStore::connect(url)
                .await
                .context("Cannot establish connection to Redis")?,
        ),
    };

    let engine = RotationEngine::new(
        TokenSigner::new(&config.jwt_secret, config.token_ttls),
        RefreshTokenHasher::new(config.hash_cost)?,
        store,
        Arc::new(LogNotifier::new(config.alert_sender.clone())),
        config.rotation_policy(),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let router = token_rotation::http::create_router(Arc::new(engine));

    info!("Token Rotation Service listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
