//! ReviewAI gateway server binary.
//!
//! Runs either the public gateway or, with `--role unit`, the unit host that
//! executes region-pinned generative-AI calls for the gateways.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use reviewai_api::config::ApiConfig;
use reviewai_api::AppState;
use reviewai_core::ratelimit::{KvStore, MemoryKvStore};
use reviewai_core::upstream::ReqwestTransport;
use tracing::{info, warn};

/// How often expired records are swept from the in-memory store.
const STORE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Role {
    /// Public API gateway.
    Gateway,
    /// Unit host for region-pinned generative-AI calls.
    Unit,
}

/// CLI arguments for the gateway.
#[derive(Parser, Debug)]
#[command(name = "reviewai_gateway", about = "ReviewAI API gateway")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Which router this process serves.
    #[arg(long, env = "GATEWAY_ROLE", value_enum, default_value_t = Role::Gateway)]
    role: Role,

    /// Shared rate-limit store. In-memory when unset; needs the `redis` feature.
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,
}

impl Args {
    #[cfg(feature = "redis")]
    async fn store(&self) -> Result<Arc<dyn KvStore>, Box<dyn std::error::Error>> {
        if let Some(url) = &self.redis_url {
            info!("using redis rate-limit store");
            let store = reviewai_core::ratelimit::store::RedisKvStore::connect(url).await?;
            return Ok(Arc::new(store));
        }
        Ok(memory_store())
    }

    #[cfg(not(feature = "redis"))]
    async fn store(&self) -> Result<Arc<dyn KvStore>, Box<dyn std::error::Error>> {
        if self.redis_url.is_some() {
            warn!("built without the redis feature; ignoring --redis-url");
        }
        Ok(memory_store())
    }
}

fn memory_store() -> Arc<dyn KvStore> {
    let store = Arc::new(MemoryKvStore::new());
    store.spawn_cleanup_task(STORE_CLEANUP_INTERVAL);
    store
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,reviewai_api=debug,reviewai_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.clone();
    }
    if config.jwt_secret.is_empty() {
        warn!("JWT_SECRET is not set; token routes will fail");
    }
    info!(role = ?args.role, config = ?config, "starting reviewai_gateway");

    let bind_addr = config.bind_addr.clone();
    let transport = ReqwestTransport::with_timeout(config.upstream_timeout)?;
    let state = AppState::new(config, args.store().await?, Arc::new(transport));
    let app = match args.role {
        Role::Gateway => reviewai_api::router(state),
        Role::Unit => reviewai_api::unit_router(state),
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
