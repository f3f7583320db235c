//! # mealbridge-server
//!
//! HTTP API server for the MealBridge food-rescue network.
//!
//! This binary provides:
//! - **Donation lifecycle**: donors post surplus food with a position and a
//!   freshness deadline; donations expire or get claimed exactly once
//! - **Proximity feed**: open donations ranked by distance from the caller
//! - **Claim resolution**: concurrent claims on the same donation resolve to
//!   a single winner
//! - **Expiry reaper** running as a background task
//! - **REST API** (axum) consumed by the upstream gateway, which handles
//!   authentication and forwards the caller's user id
//! - **Per-rescuer claim throttling** to protect against abuse

mod api;
mod auth;
mod config;
mod error;
mod throttle;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mealbridge_engine::{
    ClaimCoordinator, DonationStore, ExpiryReaper, QueryService, SpatialIndex, UserDirectory,
};
use mealbridge_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::throttle::ClaimThrottle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mealbridge_server=debug")),
        )
        .init();

    info!("Starting MealBridge server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Durable store; the spatial index is rebuilt from it on every boot.
    let database = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let database = Arc::new(Mutex::new(database));

    let spatial = Arc::new(SpatialIndex::new());
    let donations = Arc::new(
        DonationStore::open(Arc::clone(&database), Arc::clone(&spatial)).await?,
    );
    let users = Arc::new(UserDirectory::new(Arc::clone(&database)));
    let claims = Arc::new(ClaimCoordinator::new(Arc::clone(&donations)));
    let query = Arc::new(QueryService::new(Arc::clone(&donations), spatial));

    let throttle = ClaimThrottle::new(config.claim_rate, config.claim_burst);

    let app_state = AppState {
        donations: Arc::clone(&donations),
        users,
        claims,
        query,
        throttle: throttle.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Expiry reaper: transitions stale open donations to expired.
    let reaper = ExpiryReaper::new(
        Arc::clone(&donations),
        Duration::from_secs(config.reaper_interval_secs),
    );
    let _reaper_task = reaper.spawn();
    info!(
        interval_secs = config.reaper_interval_secs,
        "Expiry reaper running in background"
    );

    // Periodic throttle cleanup (every 5 minutes, evict buckets idle >10 min).
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            throttle.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
