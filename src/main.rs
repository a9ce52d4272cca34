#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use std::net::SocketAddr;

use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::health::Health;
use crate::mirror::SyncNotifier;
use crate::storage::Backend;
use crate::storage::Config as StorageConfig;
use crate::storage::Storage;
use crate::storage::setup;
use crate::utils::env_var_optional;
use crate::utils::env_var_or_else;

mod api;
mod branches;
mod deliveries;
mod export;
mod graceful_shutdown;
mod health;
mod identifiers;
mod mirror;
mod storage;
#[cfg(test)]
mod tests;
mod utils;

const DEFAULT_RUST_LOG: &str = "slipbook=debug,tower_http=debug";
const DEFAULT_ADDRESS: &str = "0.0.0.0:3001";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let app = setup_app(StorageConfig::DetectConfig, SyncNotifier::from_env()?).await?;

    let address = setup_address()?;
    let listener = TcpListener::bind(address).await?;
    tracing::info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if the storage fails to load:
/// - Snapshot file is not valid
/// - Database connection or migrations fail
pub async fn setup_app(
    storage_config: StorageConfig,
    sync_notifier: SyncNotifier,
) -> Result<Router> {
    let router = match setup(storage_config).await? {
        Backend::Memory(memory) => create_router(memory, sync_notifier),
        Backend::Postgres(postgres) => create_router(postgres, sync_notifier),
    };

    Ok(router)
}

/// Create the router for the delivery slips
fn create_router<S: Storage>(storage: S, sync_notifier: SyncNotifier) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api::router::<S>())
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(sync_notifier))
        .layer(Extension(Health::from_env()))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(env_var_or_else("RUST_LOG", || {
            DEFAULT_RUST_LOG.into()
        })))
        .with(fmt::layer())
        .init();
}

fn setup_address() -> Result<SocketAddr> {
    let mut address =
        env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS)).parse::<SocketAddr>()?;

    // optional override of just the port
    if let Some(port) = env_var_optional("PORT") {
        let port = port.parse::<u16>()?;

        address.set_port(port);
    }

    Ok(address)
}
