// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Context;
use clap::Parser;
use roster_api::config::{Args, Config};
use roster_api::{AppState, RouterConfig, create_router};
use roster_store::SqliteStoreBuilder;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(Args::parse()).context("configuration error")?;
    setup_logging(&config.log_level);

    let store = SqliteStoreBuilder::new()
        .database_url(&config.database_url)
        .max_connections(config.max_connections)
        .dialect(config.dialect)
        .build()
        .await
        .with_context(|| format!("could not open database {}", config.database_url))?;

    let app = create_router(AppState::new(store.clone()), &RouterConfig::from(&config));

    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("could not bind to {}", config.bind_address))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.bind_address,
        dialect = %config.dialect,
        "waiting for connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("shut down");

    Ok(())
}

/// `RUST_LOG` takes precedence over the configured log level.
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the server runs until it is killed.
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
