mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{HubConfig, StorageConfig};
use crate::routes::PeerAddrs;
use crate::store::ElementStore;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HubConfig::from_env().expect("invalid configuration");

    let store: Arc<dyn ElementStore> = match &config.storage {
        StorageConfig::Postgres { database_url, max_connections } => {
            let pool = db::init_pool(database_url, *max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgStore::new(pool))
        }
        StorageConfig::Memory { boards } => {
            tracing::warn!(boards = boards.len(), "using in-memory storage; elements are lost on exit");
            Arc::new(MemoryStore::with_boards(boards.iter().cloned()))
        }
    };
    let state = state::AppState::new(store, config.client_queue_depth);

    let app = routes::app(state);
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "whiteboard hub listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<PeerAddrs>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
