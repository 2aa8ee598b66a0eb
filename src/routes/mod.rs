//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every board is a websocket endpoint at `/{board}`; the first path segment
//! names the board and anything after it is ignored. `/status` and `/healthz`
//! are static routes, so they win over the board wildcard.

pub mod status;
pub mod ws;

use std::net::SocketAddr;

use axum::Router;
use axum::extract::connect_info::Connected;
use axum::http::StatusCode;
use axum::routing::get;
use axum::serve::IncomingStream;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the hub router. Serve it with
/// `into_make_service_with_connect_info::<PeerAddrs>()`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status::handle_status))
        .route("/{*path}", get(ws::handle_ws))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// CONNECT INFO
// =============================================================================

/// Both ends of an accepted TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddrs {
    pub remote: SocketAddr,
    /// `None` if the socket could not report its local address.
    pub local: Option<SocketAddr>,
}

impl Connected<IncomingStream<'_, TcpListener>> for PeerAddrs {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self { remote: *stream.remote_addr(), local: stream.io().local_addr().ok() }
    }
}
