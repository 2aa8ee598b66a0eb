//! Status surface: which client addresses are on which board.
//!
//! DESIGN
//! ======
//! Only a same-host reverse proxy may read it: the peer must be the local
//! address of the accepted socket, and `X-Forwarded-For` (empty when absent)
//! must name that same address. This is a narrow trust boundary and stays
//! exactly that narrow. Anything else gets 403 before the upgrade.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::PeerAddrs;
use super::ws::forwarded_for;
use crate::state::AppState;

pub async fn handle_status(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<PeerAddrs>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_same_host(peer, forwarded_for(&headers).unwrap_or_default()) {
        warn!(remote = %peer.remote, "status: forbidden");
        return StatusCode::FORBIDDEN.into_response();
    }
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| send_status(socket, state)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Same-host proxy check.
pub(crate) fn is_same_host(peer: PeerAddrs, forwarded: &str) -> bool {
    let Some(local) = peer.local else {
        return false;
    };
    let local_ip = local.ip().to_canonical();
    peer.remote.ip().to_canonical() == local_ip && forwarded == local_ip.to_string()
}

async fn send_status(mut socket: WebSocket, state: AppState) {
    let active = state.rooms.active();
    info!(boards = active.len(), "status: sent");
    let body = serde_json::json!({ "active": active });
    if socket.send(Message::Text(body.to_string().into())).await.is_ok() {
        let _ = socket.send(Message::Close(None)).await;
    }
}
