//! WebSocket handler: one board connection from upgrade to eviction.
//!
//! DESIGN
//! ======
//! On upgrade the connection is assigned an id and admitted to its board's
//! room, then enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by type tag
//! - Broadcasts queued by the room → forward to client
//!
//! Direct replies never overtake broadcasts already queued for the sender:
//! the queue is drained before a reply goes out, so an `add` followed by a
//! `get` yields `added` before the snapshot. An `added` queued between
//! admission and the snapshot read is skipped when the snapshot already
//! listed that element.
//!
//! Handler functions validate, touch storage, and return an `Outcome`. The
//! dispatch layer owns all outbound concerns: broadcast to the room or reply
//! to the sender.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → admit, or send close and stop if the board is unknown
//! 2. Send `identify`, `all_clients`, `all_elements`
//! 3. Client sends frames → dispatch → Outcome applied
//! 4. Close or read error → evict exactly once

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashSet;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::PeerAddrs;
use crate::frame::{Envelope, ErrorCode, Event, Inbound, error_envelope};
use crate::services::element;
use crate::services::identity::ConnectionId;
use crate::services::room::{Eviction, Member, Outbound};
use crate::state::AppState;
use crate::store::{ElementId, StoreError};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send directly.
enum Outcome {
    /// Queue for every member of the board, sender included.
    Broadcast(Envelope),
    /// Send to the sender only.
    Reply(Vec<Envelope>),
}

/// The parts of a connection that frame handling needs.
struct Session {
    board_id: String,
    client_id: ConnectionId,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<PeerAddrs>,
    Path(path): Path<String>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(board_id) = board_from_path(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let address = client_address(&headers, peer);
    let board_id = board_id.to_string();
    ws.on_upgrade(move |socket| run_ws(socket, state, board_id, address))
}

/// First path segment, if non-empty.
fn board_from_path(path: &str) -> Option<&str> {
    path.trim_start_matches('/').split('/').next().filter(|segment| !segment.is_empty())
}

pub(crate) fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
}

/// Address reported for a client: `X-Forwarded-For` if present, else the peer IP.
fn client_address(headers: &HeaderMap, peer: PeerAddrs) -> String {
    forwarded_for(headers).map_or_else(|| peer.remote.ip().to_string(), str::to_string)
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, board_id: String, address: String) {
    let client_id = state.identities.assign();

    // Per-connection queue for broadcasts from the room.
    let (client_tx, mut client_rx) = mpsc::channel::<Outbound>(state.client_queue_depth);
    let member = Member { id: client_id, tx: client_tx, address };

    let admitted = match state.rooms.admit(&board_id, member).await {
        Ok(admitted) => admitted,
        Err(e) => {
            warn!(%board_id, %client_id, code = e.error_code(), error = %e, "ws: admission rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    info!(%board_id, %client_id, "ws: client connected");

    let session = Session { board_id, client_id };

    let snapshot = element::snapshot(state.store.as_ref(), &session.board_id, &admitted.members).await;
    let mut in_snapshot = element::snapshot_ids(&snapshot);
    let mut greeting = vec![Envelope::server(Event::Identify, json!(client_id))];
    greeting.extend(snapshot);

    if send_all(&mut socket, &greeting).await.is_ok() {
        'conn: loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Text(text) => {
                            let replies = process_inbound_text(&state, &session, text.as_str()).await;
                            if replies.is_empty() {
                                continue 'conn;
                            }
                            while let Ok(queued) = client_rx.try_recv() {
                                if forward(&mut socket, &mut in_snapshot, queued).await.is_err() {
                                    break 'conn;
                                }
                            }
                            if send_all(&mut socket, &replies).await.is_err() {
                                break 'conn;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                Some(queued) = client_rx.recv() => {
                    if forward(&mut socket, &mut in_snapshot, queued).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let remaining = match state.rooms.evict(&session.board_id, client_id) {
        Eviction::Left { remaining } => remaining,
        Eviction::RoomClosed | Eviction::NotPresent => 0,
    };
    info!(board_id = %session.board_id, %client_id, remaining, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return envelopes for the sender.
///
/// Keeps transport concerns out of frame handling so tests can drive the
/// dispatcher directly against a room.
async fn process_inbound_text(state: &AppState, session: &Session, text: &str) -> Vec<Envelope> {
    let (board_id, client_id) = (&session.board_id, session.client_id);

    let inbound = match Inbound::parse(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!(%board_id, %client_id, code = e.error_code(), error = %e, "ws: dropped inbound frame");
            return Vec::new();
        }
    };

    let kind = inbound.kind();
    if matches!(inbound, Inbound::Drawing(_)) {
        debug!(%board_id, %client_id, kind, "ws: recv frame");
    } else {
        info!(%board_id, %client_id, kind, "ws: recv frame");
    }

    match dispatch(state, session, inbound).await {
        Ok(Outcome::Broadcast(envelope)) => {
            state.rooms.broadcast(board_id, &envelope);
            Vec::new()
        }
        Ok(Outcome::Reply(envelopes)) => envelopes,
        Err(e) => {
            error!(%board_id, %client_id, request = kind, code = e.error_code(), error = %e, "ws: storage call failed");
            vec![error_envelope(kind, &e)]
        }
    }
}

async fn dispatch(state: &AppState, session: &Session, inbound: Inbound) -> Result<Outcome, StoreError> {
    let store = state.store.as_ref();
    let (board_id, client_id) = (session.board_id.as_str(), session.client_id);

    match inbound {
        Inbound::Drawing(data) => Ok(Outcome::Broadcast(Envelope::attributed(Event::Ongoing, data, client_id))),
        Inbound::Add(req) => {
            let added = element::add_element(store, board_id, req).await?;
            Ok(Outcome::Broadcast(Envelope::attributed(Event::Added, added, client_id)))
        }
        Inbound::Del(req) => {
            let deleted = element::delete_element(store, board_id, req).await?;
            Ok(Outcome::Broadcast(Envelope::attributed(Event::Deleted, deleted, client_id)))
        }
        Inbound::Get => {
            let members = state.rooms.members(board_id);
            Ok(Outcome::Reply(element::snapshot(store, board_id, &members).await))
        }
        Inbound::Clear => {
            element::clear_board(store, board_id).await?;
            Ok(Outcome::Broadcast(Envelope::server(Event::Cleared, "")))
        }
        Inbound::Query(req) => {
            let matches = element::query_matches(store, board_id, req).await?;
            Ok(Outcome::Reply(vec![Envelope::server(Event::Matches, matches)]))
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Send one queued broadcast unless it repeats an element from the greeting.
async fn forward(socket: &mut WebSocket, in_snapshot: &mut HashSet<ElementId>, queued: Outbound) -> Result<(), axum::Error> {
    if already_in_snapshot(in_snapshot, &queued) {
        debug!(id = ?queued.added, "ws: skipped added already in snapshot");
        return Ok(());
    }
    socket.send(Message::Text(queued.text.as_ref().into())).await
}

/// True once per id for an `added` whose element the greeting already listed.
fn already_in_snapshot(in_snapshot: &mut HashSet<ElementId>, queued: &Outbound) -> bool {
    queued.added.is_some_and(|id| in_snapshot.remove(&id))
}

async fn send_all(socket: &mut WebSocket, envelopes: &[Envelope]) -> Result<(), axum::Error> {
    for envelope in envelopes {
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(event = ?envelope.event, error = %e, "ws: failed to serialize envelope");
                continue;
            }
        };
        socket.send(Message::Text(text.into())).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
