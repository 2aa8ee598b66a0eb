//! Room registry: who is connected to which board, and fan-out to them.
//!
//! DESIGN
//! ======
//! A room is the live member set of one board. Rooms are created by the
//! first admitted connection and removed the moment the last member leaves,
//! so the registry never holds an empty room.
//!
//! The map is a `DashMap`: admit/evict for one board serialize on that
//! board's shard, broadcasts read a consistent member set under the shard
//! read lock, and unrelated boards never wait on one global lock. No
//! `.await` happens while a shard guard is held. Storage is consulted before
//! the guard is taken, and delivery only enqueues into each member's bounded
//! outbound queue.
//!
//! DELIVERY
//! ========
//! An envelope is encoded once and the same `Arc<str>` is queued for every
//! member, so each recipient gets the whole message or nothing. A full or
//! closed queue is logged and skipped; that member's own connection loop is
//! responsible for evicting it. Queued `added` messages carry the element id
//! so a freshly admitted connection can skip elements its snapshot already
//! listed.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

use crate::frame::{Envelope, ErrorCode, Event};
use crate::services::identity::ConnectionId;
use crate::store::{ElementId, ElementStore, StoreError};

/// Encoded envelope queued for a connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub text: Arc<str>,
    /// Element id when the envelope is `added`.
    pub added: Option<ElementId>,
}

// =============================================================================
// TYPES
// =============================================================================

/// One live connection as the registry sees it.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: ConnectionId,
    pub tx: mpsc::Sender<Outbound>,
    /// Client address reported by the status surface.
    pub address: String,
}

#[derive(Debug, Default)]
struct Room {
    members: BTreeMap<ConnectionId, Member>,
}

/// Successful admission. `members` includes the admitted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub members: Vec<ConnectionId>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmitError {
    #[error("board not found: {0}")]
    BoardNotFound(String),
    #[error("board lookup failed: {0}")]
    Storage(#[from] StoreError),
}

impl ErrorCode for AdmitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BoardNotFound(_) => "E_BOARD_NOT_FOUND",
            Self::Storage(e) => e.error_code(),
        }
    }
}

/// What `evict` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// The connection was not a member; nothing changed.
    NotPresent,
    /// Others remain and were sent `client_left`.
    Left { remaining: usize },
    /// The connection was the last member; the room is gone.
    RoomClosed,
}

pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    store: Arc<dyn ElementStore>,
}

// =============================================================================
// ADMIT / EVICT
// =============================================================================

impl RoomRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn ElementStore>) -> Self {
        Self { rooms: DashMap::new(), store }
    }

    /// Add `member` to the room for `board_id`, creating the room if needed.
    ///
    /// A missing room means the board has not been verified yet, so the store
    /// is asked first. Existing members receive `client_joined` before the new
    /// member is inserted.
    ///
    /// # Errors
    ///
    /// `BoardNotFound` if the store has no such board, `Storage` if the lookup
    /// failed. In both cases the member is not added anywhere.
    pub async fn admit(&self, board_id: &str, member: Member) -> Result<Admitted, AdmitError> {
        if !self.rooms.contains_key(board_id) && !self.store.board_exists(board_id).await? {
            return Err(AdmitError::BoardNotFound(board_id.to_string()));
        }

        let client_id = member.id;
        let mut room = self.rooms.entry(board_id.to_string()).or_default();
        if !room.members.is_empty() {
            let joined = Envelope::server(Event::ClientJoined, serde_json::json!(client_id));
            deliver(board_id, &room, &joined);
        }
        room.members.insert(client_id, member);

        let members: Vec<ConnectionId> = room.members.keys().copied().collect();
        info!(%board_id, %client_id, clients = members.len(), "room: client admitted");
        Ok(Admitted { members })
    }

    /// Remove `client_id` from the room for `board_id`.
    ///
    /// Drops the room when it becomes empty, otherwise announces
    /// `client_left` to the remaining members.
    pub fn evict(&self, board_id: &str, client_id: ConnectionId) -> Eviction {
        let Entry::Occupied(mut entry) = self.rooms.entry(board_id.to_string()) else {
            return Eviction::NotPresent;
        };
        if entry.get_mut().members.remove(&client_id).is_none() {
            return Eviction::NotPresent;
        }

        if entry.get().members.is_empty() {
            entry.remove();
            info!(%board_id, %client_id, "room: last client left, room closed");
            return Eviction::RoomClosed;
        }

        let left = Envelope::server(Event::ClientLeft, serde_json::json!(client_id));
        deliver(board_id, entry.get(), &left);
        let remaining = entry.get().members.len();
        info!(%board_id, %client_id, remaining, "room: client left");
        Eviction::Left { remaining }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Identifiers of the current members of `board_id`.
    #[must_use]
    pub fn members(&self, board_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(board_id)
            .map(|room| room.members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Client addresses per board, for the status surface.
    #[must_use]
    pub fn active(&self) -> BTreeMap<String, Vec<String>> {
        self.rooms
            .iter()
            .map(|room| {
                let addresses = room.members.values().map(|m| m.address.clone()).collect();
                (room.key().clone(), addresses)
            })
            .collect()
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // =========================================================================
    // BROADCAST
    // =========================================================================

    /// Queue `envelope` for every member of `board_id`, sender included.
    ///
    /// Returns how many members it was queued for. Per-recipient failures are
    /// logged, never returned.
    pub fn broadcast(&self, board_id: &str, envelope: &Envelope) -> usize {
        let Some(room) = self.rooms.get(board_id) else {
            return 0;
        };
        deliver(board_id, &room, envelope)
    }
}

fn deliver(board_id: &str, room: &Room, envelope: &Envelope) -> usize {
    let text: Arc<str> = match envelope.encode() {
        Ok(text) => text.into(),
        Err(e) => {
            error!(%board_id, event = ?envelope.event, error = %e, "room: failed to encode envelope");
            return 0;
        }
    };

    let added = match envelope.event {
        Event::Added => envelope.data.get("id").and_then(serde_json::Value::as_i64),
        _ => None,
    };
    let outbound = Outbound { text, added };

    let mut delivered = 0;
    for (client_id, member) in &room.members {
        match member.tx.try_send(outbound.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!(%board_id, %client_id, event = ?envelope.event, "room: delivery failed, client queue full");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%board_id, %client_id, event = ?envelope.event, "room: delivery failed, client disconnected");
            }
        }
    }
    delivered
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
