//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the storage gateway, the room registry (live membership per
//! board), and the identity counter. Everything is `Arc`-wrapped so cloning
//! per request is cheap.

use std::sync::Arc;

use crate::services::identity::IdentityAssigner;
use crate::services::room::RoomRegistry;
use crate::store::ElementStore;

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_CLIENT_QUEUE_DEPTH: usize = 256;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ElementStore>,
    pub rooms: Arc<RoomRegistry>,
    pub identities: Arc<IdentityAssigner>,
    /// Capacity of each connection's outbound queue.
    pub client_queue_depth: usize,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn ElementStore>, client_queue_depth: usize) -> Self {
        Self {
            rooms: Arc::new(RoomRegistry::new(store.clone())),
            store,
            identities: Arc::new(IdentityAssigner::new()),
            client_queue_depth: client_queue_depth.max(1),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_no_rooms() {
        let state = test_helpers::test_app_state(&["alpha"]);
        assert_eq!(state.rooms.room_count(), 0);
        assert_eq!(state.client_queue_depth, DEFAULT_CLIENT_QUEUE_DEPTH);
    }

    #[test]
    fn zero_queue_depth_is_clamped() {
        let store = Arc::new(crate::store::memory::MemoryStore::with_boards(["alpha"]));
        let state = AppState::new(store, 0);
        assert_eq!(state.client_queue_depth, 1);
    }
}
