//! Storage gateway: the durable home of boards and elements.
//!
//! SYSTEM CONTEXT
//! ==============
//! The hub owns only ephemeral room state. Board existence and element rows
//! live behind `ElementStore`; the room registry asks it whether a board
//! exists, and the websocket dispatcher uses it for every element mutation,
//! snapshot, and range query.
//!
//! Two adapters ship: `postgres` (production) and `memory` (development and
//! tests). Both must evaluate range queries with the predicates defined in
//! `services::spatial`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::spatial::{BoundingBox, MatchMode};

/// Storage-assigned element identifier.
pub type ElementId = i64;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
            Self::Unavailable(_) => "E_STORAGE_UNAVAILABLE",
        }
    }
}

/// One persisted element as returned in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: serde_json::Value,
    pub bounds: BoundingBox,
}

// =============================================================================
// GATEWAY
// =============================================================================

#[async_trait]
pub trait ElementStore: Send + Sync {
    /// Whether `board` is in the board catalog.
    async fn board_exists(&self, board: &str) -> Result<bool, StoreError>;

    /// Every element stored for `board`, ordered by id.
    async fn snapshot(&self, board: &str) -> Result<Vec<StoredElement>, StoreError>;

    /// Persist a new element and return its assigned id.
    async fn insert_element(
        &self,
        board: &str,
        kind: &str,
        bounds: BoundingBox,
        content: &serde_json::Value,
    ) -> Result<ElementId, StoreError>;

    /// Delete one element of `board`. An unknown id, or an id that belongs
    /// to another board, is not an error and deletes nothing.
    async fn delete_element(&self, board: &str, id: ElementId) -> Result<(), StoreError>;

    /// Delete every element of `board`, leaving other boards untouched.
    async fn clear_board(&self, board: &str) -> Result<(), StoreError>;

    /// Ids of elements on `board` whose box matches `bounds` under `mode`.
    async fn query_range(
        &self,
        board: &str,
        bounds: BoundingBox,
        mode: MatchMode,
    ) -> Result<Vec<ElementId>, StoreError>;
}
