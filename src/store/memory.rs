//! In-process `ElementStore`.
//!
//! Used when `STORAGE=memory` and by the test suite. Boards are seeded at
//! construction; the hub never creates them.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ElementId, ElementStore, StoreError, StoredElement};
use crate::services::spatial::{BoundingBox, MatchMode};

struct Row {
    board: String,
    element: StoredElement,
}

struct Inner {
    boards: HashSet<String>,
    rows: BTreeMap<ElementId, Row>,
    next_id: ElementId,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a store whose catalog holds exactly `boards`.
    pub fn with_boards<I, S>(boards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inner = Inner { boards: boards.into_iter().map(Into::into).collect(), rows: BTreeMap::new(), next_id: 1 };
        Self { inner: RwLock::new(inner) }
    }

    /// Number of stored elements across all boards.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }
}

#[async_trait]
impl ElementStore for MemoryStore {
    async fn board_exists(&self, board: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.boards.contains(board))
    }

    async fn snapshot(&self, board: &str) -> Result<Vec<StoredElement>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|row| row.board == board)
            .map(|row| row.element.clone())
            .collect())
    }

    async fn insert_element(
        &self,
        board: &str,
        kind: &str,
        bounds: BoundingBox,
        content: &serde_json::Value,
    ) -> Result<ElementId, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.boards.contains(board) {
            return Err(StoreError::Unavailable(format!("no board row for {board}")));
        }
        let id = inner.next_id.max(1);
        inner.next_id = id + 1;
        let element = StoredElement { id, kind: kind.to_string(), content: content.clone(), bounds };
        inner.rows.insert(id, Row { board: board.to_string(), element });
        Ok(id)
    }

    async fn delete_element(&self, board: &str, id: ElementId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.rows.get(&id).is_some_and(|row| row.board == board) {
            inner.rows.remove(&id);
        }
        Ok(())
    }

    async fn clear_board(&self, board: &str) -> Result<(), StoreError> {
        self.inner.write().await.rows.retain(|_, row| row.board != board);
        Ok(())
    }

    async fn query_range(
        &self,
        board: &str,
        bounds: BoundingBox,
        mode: MatchMode,
    ) -> Result<Vec<ElementId>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|row| row.board == board && mode.matches(&row.element.bounds, &bounds))
            .map(|row| row.element.id)
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
