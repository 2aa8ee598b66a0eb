//! Postgres `ElementStore`.
//!
//! DESIGN
//! ======
//! Boards are addressed by their text identifier; every statement resolves
//! it to the numeric `boards.id` inline. Range queries push the bounding-box
//! predicates down to SQL using the same comparisons as
//! `services::spatial::{intersects, contains}`, served by the
//! `(board_id, lower_x, upper_x, lower_y, upper_y)` index.
//!
//! Each call is an independent statement on the pool. No transaction spans
//! more than one inbound frame.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ElementId, ElementStore, StoreError, StoredElement};
use crate::services::spatial::{BoundingBox, MatchMode};

type ElementRow = (ElementId, String, serde_json::Value, f64, f64, f64, f64);

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ElementStore for PgStore {
    async fn board_exists(&self, board: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM boards WHERE identifier = $1)")
            .bind(board)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn snapshot(&self, board: &str) -> Result<Vec<StoredElement>, StoreError> {
        let rows = sqlx::query_as::<_, ElementRow>(
            "SELECT e.id, e.kind, e.content, e.lower_x, e.upper_x, e.lower_y, e.upper_y \
             FROM elements e JOIN boards b ON b.id = e.board_id \
             WHERE b.identifier = $1 \
             ORDER BY e.id",
        )
        .bind(board)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, kind, content, lower_x, upper_x, lower_y, upper_y)| StoredElement {
                id,
                kind,
                content,
                bounds: BoundingBox { lower_x, upper_x, lower_y, upper_y },
            })
            .collect())
    }

    async fn insert_element(
        &self,
        board: &str,
        kind: &str,
        bounds: BoundingBox,
        content: &serde_json::Value,
    ) -> Result<ElementId, StoreError> {
        let id: Option<ElementId> = sqlx::query_scalar(
            "INSERT INTO elements (board_id, kind, content, lower_x, upper_x, lower_y, upper_y) \
             SELECT id, $2, $3, $4, $5, $6, $7 FROM boards WHERE identifier = $1 \
             RETURNING id",
        )
        .bind(board)
        .bind(kind)
        .bind(content)
        .bind(bounds.lower_x)
        .bind(bounds.upper_x)
        .bind(bounds.lower_y)
        .bind(bounds.upper_y)
        .fetch_optional(&self.pool)
        .await?;

        id.ok_or_else(|| StoreError::Unavailable(format!("no board row for {board}")))
    }

    async fn delete_element(&self, board: &str, id: ElementId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM elements WHERE id = $2 AND board_id = (SELECT id FROM boards WHERE identifier = $1)")
            .bind(board)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_board(&self, board: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM elements WHERE board_id = (SELECT id FROM boards WHERE identifier = $1)")
            .bind(board)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query_range(
        &self,
        board: &str,
        bounds: BoundingBox,
        mode: MatchMode,
    ) -> Result<Vec<ElementId>, StoreError> {
        let predicate = match mode {
            MatchMode::Intersect => "lower_x <= $3 AND upper_x >= $2 AND lower_y <= $5 AND upper_y >= $4",
            MatchMode::Contain => "$2 <= lower_x AND upper_x <= $3 AND $4 <= lower_y AND upper_y <= $5",
        };
        let sql = format!(
            "SELECT id FROM elements \
             WHERE board_id = (SELECT id FROM boards WHERE identifier = $1) AND {predicate} \
             ORDER BY id"
        );

        let ids: Vec<ElementId> = sqlx::query_scalar(&sql)
            .bind(board)
            .bind(bounds.lower_x)
            .bind(bounds.upper_x)
            .bind(bounds.lower_y)
            .bind(bounds.upper_y)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
