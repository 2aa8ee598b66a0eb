//! Element service: persisted drawing objects and board snapshots.
//!
//! DESIGN
//! ======
//! These functions own the storage side of each element operation and
//! return the payload the dispatcher should send. They never broadcast;
//! the websocket layer decides the audience.
//!
//! Elements are immutable once stored. `add` attaches the computed `bounds`
//! to the client payload before persisting, so snapshots and the `added`
//! broadcast both carry the box alongside the drawing properties.

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::frame::{AddRequest, DelRequest, Envelope, Event, QueryRequest, error_envelope};
use crate::services::identity::ConnectionId;
use crate::store::{ElementId, ElementStore, StoreError};

// =============================================================================
// MUTATIONS
// =============================================================================

/// Persist a new element. Returns the `added` payload `{id, properties}`.
///
/// # Errors
///
/// Returns a store error if the insert fails; nothing was persisted.
pub async fn add_element(store: &dyn ElementStore, board_id: &str, req: AddRequest) -> Result<Value, StoreError> {
    let AddRequest { kind, bounds, mut payload } = req;
    payload.insert("bounds".into(), json!(bounds));
    let properties = Value::Object(payload);

    let id = store.insert_element(board_id, &kind, bounds, &properties).await?;
    Ok(json!({ "id": id, "properties": properties }))
}

/// Delete one element of `board_id`. Returns the client payload for the
/// `deleted` broadcast.
///
/// # Errors
///
/// Returns a store error if the delete statement fails.
pub async fn delete_element(store: &dyn ElementStore, board_id: &str, req: DelRequest) -> Result<Value, StoreError> {
    store.delete_element(board_id, req.id).await?;
    Ok(req.payload)
}

/// Delete every element on `board_id`.
///
/// # Errors
///
/// Returns a store error if the delete statement fails.
pub async fn clear_board(store: &dyn ElementStore, board_id: &str) -> Result<(), StoreError> {
    store.clear_board(board_id).await
}

// =============================================================================
// QUERIES
// =============================================================================

/// Run a spatial query. Returns the `matches` payload `{type, line, bounds, ids}`.
///
/// # Errors
///
/// Returns a store error if the range query fails.
pub async fn query_matches(store: &dyn ElementStore, board_id: &str, req: QueryRequest) -> Result<Value, StoreError> {
    let ids = store.query_range(board_id, req.bounds, req.mode).await?;
    tracing::debug!(%board_id, padding = req.padding, mode = ?req.mode, hits = ids.len(), "element: range query");
    Ok(json!({
        "type": req.kind,
        "line": req.line,
        "bounds": req.bounds,
        "ids": ids,
    }))
}

/// Build the full state snapshot: `all_clients` then `all_elements`.
///
/// A failed element read is reported to the requester as an `error`
/// envelope in place of `all_elements`.
pub async fn snapshot(store: &dyn ElementStore, board_id: &str, members: &[ConnectionId]) -> Vec<Envelope> {
    let clients = Envelope::server(Event::AllClients, json!(members));
    let elements = match store.snapshot(board_id).await {
        Ok(elements) => Envelope::server(Event::AllElements, json!(elements)),
        Err(e) => {
            tracing::error!(%board_id, error = %e, "snapshot read failed");
            error_envelope("get", &e)
        }
    };
    vec![clients, elements]
}

/// Element ids listed by the `all_elements` envelope of a snapshot.
pub fn snapshot_ids(envelopes: &[Envelope]) -> HashSet<ElementId> {
    envelopes
        .iter()
        .filter(|envelope| envelope.event == Event::AllElements)
        .filter_map(|envelope| envelope.data.as_array())
        .flatten()
        .filter_map(|element| element.get("id").and_then(Value::as_i64))
        .collect()
}

#[cfg(test)]
#[path = "element_test.rs"]
mod tests;
