use super::*;
use crate::frame::Inbound;
use crate::services::identity::IdentityAssigner;
use crate::services::spatial::{BoundingBox, MatchMode};
use crate::store::memory::MemoryStore;
use crate::store::{ElementId, StoredElement};

fn add_request(text: &str) -> AddRequest {
    match Inbound::parse(text).unwrap() {
        Inbound::Add(add) => add,
        other => panic!("expected add, got {other:?}"),
    }
}

fn query_request(text: &str) -> QueryRequest {
    match Inbound::parse(text).unwrap() {
        Inbound::Query(query) => query,
        other => panic!("expected query, got {other:?}"),
    }
}

/// Store whose every call fails, for the storage-unavailable paths.
struct DownStore;

#[async_trait::async_trait]
impl ElementStore for DownStore {
    async fn board_exists(&self, _board: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn snapshot(&self, _board: &str) -> Result<Vec<StoredElement>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn insert_element(
        &self,
        _board: &str,
        _kind: &str,
        _bounds: BoundingBox,
        _content: &Value,
    ) -> Result<ElementId, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn delete_element(&self, _board: &str, _id: ElementId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn clear_board(&self, _board: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn query_range(&self, _board: &str, _bounds: BoundingBox, _mode: MatchMode) -> Result<Vec<ElementId>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
}

#[tokio::test]
async fn add_element_persists_bounds_and_returns_assigned_id() {
    let store = MemoryStore::with_boards(["b"]);
    let req = add_request(r#"{"type":"add","data":{"type":"smooth","undo":false,"body":[1,5,3,2]}}"#);

    let added = add_element(&store, "b", req).await.unwrap();

    let stored = store.snapshot("b").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(added["id"], json!(stored[0].id));
    assert_eq!(stored[0].kind, "smooth");
    assert_eq!(stored[0].bounds, BoundingBox { lower_x: 1.0, upper_x: 3.0, lower_y: 2.0, upper_y: 5.0 });
    assert_eq!(
        added["properties"]["bounds"],
        json!({"lower_x": 1.0, "upper_x": 3.0, "lower_y": 2.0, "upper_y": 5.0})
    );
    assert_eq!(added["properties"]["undo"], json!(false));
    assert_eq!(stored[0].content, added["properties"]);
}

#[tokio::test]
async fn delete_element_echoes_payload_and_removes_row() {
    let store = MemoryStore::with_boards(["b"]);
    let added = add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[0,0]}}"#))
        .await
        .unwrap();
    let id = added["id"].as_i64().unwrap();

    let payload = json!({"id": id, "undo": false});
    let echoed = delete_element(&store, "b", DelRequest { id, payload: payload.clone() }).await.unwrap();

    assert_eq!(echoed, payload);
    assert!(store.snapshot("b").await.unwrap().is_empty());
}

#[tokio::test]
async fn query_matches_reports_intersecting_ids_with_padded_bounds() {
    let store = MemoryStore::with_boards(["b"]);
    let inside = add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[2,2,4,4]}}"#))
        .await
        .unwrap();
    add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[50,50,60,60]}}"#))
        .await
        .unwrap();

    let req = query_request(r#"{"type":"query","data":{"type":"eraser","body":[0,0,10,10],"padding":1}}"#);
    let matches = query_matches(&store, "b", req).await.unwrap();

    assert_eq!(matches["ids"], json!([inside["id"]]));
    assert_eq!(matches["type"], "eraser");
    assert_eq!(matches["line"], json!([0.0, 0.0, 10.0, 10.0]));
    assert_eq!(matches["bounds"], json!({"lower_x": -1.0, "upper_x": 11.0, "lower_y": -1.0, "upper_y": 11.0}));
}

#[tokio::test]
async fn query_matches_contain_mode_excludes_straddling_elements() {
    let store = MemoryStore::with_boards(["b"]);
    let inside = add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[2,2,4,4]}}"#))
        .await
        .unwrap();
    add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[8,8,14,14]}}"#))
        .await
        .unwrap();

    let req = query_request(r#"{"type":"query","data":{"body":[0,0,10,10],"padding":0,"contain":true}}"#);
    let matches = query_matches(&store, "b", req).await.unwrap();

    assert_eq!(matches["ids"], json!([inside["id"]]));
}

#[tokio::test]
async fn snapshot_lists_clients_then_elements() {
    let store = MemoryStore::with_boards(["b"]);
    add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[1,1]}}"#))
        .await
        .unwrap();
    let ids = IdentityAssigner::new();
    let members = vec![ids.assign(), ids.assign()];

    let envelopes = snapshot(&store, "b", &members).await;

    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0].event, Event::AllClients);
    assert_eq!(envelopes[0].data, json!([1, 2]));
    assert_eq!(envelopes[1].event, Event::AllElements);
    let elements = envelopes[1].data.as_array().unwrap();
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0]["type"], "s");
    assert!(elements[0]["bounds"].is_object());
    assert!(elements[0]["content"].is_object());
}

#[tokio::test]
async fn storage_failures_surface_as_errors() {
    let store = DownStore;
    let req = add_request(r#"{"type":"add","data":{"type":"s","body":[1,1]}}"#);
    assert!(add_element(&store, "b", req).await.is_err());
    assert!(clear_board(&store, "b").await.is_err());
    assert!(delete_element(&store, "b", DelRequest { id: 1, payload: json!({"id": 1}) }).await.is_err());

    let envelopes = snapshot(&store, "b", &[]).await;
    assert_eq!(envelopes[1].event, Event::Error);
    assert_eq!(envelopes[1].data["code"], "E_STORAGE_UNAVAILABLE");
}

#[tokio::test]
async fn snapshot_ids_lists_stored_elements() {
    let store = MemoryStore::with_boards(["b"]);
    let first = add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[1,1]}}"#))
        .await
        .unwrap();
    let second = add_element(&store, "b", add_request(r#"{"type":"add","data":{"type":"s","body":[2,2]}}"#))
        .await
        .unwrap();

    let ids = snapshot_ids(&snapshot(&store, "b", &[]).await);

    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first["id"].as_i64().unwrap()));
    assert!(ids.contains(&second["id"].as_i64().unwrap()));
}

#[tokio::test]
async fn snapshot_ids_is_empty_when_read_fails() {
    assert!(snapshot_ids(&snapshot(&DownStore, "b", &[]).await).is_empty());
}
