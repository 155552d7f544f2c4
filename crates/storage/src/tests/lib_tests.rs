use super::*;
use serde_json::json;

fn document(id: &str, response: &str) -> ResponseDocument {
    ResponseDocument::decode(json!({
        "id": id,
        "title": format!("RFI {id}"),
        "section": "Overview",
        "progress": 25,
        "questions": [
            {"id": 1, "question": "Legal name?", "response": response, "status": "not-started"}
        ]
    }))
    .expect("document")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn returns_none_for_unknown_documents() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let cached = storage
        .load_document(&DocumentId::new("missing"))
        .await
        .expect("load");
    assert!(cached.is_none());
}

#[tokio::test]
async fn stores_and_reloads_documents() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let original = document("doc-1", "Acme Corp");
    storage.put_document(&original).await.expect("put");

    let cached = storage
        .load_document(&original.id)
        .await
        .expect("load")
        .expect("cached");
    assert_eq!(cached.document, original);
}

#[tokio::test]
async fn last_write_wins() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .put_document(&document("doc-1", "first"))
        .await
        .expect("first put");
    storage
        .put_document(&document("doc-1", "second"))
        .await
        .expect("second put");

    let cached = storage
        .load_document(&DocumentId::new("doc-1"))
        .await
        .expect("load")
        .expect("cached");
    assert_eq!(cached.document.questions[0].response, "second");
    assert_eq!(storage.list_documents().await.expect("list").len(), 1);
}

#[tokio::test]
async fn undecodable_payloads_read_as_missing() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query(
        "INSERT INTO cached_documents (document_id, title, payload, cached_at) VALUES (?, ?, ?, ?)",
    )
    .bind("broken")
    .bind("")
    .bind("{\"id\": \"broken\"}")
    .bind(Utc::now().to_rfc3339())
    .execute(storage.pool())
    .await
    .expect("raw insert");

    let cached = storage
        .load_document(&DocumentId::new("broken"))
        .await
        .expect("load");
    assert!(cached.is_none());
}

#[tokio::test]
async fn deletes_and_clears_entries() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put_document(&document("a", "")).await.expect("a");
    storage.put_document(&document("b", "")).await.expect("b");
    storage.put_document(&document("c", "")).await.expect("c");

    assert!(storage
        .delete_document(&DocumentId::new("a"))
        .await
        .expect("delete"));
    assert!(!storage
        .delete_document(&DocumentId::new("a"))
        .await
        .expect("delete again"));

    let titles: Vec<String> = storage
        .list_documents()
        .await
        .expect("list")
        .into_iter()
        .map(|summary| summary.title)
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"RFI b".to_string()));

    assert_eq!(storage.clear().await.expect("clear"), 2);
    assert!(storage.list_documents().await.expect("list").is_empty());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("cache.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}
