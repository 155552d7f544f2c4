use super::*;
use crate::{cache::MemoryDocumentCache, HttpRfiClient};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

async fn accept_upload(State(uploads): State<Arc<AtomicUsize>>) -> Json<Value> {
    uploads.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "id": "resp-42",
        "title": "Uploaded RFI",
        "section": "General",
        "progress": 0,
        "questions": [{"id": 1, "question": "Name?", "response": "", "status": "not-started"}]
    }))
}

async fn reject_upload(State(uploads): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
    uploads.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_GATEWAY, "ingestion worker offline")
}

async fn spawn_upload_server(accept: bool) -> (String, Arc<AtomicUsize>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let uploads = Arc::new(AtomicUsize::new(0));
    let app = if accept {
        Router::new().route("/draft-answers", post(accept_upload))
    } else {
        Router::new().route("/draft-answers", post(reject_upload))
    }
    .with_state(uploads.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), uploads)
}

fn intake(base_url: &str, cache: Arc<MemoryDocumentCache>) -> DocumentIntake {
    let api = Arc::new(HttpRfiClient::new(base_url).expect("client"));
    DocumentIntake::new(api, cache, "RFP_Coordinator")
}

#[test]
fn bundled_demo_document_decodes() {
    let document = demo_document().expect("fixture");
    assert!(!document.questions.is_empty());
    assert_eq!(document.source_id(), "demo-source-0001");
}

#[tokio::test]
async fn successful_upload_is_cached_before_returning() {
    let (base_url, _uploads) = spawn_upload_server(true).await;
    let cache = Arc::new(MemoryDocumentCache::new());

    let outcome = intake(&base_url, cache.clone())
        .submit(&DocumentUpload::new("rfi.pdf", b"%PDF-1.7".to_vec()))
        .await
        .expect("upload");

    assert_eq!(outcome.source, IntakeSource::Server);
    assert_eq!(outcome.document_id(), &DocumentId::new("resp-42"));
    assert!(cache
        .load(&DocumentId::new("resp-42"))
        .await
        .expect("read")
        .is_some());
}

#[tokio::test]
async fn failed_upload_surfaces_the_status_without_fallback() {
    let (base_url, _uploads) = spawn_upload_server(false).await;
    let cache = Arc::new(MemoryDocumentCache::new());

    let err = intake(&base_url, cache.clone())
        .submit(&DocumentUpload::new("rfi.docx", b"PK".to_vec()))
        .await
        .expect_err("502");

    assert_eq!(
        err.to_string(),
        "Bad gateway (502): the server is temporarily unreachable - ingestion worker offline"
    );
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn failed_upload_opens_the_demo_document_when_enabled() {
    let (base_url, _uploads) = spawn_upload_server(false).await;
    let cache = Arc::new(MemoryDocumentCache::new());

    let outcome = intake(&base_url, cache.clone())
        .with_demo_fallback(true)
        .submit(&DocumentUpload::new("rfi.xlsx", b"PK".to_vec()))
        .await
        .expect("fallback");

    assert_eq!(outcome.source, IntakeSource::Fixture);
    assert_eq!(outcome.document_id(), &DocumentId::new("demo-rfi-0001"));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn invalid_files_never_fall_back() {
    let (base_url, uploads) = spawn_upload_server(true).await;

    let err = intake(&base_url, Arc::new(MemoryDocumentCache::new()))
        .with_demo_fallback(true)
        .submit(&DocumentUpload::new("photo.jpg", vec![1, 2, 3]))
        .await
        .expect_err("invalid type");

    assert_eq!(
        err.to_string(),
        "Invalid file type! Please upload PDF, Word, Excel or Markdown files."
    );
    assert_eq!(uploads.load(Ordering::SeqCst), 0);
}
