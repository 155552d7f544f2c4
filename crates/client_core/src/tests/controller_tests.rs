use super::*;
use crate::{
    cache::MemoryDocumentCache,
    knowledge_base::KnowledgeBaseEntry,
    validation::DocumentUpload,
    workspace::{Operation, EXPORT_SUCCEEDED_ALERT},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{ActiveRfiSummary, AuditEvent, Suggestion},
    error::ErrorCode,
    protocol::{
        ExportResponse, KnowledgeBaseSubmitResponse, SectionUpdateRequest, SectionUpdateResponse,
        SubmitReviewRequest, SubmitReviewResponse,
    },
};
use tokio::sync::oneshot;

fn document(progress: u8) -> ResponseDocument {
    ResponseDocument::decode(json!({
        "id": "doc-1",
        "title": "Acme CRO RFI",
        "section": "Clinical Operations",
        "progress": progress,
        "questions": [
            {"id": 1, "question": "Company name?", "response": "Acme Research", "status": "completed"},
            {"id": 2, "question": "Headcount?", "response": "", "status": "not-started"},
            {"id": 3, "question": "Safety process?", "response": "PV team.", "status": "in-progress"}
        ]
    }))
    .expect("document")
}

fn unavailable() -> GatewayError {
    GatewayError::Status {
        status: 503,
        detail: None,
    }
}

#[derive(Default)]
struct FakeApi {
    document: Option<ResponseDocument>,
    fail_sections_with: Option<u16>,
    search_results: Vec<Suggestion>,
    calls: Mutex<Vec<String>>,
    section_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeApi {
    fn serving(document: ResponseDocument) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    async fn record(&self, call: impl Into<String>) {
        self.calls.lock().await.push(call.into());
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl RfiApi for FakeApi {
    async fn upload_document(
        &self,
        _upload: &DocumentUpload,
        _user: &str,
    ) -> Result<ResponseDocument, GatewayError> {
        self.record("upload").await;
        Err(unavailable())
    }

    async fn document_status(&self, _id: &DocumentId) -> Result<ResponseDocument, GatewayError> {
        Err(unavailable())
    }

    async fn list_active(&self) -> Result<Vec<ActiveRfiSummary>, GatewayError> {
        Ok(Vec::new())
    }

    async fn fetch_document(&self, id: &DocumentId) -> Result<ResponseDocument, GatewayError> {
        self.record(format!("fetch {id}")).await;
        self.document.clone().ok_or_else(unavailable)
    }

    async fn update_section(
        &self,
        request: &SectionUpdateRequest,
    ) -> Result<SectionUpdateResponse, GatewayError> {
        self.record(format!("{:?} {}", request.status, request.question_id))
            .await;
        let gate = self.section_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(status) = self.fail_sections_with {
            return Err(GatewayError::Status {
                status,
                detail: None,
            });
        }
        let response = match request.status {
            SectionAction::Draft => format!("Draft for: {}", request.question),
            _ => request.response.clone(),
        };
        let Value::Object(data) = json!({
            "questionId": request.question_id,
            "response": response,
            "status": request.status,
        }) else {
            panic!("object literal");
        };
        Ok(SectionUpdateResponse {
            success: true,
            data,
        })
    }

    async fn submit_review(
        &self,
        request: &SubmitReviewRequest,
    ) -> Result<SubmitReviewResponse, GatewayError> {
        self.record(format!("review {} by {}", request.response_id, request.user))
            .await;
        Ok(SubmitReviewResponse {
            message: Some("Queued for review".into()),
            success: true,
        })
    }

    async fn search_knowledge_base(&self, text: &str) -> Result<Vec<Suggestion>, GatewayError> {
        self.record(format!("search {text}")).await;
        Ok(self.search_results.clone())
    }

    async fn export_document(&self, id: &DocumentId) -> Result<ExportResponse, GatewayError> {
        self.record(format!("export {id}")).await;
        Ok(ExportResponse {
            filename: "../RFI doc-1.docx".into(),
            success: true,
            message: None,
            file_path: None,
        })
    }

    async fn download_export(&self, filename: &str) -> Result<Vec<u8>, GatewayError> {
        self.record(format!("download {filename}")).await;
        Ok(b"artifact".to_vec())
    }

    async fn audit_trail(&self, _id: &DocumentId) -> Result<Vec<AuditEvent>, GatewayError> {
        Ok(Vec::new())
    }

    async fn submit_knowledge_base_entry(
        &self,
        _entry: &KnowledgeBaseEntry,
    ) -> Result<KnowledgeBaseSubmitResponse, GatewayError> {
        Ok(KnowledgeBaseSubmitResponse::default())
    }
}

fn controller(api: Arc<FakeApi>, cache: Arc<MemoryDocumentCache>) -> WorkspaceController {
    WorkspaceController::new(api, cache, ControllerSettings::default())
}

#[tokio::test]
async fn load_from_server_selects_first_question_and_caches() {
    let api = Arc::new(FakeApi::serving(document(40)));
    let cache = Arc::new(MemoryDocumentCache::new());
    let controller = controller(api, cache.clone());

    let source = controller
        .load(&DocumentId::new("doc-1"))
        .await
        .expect("load");
    assert_eq!(source, LoadSource::Server);

    let state = controller.snapshot().await;
    assert_eq!(state.selected_index(), 0);
    assert_eq!(state.edit_buffer(), "Acme Research");
    assert!(cache
        .load(&DocumentId::new("doc-1"))
        .await
        .expect("cache read")
        .is_some());
}

#[tokio::test]
async fn load_falls_back_to_the_cache() {
    let cache = Arc::new(MemoryDocumentCache::new());
    cache.store(&document(60)).await.expect("seed cache");
    let controller = controller(Arc::new(FakeApi::default()), cache);

    let source = controller
        .load(&DocumentId::new("doc-1"))
        .await
        .expect("load");
    assert_eq!(source, LoadSource::Cache);
    assert_eq!(
        controller.snapshot().await.document().map(|d| d.progress),
        Some(60)
    );
}

#[tokio::test]
async fn load_fails_visibly_when_nothing_is_available() {
    let controller = controller(
        Arc::new(FakeApi::default()),
        Arc::new(MemoryDocumentCache::new()),
    );

    let err = controller
        .load(&DocumentId::new("missing"))
        .await
        .expect_err("not found");
    assert!(matches!(err, WorkspaceError::NotFound(_)));

    let state = controller.snapshot().await;
    let status = state.operation(Operation::Load);
    assert!(!status.loading);
    assert_eq!(status.error.map(|e| e.code), Some(ErrorCode::NotFound));
    assert!(state.document().is_none());
}

#[tokio::test]
async fn save_writes_the_merged_document_to_the_cache() {
    let api = Arc::new(FakeApi::serving(document(40)));
    let cache = Arc::new(MemoryDocumentCache::new());
    let controller = controller(api.clone(), cache.clone());
    controller.load(&DocumentId::new("doc-1")).await.expect("load");

    controller.select_question(1).await.expect("select");
    controller.set_edit_buffer("About 900 staff.").await;
    let outcome = controller.save_section().await.expect("save");
    assert_eq!(outcome, ApplyOutcome::Applied);

    let cached = cache
        .load(&DocumentId::new("doc-1"))
        .await
        .expect("cache read")
        .expect("cached");
    assert_eq!(cached.questions[1].response, "About 900 staff.");
    assert_eq!(api.calls().await, vec!["fetch doc-1", "Save 2"]);
}

#[tokio::test]
async fn failed_generate_draft_leaves_buffer_and_cache_alone() {
    let api = Arc::new(FakeApi {
        fail_sections_with: Some(500),
        ..FakeApi::serving(document(40))
    });
    let cache = Arc::new(MemoryDocumentCache::new());
    let controller = controller(api, cache.clone());
    controller.load(&DocumentId::new("doc-1")).await.expect("load");
    controller.set_edit_buffer("my edits").await;

    let err = controller.generate_draft().await.expect_err("500");
    assert!(err.to_string().to_lowercase().contains("server error"));

    let state = controller.snapshot().await;
    assert_eq!(state.edit_buffer(), "my edits");
    assert_eq!(
        state.selected_question().map(|q| q.response.as_str()),
        Some("Acme Research")
    );
    let cached = cache
        .load(&DocumentId::new("doc-1"))
        .await
        .expect("cache read")
        .expect("cached");
    assert_eq!(cached.questions[0].response, "Acme Research");
}

#[tokio::test]
async fn late_draft_for_a_previous_question_is_discarded() {
    let (release, gate) = oneshot::channel();
    let api = Arc::new(FakeApi::serving(document(40)));
    *api.section_gate.lock().await = Some(gate);
    let controller = Arc::new(controller(api, Arc::new(MemoryDocumentCache::new())));
    controller.load(&DocumentId::new("doc-1")).await.expect("load");

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.generate_draft().await })
    };
    while !controller
        .snapshot()
        .await
        .is_loading(Operation::GenerateDraft)
    {
        tokio::task::yield_now().await;
    }

    assert!(matches!(
        controller.generate_draft().await,
        Err(WorkspaceError::InFlight(Operation::GenerateDraft))
    ));

    controller.select_question(2).await.expect("navigate");
    let _ = release.send(());
    let outcome = pending.await.expect("join").expect("generate");
    assert_eq!(outcome, ApplyOutcome::Stale);

    let state = controller.snapshot().await;
    assert_eq!(state.edit_buffer(), "PV team.");
    let document = state.document().expect("document");
    assert_eq!(document.questions[0].response, "Acme Research");
    assert!(!state.is_loading(Operation::GenerateDraft));
}

#[tokio::test]
async fn search_insert_and_clear() {
    let api = Arc::new(FakeApi {
        search_results: vec![Suggestion {
            id: SuggestionId::new("kb-9"),
            category: "Safety".into(),
            title: "PV".into(),
            snippet: "...".into(),
            full_text: "Question: Who handles PV?\n\nAnswer: Our in-house PV team.".into(),
        }],
        ..FakeApi::serving(document(40))
    });
    let cache = Arc::new(MemoryDocumentCache::new());
    let controller = controller(api.clone(), cache.clone());
    controller.load(&DocumentId::new("doc-1")).await.expect("load");

    assert_eq!(controller.search("  ").await.expect("blank"), None);
    assert_eq!(
        controller.search("safety").await.expect("search"),
        Some(ApplyOutcome::Applied)
    );
    assert!(controller.snapshot().await.showing_search_results());

    assert!(controller.insert_suggestion(&SuggestionId::new("kb-9")).await);
    assert!(!controller.insert_suggestion(&SuggestionId::new("nope")).await);
    assert_eq!(
        controller.snapshot().await.edit_buffer(),
        "Acme Research\n\nOur in-house PV team."
    );

    controller.save_section().await.expect("save");
    let cached = cache
        .load(&DocumentId::new("doc-1"))
        .await
        .expect("cache read")
        .expect("cached");
    assert!(cached.questions[0].search_results.is_none());

    controller.clear_search().await;
    assert!(!controller.snapshot().await.showing_search_results());
    assert_eq!(
        api.calls().await,
        vec!["fetch doc-1", "search safety", "Save 1"]
    );
}

#[tokio::test]
async fn review_below_full_progress_sends_nothing() {
    let api = Arc::new(FakeApi::serving(document(87)));
    let controller = controller(api.clone(), Arc::new(MemoryDocumentCache::new()));
    controller.load(&DocumentId::new("doc-1")).await.expect("load");

    assert!(matches!(
        controller.submit_review().await,
        Err(WorkspaceError::ReviewNotReady(87))
    ));
    assert_eq!(api.calls().await, vec!["fetch doc-1"]);
}

#[tokio::test]
async fn review_at_full_progress_raises_the_server_message() {
    let api = Arc::new(FakeApi::serving(document(100)));
    let controller = controller(api.clone(), Arc::new(MemoryDocumentCache::new()));
    controller.load(&DocumentId::new("doc-1")).await.expect("load");

    controller.submit_review().await.expect("submit");
    let state = controller.snapshot().await;
    assert_eq!(
        state.notice(Utc::now()).map(|n| n.message.as_str()),
        Some("Queued for review")
    );
    assert!(api.calls().await.contains(&"review doc-1 by Bob".to_string()));
}

#[tokio::test]
async fn export_writes_the_artifact_and_raises_the_alert() {
    let api = Arc::new(FakeApi::serving(document(40)));
    let controller = controller(api.clone(), Arc::new(MemoryDocumentCache::new()));
    controller.load(&DocumentId::new("doc-1")).await.expect("load");
    let dir = tempfile::tempdir().expect("tempdir");

    let artifact = controller
        .export(&dir.path().join("exports"))
        .await
        .expect("export");
    assert_eq!(artifact.path, dir.path().join("exports").join("RFI doc-1.docx"));
    assert_eq!(artifact.size, 8);
    assert_eq!(
        tokio::fs::read(&artifact.path).await.expect("read"),
        b"artifact"
    );
    assert_eq!(
        controller.snapshot().await.alert(),
        Some(EXPORT_SUCCEEDED_ALERT)
    );
    assert_eq!(
        api.calls().await[1..],
        ["export doc-1".to_string(), "download ../RFI doc-1.docx".to_string()]
    );
}

#[tokio::test]
async fn export_alert_is_shown_once() {
    let api = Arc::new(FakeApi::serving(document(40)));
    let controller = controller(api, Arc::new(MemoryDocumentCache::new()));
    controller.load(&DocumentId::new("doc-1")).await.expect("load");
    let dir = tempfile::tempdir().expect("tempdir");

    controller.export(dir.path()).await.expect("export");
    assert_eq!(
        controller.take_alert().await.as_deref(),
        Some(EXPORT_SUCCEEDED_ALERT)
    );

    controller.next_question().await.expect("next");
    controller.save_section().await.expect("save");
    assert_eq!(controller.take_alert().await, None);
    assert_eq!(controller.snapshot().await.alert(), None);
}
