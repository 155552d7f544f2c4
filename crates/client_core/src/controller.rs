//! Async driver around [`Workspace`].
//!
//! The lock is never held across a network call: state is read and marked
//! under the lock, the request runs unlocked, and the result is applied under
//! a fresh lock. Tickets from [`Workspace`] decide whether a late result still
//! applies.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use shared::{
    domain::{DocumentId, ResponseDocument, SuggestionId},
    protocol::SectionAction,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    cache::DocumentCache,
    error::{GatewayError, WorkspaceError},
    workspace::{ApplyOutcome, Workspace},
    RfiApi,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Actor recorded on section updates.
    pub user: String,
    /// Actor recorded on review submission.
    pub reviewer: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            user: "Alice".to_string(),
            reviewer: "Bob".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Server,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub size: usize,
}

pub struct WorkspaceController {
    api: Arc<dyn RfiApi>,
    cache: Arc<dyn DocumentCache>,
    settings: ControllerSettings,
    state: Mutex<Workspace>,
}

impl WorkspaceController {
    pub fn new(
        api: Arc<dyn RfiApi>,
        cache: Arc<dyn DocumentCache>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            api,
            cache,
            settings,
            state: Mutex::new(Workspace::new()),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Copy of the current state for rendering.
    pub async fn snapshot(&self) -> Workspace {
        self.state.lock().await.clone()
    }

    /// Hands over the pending alert and clears it so it is shown once.
    pub async fn take_alert(&self) -> Option<String> {
        self.state.lock().await.take_alert()
    }

    /// Fetches the document, falling back to the local cache when the server
    /// cannot provide it.
    pub async fn load(&self, id: &DocumentId) -> Result<LoadSource, WorkspaceError> {
        self.state.lock().await.begin_load()?;

        let err = match self.api.fetch_document(id).await {
            Ok(document) => {
                self.persist(&document).await;
                self.state.lock().await.open(document);
                return Ok(LoadSource::Server);
            }
            Err(err) => err,
        };

        warn!(document_id = %id, error = %err, "fetch failed, trying local cache");
        match self.cache.load(id).await {
            Ok(Some(document)) => {
                info!(document_id = %id, "opened cached copy");
                self.state.lock().await.open(document);
                Ok(LoadSource::Cache)
            }
            Ok(None) => self.fail_load(id).await,
            Err(cache_err) => {
                warn!(document_id = %id, error = %cache_err, "local cache read failed");
                self.fail_load(id).await
            }
        }
    }

    pub async fn select_question(&self, index: usize) -> Result<(), WorkspaceError> {
        self.state.lock().await.select_question(index)
    }

    pub async fn next_question(&self) -> Result<bool, WorkspaceError> {
        self.state.lock().await.next_question()
    }

    pub async fn previous_question(&self) -> Result<bool, WorkspaceError> {
        self.state.lock().await.previous_question()
    }

    pub async fn set_edit_buffer(&self, text: impl Into<String>) {
        self.state.lock().await.set_edit_buffer(text);
    }

    pub async fn generate_draft(&self) -> Result<ApplyOutcome, WorkspaceError> {
        self.update_section(SectionAction::Draft).await
    }

    pub async fn save_section(&self) -> Result<ApplyOutcome, WorkspaceError> {
        self.update_section(SectionAction::Save).await
    }

    pub async fn mark_complete(&self) -> Result<ApplyOutcome, WorkspaceError> {
        self.update_section(SectionAction::Completed).await
    }

    async fn update_section(&self, action: SectionAction) -> Result<ApplyOutcome, WorkspaceError> {
        let (ticket, request) = self
            .state
            .lock()
            .await
            .begin_section_update(action, &self.settings.user)?;

        let result = self.api.update_section(&request).await;

        let (outcome, document) = {
            let mut state = self.state.lock().await;
            let outcome = state.complete_section_update(&ticket, result)?;
            (outcome, state.document().cloned())
        };
        if let (ApplyOutcome::Applied, Some(document)) = (outcome, document) {
            self.persist(&document).await;
        }
        Ok(outcome)
    }

    /// Returns `Ok(None)` when the query is blank and nothing was sent.
    pub async fn search(&self, text: &str) -> Result<Option<ApplyOutcome>, WorkspaceError> {
        let Some((ticket, query)) = self.state.lock().await.begin_search(text)? else {
            return Ok(None);
        };
        let result = self.api.search_knowledge_base(&query).await;
        self.state
            .lock()
            .await
            .complete_search(&ticket, result)
            .map(Some)
    }

    pub async fn clear_search(&self) {
        self.state.lock().await.clear_search();
    }

    /// Appends the answer part of a visible suggestion to the edit buffer.
    pub async fn insert_suggestion(&self, id: &SuggestionId) -> bool {
        let mut state = self.state.lock().await;
        let suggestion = state
            .visible_suggestions()
            .iter()
            .find(|suggestion| &suggestion.id == id)
            .cloned();
        match suggestion {
            Some(suggestion) => state.insert_suggestion(&suggestion),
            None => false,
        }
    }

    pub async fn toggle_comparison(&self, id: &SuggestionId) {
        self.state.lock().await.toggle_comparison(id);
    }

    pub async fn submit_review(&self) -> Result<ApplyOutcome, WorkspaceError> {
        let (ticket, request) = self
            .state
            .lock()
            .await
            .begin_submit_review(&self.settings.reviewer)?;
        info!(response_id = %request.response_id, "submitting for review");
        let result = self.api.submit_review(&request).await;
        self.state
            .lock()
            .await
            .complete_submit_review(&ticket, result, Utc::now())
    }

    /// Requests an export and writes the artifact into `download_dir`.
    pub async fn export(&self, download_dir: &Path) -> Result<ExportedArtifact, WorkspaceError> {
        let (ticket, id) = self.state.lock().await.begin_export()?;
        let result = self.export_to(&id, download_dir).await;
        self.state.lock().await.complete_export(&ticket, result)
    }

    async fn export_to(
        &self,
        id: &DocumentId,
        download_dir: &Path,
    ) -> Result<ExportedArtifact, WorkspaceError> {
        let export = self.api.export_document(id).await?;
        let bytes = self.api.download_export(&export.filename).await?;

        let local_name = Path::new(&export.filename)
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                GatewayError::Malformed(format!("unusable export filename {:?}", export.filename))
            })?;
        tokio::fs::create_dir_all(download_dir).await?;
        let path = download_dir.join(local_name);
        tokio::fs::write(&path, &bytes).await?;

        info!(document_id = %id, path = %path.display(), "export written");
        Ok(ExportedArtifact {
            filename: export.filename,
            path,
            size: bytes.len(),
        })
    }

    async fn fail_load(&self, id: &DocumentId) -> Result<LoadSource, WorkspaceError> {
        let err = WorkspaceError::NotFound(id.clone());
        self.state.lock().await.fail_load(&err);
        Err(err)
    }

    /// Cache writes never fail the calling operation. Search results are
    /// transient and stay out of the cache.
    async fn persist(&self, document: &ResponseDocument) {
        let mut document = document.clone();
        for question in &mut document.questions {
            question.search_results = None;
        }
        if let Err(err) = self.cache.store(&document).await {
            warn!(document_id = %document.id, error = %err, "failed to update local cache");
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
