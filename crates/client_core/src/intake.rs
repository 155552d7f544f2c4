//! Source document upload, the entry point that yields a document id for the
//! workspace.

use std::sync::Arc;

use shared::{
    domain::{DocumentId, ResponseDocument},
    error::SchemaError,
};
use tracing::{info, warn};

use crate::{cache::DocumentCache, error::GatewayError, validation::DocumentUpload, RfiApi};

const DEMO_RESPONSE: &str = include_str!("../fixtures/demo_response.json");

/// Bundled document used when uploads fail and demo fallback is enabled.
pub fn demo_document() -> Result<ResponseDocument, SchemaError> {
    ResponseDocument::decode(serde_json::from_str(DEMO_RESPONSE)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeSource {
    Server,
    Fixture,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntakeOutcome {
    pub document: ResponseDocument,
    pub source: IntakeSource,
}

impl IntakeOutcome {
    pub fn document_id(&self) -> &DocumentId {
        &self.document.id
    }
}

pub struct DocumentIntake {
    api: Arc<dyn RfiApi>,
    cache: Arc<dyn DocumentCache>,
    user: String,
    demo_fallback: bool,
}

impl DocumentIntake {
    pub fn new(api: Arc<dyn RfiApi>, cache: Arc<dyn DocumentCache>, user: impl Into<String>) -> Self {
        Self {
            api,
            cache,
            user: user.into(),
            demo_fallback: false,
        }
    }

    pub fn with_demo_fallback(mut self, enabled: bool) -> Self {
        self.demo_fallback = enabled;
        self
    }

    /// Validation failures are returned as-is; only a failed upload can fall
    /// back to the demo document.
    pub async fn submit(&self, upload: &DocumentUpload) -> Result<IntakeOutcome, GatewayError> {
        upload.validate()?;

        let (document, source) = match self.api.upload_document(upload, &self.user).await {
            Ok(document) => (document, IntakeSource::Server),
            Err(err) if self.demo_fallback => {
                warn!(
                    filename = %upload.filename,
                    error = %err,
                    "upload failed, opening demo document"
                );
                (demo_document()?, IntakeSource::Fixture)
            }
            Err(err) => return Err(err),
        };

        self.remember(&document).await;
        info!(document_id = %document.id, source = ?source, "intake complete");
        Ok(IntakeOutcome { document, source })
    }

    /// Polls the server's processing status for an uploaded document.
    pub async fn status(&self, id: &DocumentId) -> Result<ResponseDocument, GatewayError> {
        let document = self.api.document_status(id).await?;
        self.remember(&document).await;
        Ok(document)
    }

    async fn remember(&self, document: &ResponseDocument) {
        if let Err(err) = self.cache.store(document).await {
            warn!(document_id = %document.id, error = %err, "failed to cache uploaded document");
        }
    }
}

#[cfg(test)]
#[path = "tests/intake_tests.rs"]
mod tests;
