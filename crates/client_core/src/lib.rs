use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{ActiveRfiSummary, AuditEvent, DocumentId, ResponseDocument, Suggestion},
    protocol::{
        ActiveRfiListResponse, ExportResponse, KnowledgeBaseSubmitResponse,
        SearchKnowledgeBaseRequest, SearchKnowledgeBaseResponse, SectionUpdateRequest,
        SectionUpdateResponse, SubmitReviewRequest, SubmitReviewResponse,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod cache;
pub mod controller;
pub mod error;
pub mod intake;
pub mod knowledge_base;
pub mod store;
pub mod validation;
pub mod view;
pub mod workspace;

pub use cache::{DocumentCache, MemoryDocumentCache};
pub use controller::{ControllerSettings, ExportedArtifact, LoadSource, WorkspaceController};
pub use error::{GatewayError, ValidationError, WorkspaceError};
pub use intake::{DocumentIntake, IntakeOutcome, IntakeSource};
pub use knowledge_base::{Attachment, KnowledgeBaseEntry, KnowledgeBaseState};
pub use validation::DocumentUpload;
pub use workspace::{ApplyOutcome, Operation, Workspace};

use error::extract_detail;

/// Default ceiling for document uploads; processing can take a long time.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Every remote call the client makes. Implemented over HTTP by
/// [`HttpRfiClient`]; tests substitute in-process fakes.
#[async_trait]
pub trait RfiApi: Send + Sync {
    async fn upload_document(
        &self,
        upload: &DocumentUpload,
        user: &str,
    ) -> Result<ResponseDocument, GatewayError>;
    async fn document_status(&self, id: &DocumentId) -> Result<ResponseDocument, GatewayError>;
    async fn list_active(&self) -> Result<Vec<ActiveRfiSummary>, GatewayError>;
    async fn fetch_document(&self, id: &DocumentId) -> Result<ResponseDocument, GatewayError>;
    async fn update_section(
        &self,
        request: &SectionUpdateRequest,
    ) -> Result<SectionUpdateResponse, GatewayError>;
    async fn submit_review(
        &self,
        request: &SubmitReviewRequest,
    ) -> Result<SubmitReviewResponse, GatewayError>;
    async fn search_knowledge_base(&self, text: &str) -> Result<Vec<Suggestion>, GatewayError>;
    async fn export_document(&self, id: &DocumentId) -> Result<ExportResponse, GatewayError>;
    async fn download_export(&self, filename: &str) -> Result<Vec<u8>, GatewayError>;
    async fn audit_trail(&self, id: &DocumentId) -> Result<Vec<AuditEvent>, GatewayError>;
    async fn submit_knowledge_base_entry(
        &self,
        entry: &KnowledgeBaseEntry,
    ) -> Result<KnowledgeBaseSubmitResponse, GatewayError>;
}

#[derive(Clone)]
pub struct HttpRfiClient {
    http: Client,
    api_url: Url,
    download_url: Url,
    upload_timeout: Duration,
}

impl HttpRfiClient {
    pub fn new(api_url: &str) -> Result<Self, GatewayError> {
        let api_url = Url::parse(api_url)?;
        Ok(Self {
            http: Client::new(),
            download_url: api_url.clone(),
            api_url,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        })
    }

    pub fn with_download_url(mut self, download_url: &str) -> Result<Self, GatewayError> {
        self.download_url = Url::parse(download_url)?;
        Ok(self)
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn download_url_for(&self, filename: &str) -> Result<Url, GatewayError> {
        join_segments(&self.download_url, &["download", filename])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        join_segments(&self.api_url, segments)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = check_response(request.send().await?).await?;
        decode_json(response).await
    }

    async fn fetch_document_at(&self, url: Url) -> Result<ResponseDocument, GatewayError> {
        let value: Value = self.get_json(self.http.get(url)).await?;
        Ok(ResponseDocument::decode(unwrap_envelope(value))?)
    }
}

#[async_trait]
impl RfiApi for HttpRfiClient {
    async fn upload_document(
        &self,
        upload: &DocumentUpload,
        user: &str,
    ) -> Result<ResponseDocument, GatewayError> {
        upload.validate()?;

        let file = Part::bytes(upload.bytes.clone())
            .file_name(upload.filename.clone())
            .mime_str(&upload.mime_type)?;
        let form = Form::new()
            .part("file", file)
            .text("fileName", upload.filename.clone())
            .text("fileType", upload.file_type())
            .text("size", upload.size().to_string())
            .text("user", user.to_string());

        info!(
            filename = %upload.filename,
            size = upload.size(),
            "uploading source document"
        );
        let request = self
            .http
            .post(self.endpoint(&["draft-answers"])?)
            .timeout(self.upload_timeout)
            .multipart(form);
        let value: Value = self.get_json(request).await?;
        let document = ResponseDocument::decode(unwrap_envelope(value))?;
        info!(document_id = %document.id, "source document accepted");
        Ok(document)
    }

    async fn document_status(&self, id: &DocumentId) -> Result<ResponseDocument, GatewayError> {
        self.fetch_document_at(self.endpoint(&["draft-answers", id.as_str()])?)
            .await
    }

    async fn list_active(&self) -> Result<Vec<ActiveRfiSummary>, GatewayError> {
        let response: ActiveRfiListResponse = self
            .get_json(self.http.get(self.endpoint(&["activeRFIList"])?))
            .await?;
        Ok(response.data)
    }

    async fn fetch_document(&self, id: &DocumentId) -> Result<ResponseDocument, GatewayError> {
        let mut url = self.endpoint(&["response"])?;
        url.query_pairs_mut().append_pair("id", id.as_str());
        debug!(document_id = %id, "fetching response document");
        self.fetch_document_at(url).await
    }

    async fn update_section(
        &self,
        request: &SectionUpdateRequest,
    ) -> Result<SectionUpdateResponse, GatewayError> {
        debug!(
            question_id = %request.question_id,
            action = ?request.status,
            "sending section update"
        );
        let response: SectionUpdateResponse = self
            .get_json(
                self.http
                    .post(self.endpoint(&[request.status.endpoint()])?)
                    .json(request),
            )
            .await?;
        response.validate()?;
        Ok(response)
    }

    async fn submit_review(
        &self,
        request: &SubmitReviewRequest,
    ) -> Result<SubmitReviewResponse, GatewayError> {
        self.get_json(
            self.http
                .post(self.endpoint(&["submitReview"])?)
                .json(request),
        )
        .await
    }

    async fn search_knowledge_base(&self, text: &str) -> Result<Vec<Suggestion>, GatewayError> {
        let response: SearchKnowledgeBaseResponse = self
            .get_json(
                self.http
                    .post(self.endpoint(&["searchKnowledgeBase"])?)
                    .json(&SearchKnowledgeBaseRequest {
                        search_text: text.to_string(),
                    }),
            )
            .await?;
        Ok(response.into_results())
    }

    async fn export_document(&self, id: &DocumentId) -> Result<ExportResponse, GatewayError> {
        let response: ExportResponse = self
            .get_json(self.http.get(self.endpoint(&["exportRFI", id.as_str()])?))
            .await?;
        if response.filename.trim().is_empty() {
            return Err(GatewayError::Malformed(
                "export response has an empty filename".into(),
            ));
        }
        Ok(response)
    }

    async fn download_export(&self, filename: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .http
            .get(self.download_url_for(filename)?)
            .send()
            .await?;
        let bytes = check_response(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn audit_trail(&self, id: &DocumentId) -> Result<Vec<AuditEvent>, GatewayError> {
        let mut url = self.endpoint(&["auditTrail"])?;
        url.query_pairs_mut().append_pair("id", id.as_str());
        self.get_json(self.http.get(url)).await
    }

    async fn submit_knowledge_base_entry(
        &self,
        entry: &KnowledgeBaseEntry,
    ) -> Result<KnowledgeBaseSubmitResponse, GatewayError> {
        entry.validate()?;

        let mut form = Form::new().text("entryType", entry.entry_type.as_str());
        if !entry.service_name.trim().is_empty() {
            form = form.text("serviceName", entry.service_name.trim().to_string());
        }
        if !entry.service_category.trim().is_empty() {
            form = form.text("serviceCategory", entry.service_category.trim().to_string());
        }
        form = form
            .text("description", entry.description.trim().to_string())
            .text("tags", entry.tag_list().join(","));
        for attachment in &entry.attachments {
            let part = Part::bytes(attachment.bytes.clone())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.mime_type)?;
            form = form.part("attachments", part);
        }

        info!(
            entry_type = %entry.entry_type,
            attachments = entry.attachments.len(),
            "submitting knowledge base entry"
        );
        let response = self
            .http
            .post(self.endpoint(&["addKnowledgeBase"])?)
            .multipart(form)
            .send()
            .await?;
        let body = check_response(response).await?.text().await?;
        Ok(KnowledgeBaseSubmitResponse::from_body(&body))
    }
}

/// Maps any non-2xx status to [`GatewayError::Status`], keeping whatever
/// detail the server put in the body.
async fn check_response(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "request failed");
    Err(GatewayError::Status {
        status: status.as_u16(),
        detail: extract_detail(&body),
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| GatewayError::Malformed(err.to_string()))
}

/// Some endpoints wrap the document as `{success, data: {...}}`.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if !map.contains_key("id") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, GatewayError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
