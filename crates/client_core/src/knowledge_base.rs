//! Knowledge base contribution form and its submission state.

use std::path::Path;

use shared::{
    domain::KnowledgeBaseEntryType, error::ApiError, protocol::KnowledgeBaseSubmitResponse,
};
use uuid::Uuid;

use crate::{
    error::ValidationError,
    validation::{guess_mime_type, normalize_mime_type, MAX_UPLOAD_BYTES},
};

pub const DEFAULT_CONFIRMATION: &str = "Knowledge base entry submitted successfully for approval!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        Self {
            id: Uuid::new_v4(),
            mime_type: guess_mime_type(&filename),
            filename,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl AsRef<str>) -> Self {
        self.mime_type = normalize_mime_type(mime_type.as_ref());
        self
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Draft of a knowledge base entry. Service entries additionally need a
/// service name and category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBaseEntry {
    pub entry_type: KnowledgeBaseEntryType,
    pub service_name: String,
    pub service_category: String,
    pub description: String,
    pub tags: String,
    pub attachments: Vec<Attachment>,
}

impl KnowledgeBaseEntry {
    pub fn new(entry_type: KnowledgeBaseEntryType, description: impl Into<String>) -> Self {
        Self {
            entry_type,
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_service(mut self, name: impl Into<String>, category: impl Into<String>) -> Self {
        self.service_name = name.into();
        self.service_category = category.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn is_service(&self) -> bool {
        self.entry_type == KnowledgeBaseEntryType::Service
    }

    pub fn add_attachment(&mut self, attachment: Attachment) -> Uuid {
        let id = attachment.id;
        self.attachments.push(attachment);
        id
    }

    pub fn remove_attachment(&mut self, id: Uuid) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|attachment| attachment.id != id);
        self.attachments.len() != before
    }

    /// Back to an empty service entry.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Collects every problem instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.description.trim().is_empty() {
            errors.push("Description is required".to_string());
        }

        if self.is_service() {
            if self.service_name.trim().is_empty() {
                errors.push("Service name is required for service entries".to_string());
            }
            if self.service_category.trim().is_empty() {
                errors.push("Service category is required for service entries".to_string());
            }
        }

        for attachment in &self.attachments {
            if attachment.size() > MAX_UPLOAD_BYTES {
                errors.push(format!(
                    "File \"{}\" exceeds 10MB limit",
                    attachment.filename
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Entry(errors))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBaseState {
    pub is_submitting: bool,
    pub success_message: Option<String>,
    pub error: Option<ApiError>,
}

impl KnowledgeBaseState {
    pub fn pending(&mut self) {
        self.is_submitting = true;
        self.success_message = None;
        self.error = None;
    }

    pub fn fulfilled(&mut self, response: &KnowledgeBaseSubmitResponse) {
        self.is_submitting = false;
        self.error = None;
        self.success_message = Some(
            response
                .message
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIRMATION.to_string()),
        );
    }

    pub fn rejected(&mut self, error: ApiError) {
        self.is_submitting = false;
        self.success_message = None;
        self.error = Some(error);
    }

    pub fn clear_messages(&mut self) {
        self.success_message = None;
        self.error = None;
    }
}

#[cfg(test)]
#[path = "tests/knowledge_base_tests.rs"]
mod tests;
