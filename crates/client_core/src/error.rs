use serde_json::Value;
use shared::{
    domain::DocumentId,
    error::{ApiError, ErrorCode, SchemaError},
};
use thiserror::Error;

use crate::workspace::Operation;

const MIB: f64 = 1024.0 * 1024.0;
const MAX_DETAIL_CHARS: usize = 300;

/// Client-side rejection raised before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid file type! Please upload PDF, Word, Excel or Markdown files.")]
    UnsupportedFileType { mime_type: String },
    #[error(
        "File size exceeds the maximum limit of 10MB. Current file size: {}MB",
        megabytes(.size_bytes)
    )]
    FileTooLarge { size_bytes: u64 },
    #[error("Validation errors: {}", join_messages(.0))]
    Entry(Vec<String>),
}

fn megabytes(size_bytes: &u64) -> String {
    format!("{:.2}", *size_bytes as f64 / MIB)
}

fn join_messages(messages: &[String]) -> String {
    messages.join(", ")
}

fn status_message(status: &u16, detail: &Option<String>) -> String {
    describe_status(*status, detail.as_deref())
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Network error: No response from server")]
    Transport(#[from] reqwest::Error),
    #[error("{}", status_message(.status, .detail))]
    Status { status: u16, detail: Option<String> },
    #[error("Malformed server response: {0}")]
    Malformed(String),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<SchemaError> for GatewayError {
    fn from(value: SchemaError) -> Self {
        Self::Malformed(value.to_string())
    }
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::Transport(_) => ErrorCode::Transport,
            Self::Status { .. } => ErrorCode::Status,
            Self::Malformed(_) | Self::InvalidUrl(_) => ErrorCode::Malformed,
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        let error = ApiError::new(self.code(), self.to_string());
        match self.status() {
            Some(status) => error.with_status(status),
            None => error,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no response document is loaded")]
    NoDocument,
    #[error("response document {0} is not available from the server or the local cache")]
    NotFound(DocumentId),
    #[error("{0} is already in progress")]
    InFlight(Operation),
    #[error("question {index} is out of range (document has {len} questions)")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("Submit for Review is available once progress reaches 100% (currently {0}%)")]
    ReviewNotReady(u8),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkspaceError {
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::Gateway(err) => err.to_api_error(),
            Self::NotFound(_) => ApiError::new(ErrorCode::NotFound, self.to_string()),
            Self::InFlight(_) => ApiError::new(ErrorCode::Busy, self.to_string()),
            _ => ApiError::new(ErrorCode::Validation, self.to_string()),
        }
    }
}

/// Human-readable summary for a non-2xx status, with the server's own detail
/// appended when it sent one.
pub fn describe_status(status: u16, detail: Option<&str>) -> String {
    let summary = match status {
        400 => "Bad request (400): the server rejected the submitted data".to_string(),
        401 => "Unauthorized (401): please sign in again".to_string(),
        413 => "Payload too large (413): the file exceeds the server's upload limit".to_string(),
        415 => {
            "Unsupported media type (415): the server does not accept this file type".to_string()
        }
        422 => {
            "Unprocessable entity (422): the server could not process the submitted data"
                .to_string()
        }
        429 => "Too many requests (429): please wait before trying again".to_string(),
        500 => "Internal server error (500)".to_string(),
        502 => "Bad gateway (502): the server is temporarily unreachable".to_string(),
        503 => "Service unavailable (503): please try again later".to_string(),
        504 => "Gateway timeout (504): the server took too long to respond".to_string(),
        other => format!("Server error ({other})"),
    };

    match detail.map(str::trim).filter(|detail| !detail.is_empty()) {
        Some(detail) => format!("{summary} - {detail}"),
        None => summary,
    }
}

/// Pulls a useful message out of an error body: `detail`, `message` or
/// `error` from a JSON object, otherwise the raw text.
pub fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let detail = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["detail", "message", "error"]
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::String(text)) => Some(text.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })?,
        Ok(Value::String(text)) => text,
        _ => body.to_string(),
    };

    Some(truncate_chars(&detail, MAX_DETAIL_CHARS))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
