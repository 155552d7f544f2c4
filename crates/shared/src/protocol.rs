use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{ActiveRfiSummary, Suggestion},
    error::SchemaError,
};

/// Status tag attached to a section update; the server records it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionAction {
    Draft,
    Save,
    Completed,
}

impl SectionAction {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Draft => "generateDraft",
            Self::Save => "saveSection",
            Self::Completed => "markComplete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpdateRequest {
    pub response_id: String,
    pub question_id: String,
    pub question: String,
    pub response: String,
    pub status: SectionAction,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionUpdateResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Map<String, Value>,
}

impl SectionUpdateResponse {
    /// The merged `response` text is the one field the workspace cannot do
    /// without; everything else in `data` is optional.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self.data.get("response") {
            Some(Value::String(_)) => Ok(()),
            Some(_) => Err(SchemaError::Invalid(
                "section update `response` is not a string".into(),
            )),
            None => Err(SchemaError::MissingField("data.response")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    pub response_id: String,
    pub status: String,
    pub user: String,
}

impl SubmitReviewRequest {
    pub const STATUS: &'static str = "submitReview";

    pub fn new(response_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            response_id: response_id.into(),
            status: Self::STATUS.to_string(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitReviewResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchKnowledgeBaseRequest {
    pub search_text: String,
}

/// Search results arrive either as a bare list or wrapped in `{data: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchKnowledgeBaseResponse {
    Bare(Vec<Suggestion>),
    Wrapped { data: Vec<Suggestion> },
}

impl SearchKnowledgeBaseResponse {
    pub fn into_results(self) -> Vec<Suggestion> {
        match self {
            Self::Bare(results) | Self::Wrapped { data: results } => results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub filename: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRfiListResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Vec<ActiveRfiSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseSubmitResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: bool,
}

impl KnowledgeBaseSubmitResponse {
    pub const ASSUMED_SUCCESS: &'static str = "Entry submitted successfully";

    /// The endpoint sometimes answers with an empty or non-JSON body on
    /// success; treat those as an accepted submission.
    pub fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::assumed_success();
        }
        serde_json::from_str(body).unwrap_or_else(|_| Self::assumed_success())
    }

    fn assumed_success() -> Self {
        Self {
            message: Some(Self::ASSUMED_SUCCESS.to_string()),
            success: true,
        }
    }
}
