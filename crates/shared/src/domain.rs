use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Separates the question half of a suggestion's full text from its answer half.
pub const ANSWER_DELIMITER: &str = "\n\nAnswer:";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        // The backend emits some ids as integers and others as strings.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum RawId {
                    Int(i64),
                    Text(String),
                }

                Ok(match RawId::deserialize(deserializer)? {
                    RawId::Int(value) => Self(value.to_string()),
                    RawId::Text(value) => Self(value),
                })
            }
        }
    };
}

id_newtype!(DocumentId);
id_newtype!(QuestionId);
id_newtype!(SuggestionId);
id_newtype!(AuditEventId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuestionStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl QuestionStatus {
    /// Section updates echo back whatever status tag was sent ("Draft",
    /// "Save", "Completed"), so anything not clearly finished or untouched
    /// counts as in progress.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "completed" | "complete" => Self::Completed,
            "" | "not-started" | "pending" => Self::NotStarted,
            _ => Self::InProgress,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl Serialize for QuestionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QuestionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(Self::parse_lenient)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: SuggestionId,
    #[serde(default)]
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub full_text: String,
}

impl Suggestion {
    /// Text following the answer delimiter, trimmed. `None` when the
    /// delimiter is missing or nothing follows it.
    pub fn answer_text(&self) -> Option<&str> {
        let answer = self.full_text.split(ANSWER_DELIMITER).nth(1)?.trim();
        (!answer.is_empty()).then_some(answer)
    }

    pub fn question_text(&self) -> &str {
        self.full_text
            .split(ANSWER_DELIMITER)
            .next()
            .unwrap_or_default()
            .trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub response: String,
    #[serde(default)]
    pub status: QuestionStatus,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<Vec<Suggestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<Suggestion>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Question {
    /// Overlays server-returned fields onto this record; keys present in
    /// `fields` replace the existing ones.
    pub fn merged_with(&self, fields: &Map<String, Value>) -> Result<Self, SchemaError> {
        let mut value = serde_json::to_value(self)?;
        let Value::Object(object) = &mut value else {
            return Err(SchemaError::Invalid(
                "question did not serialize to an object".into(),
            ));
        };
        for (key, field) in fields {
            object.insert(key.clone(), field.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        self.knowledge_base.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    pub id: DocumentId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub section: String,
    pub progress: u8,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<DocumentMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseDocument {
    /// Decodes and checks a server payload. A document with no questions or
    /// an out-of-range progress value is rejected rather than rendered.
    pub fn decode(value: Value) -> Result<Self, SchemaError> {
        let document: Self = serde_json::from_value(value)?;
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.id.as_str().trim().is_empty() {
            return Err(SchemaError::MissingField("id"));
        }
        if self.progress > 100 {
            return Err(SchemaError::Invalid(format!(
                "progress {} is outside 0..=100",
                self.progress
            )));
        }
        if self.questions.is_empty() {
            return Err(SchemaError::Invalid(format!(
                "document {} has no questions",
                self.id
            )));
        }
        Ok(())
    }

    /// Identifier the section endpoints key on: the source document id when
    /// the server recorded one, otherwise the response id.
    pub fn source_id(&self) -> &str {
        self.meta_data
            .as_ref()
            .and_then(|meta| meta.source_document_id.as_deref())
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.id.as_str())
    }

    pub fn is_review_ready(&self) -> bool {
        self.progress == 100
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditEventKind {
    Ai,
    Edit,
    Complete,
    Other(String),
}

impl AuditEventKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AI" => Self::Ai,
            "EDIT" => Self::Edit,
            "COMPLETE" => Self::Complete,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ai => "AI",
            Self::Edit => "EDIT",
            Self::Complete => "COMPLETE",
            Self::Other(raw) => raw,
        }
    }
}

impl Serialize for AuditEventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditEventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(rename = "type")]
    pub kind: AuditEventKind,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRfiSummary {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub users: Vec<Collaborator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeBaseEntryType {
    OrganizationalFact,
    HrDetail,
    Financial,
    #[default]
    Service,
    Sop,
    Policy,
    PastResponse,
}

impl KnowledgeBaseEntryType {
    pub const ALL: [Self; 7] = [
        Self::OrganizationalFact,
        Self::HrDetail,
        Self::Financial,
        Self::Service,
        Self::Sop,
        Self::Policy,
        Self::PastResponse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrganizationalFact => "organizational_fact",
            Self::HrDetail => "hr_detail",
            Self::Financial => "financial",
            Self::Service => "service",
            Self::Sop => "sop",
            Self::Policy => "policy",
            Self::PastResponse => "past_response",
        }
    }
}

impl fmt::Display for KnowledgeBaseEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeBaseEntryType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown knowledge base entry type: {raw}"))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("unrecognised timestamp: {raw}")))
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
