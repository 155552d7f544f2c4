//! In-memory state of the response workspace.
//!
//! [`Workspace`] holds the open document, the selected question and its edit
//! buffer, plus per-operation transient flags. Every method is a synchronous
//! state transition; the async side lives in [`crate::controller`].
//!
//! Async operations follow a begin/complete pair. `begin_*` validates the
//! request, marks the operation as loading and hands back a
//! [`RequestTicket`]. `complete_*` applies the result only if the ticket still
//! matches the current selection; otherwise the result is dropped.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use shared::{
    domain::{DocumentId, Question, QuestionId, ResponseDocument, Suggestion, SuggestionId},
    error::ApiError,
    protocol::{
        SectionAction, SectionUpdateRequest, SectionUpdateResponse, SubmitReviewRequest,
        SubmitReviewResponse,
    },
};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, WorkspaceError};

pub const NOTICE_TTL_SECS: i64 = 5;
pub const DEFAULT_REVIEW_NOTICE: &str = "Submitted successfully!";
pub const REVIEW_FAILED_NOTICE: &str = "Failed to submit review.";
pub const EXPORT_SUCCEEDED_ALERT: &str = "RFI exported successfully!";
pub const EXPORT_FAILED_ALERT: &str = "Failed to export RFI. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    GenerateDraft,
    SaveSection,
    MarkComplete,
    SubmitReview,
    Search,
    Export,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::Load,
        Self::GenerateDraft,
        Self::SaveSection,
        Self::MarkComplete,
        Self::SubmitReview,
        Self::Search,
        Self::Export,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Load => "Load",
            Self::GenerateDraft => "Generate draft",
            Self::SaveSection => "Save",
            Self::MarkComplete => "Mark complete",
            Self::SubmitReview => "Submit for review",
            Self::Search => "Search",
            Self::Export => "Export",
        }
    }

    /// Question-scoped results are only valid for the selection they were
    /// issued against.
    pub fn is_question_scoped(self) -> bool {
        matches!(
            self,
            Self::GenerateDraft | Self::SaveSection | Self::MarkComplete | Self::Search
        )
    }
}

impl From<SectionAction> for Operation {
    fn from(action: SectionAction) -> Self {
        match action {
            SectionAction::Draft => Self::GenerateDraft,
            SectionAction::Save => Self::SaveSection,
            SectionAction::Completed => Self::MarkComplete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStatus {
    pub loading: bool,
    pub error: Option<ApiError>,
}

/// Identifies the document and selection an async request was issued
/// against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub operation: Operation,
    pub document_id: DocumentId,
    pub generation: u64,
    pub question_index: usize,
    pub question_id: QuestionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
}

/// Transient message shown for [`NOTICE_TTL_SECS`] after it was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        now - self.raised_at < Duration::seconds(NOTICE_TTL_SECS)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    document: Option<ResponseDocument>,
    selected: usize,
    buffer: String,
    saved_response: String,
    generation: u64,
    search_query: String,
    expanded_suggestion: Option<SuggestionId>,
    operations: HashMap<Operation, OperationStatus>,
    notice: Option<Notice>,
    alert: Option<String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&ResponseDocument> {
        self.document.as_ref()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_question(&self) -> Option<&Question> {
        self.document
            .as_ref()
            .and_then(|document| document.questions.get(self.selected))
    }

    pub fn edit_buffer(&self) -> &str {
        &self.buffer
    }

    pub fn last_saved(&self) -> &str {
        &self.saved_response
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.buffer != self.saved_response
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn expanded_suggestion(&self) -> Option<&SuggestionId> {
        self.expanded_suggestion.as_ref()
    }

    pub fn operation(&self, operation: Operation) -> OperationStatus {
        self.operations
            .get(&operation)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_loading(&self, operation: Operation) -> bool {
        self.operations
            .get(&operation)
            .is_some_and(|status| status.loading)
    }

    pub fn errors(&self) -> Vec<(Operation, ApiError)> {
        Operation::ALL
            .into_iter()
            .filter_map(|operation| {
                self.operations
                    .get(&operation)
                    .and_then(|status| status.error.clone())
                    .map(|error| (operation, error))
            })
            .collect()
    }

    pub fn notice(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.notice.as_ref().filter(|notice| notice.is_visible(now))
    }

    pub fn dismiss_expired_notice(&mut self, now: DateTime<Utc>) {
        if self.notice.as_ref().is_some_and(|notice| !notice.is_visible(now)) {
            self.notice = None;
        }
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Blocking alerts are shown once.
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn set_edit_buffer(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn begin_load(&mut self) -> Result<(), WorkspaceError> {
        self.start(Operation::Load)
    }

    /// Installs a freshly loaded document and selects its first question.
    pub fn open(&mut self, document: ResponseDocument) {
        info!(
            document_id = %document.id,
            questions = document.questions.len(),
            "opening response document"
        );
        let first = document
            .questions
            .first()
            .map(|question| question.response.clone())
            .unwrap_or_default();
        self.document = Some(document);
        self.selected = 0;
        self.buffer = first.clone();
        self.saved_response = first;
        self.search_query.clear();
        self.expanded_suggestion = None;
        self.generation += 1;
        self.finish(Operation::Load, None);
    }

    pub fn fail_load(&mut self, error: &WorkspaceError) {
        self.finish(Operation::Load, Some(error.to_api_error()));
    }

    /// The single guarded transition between questions. Unsaved edits to the
    /// current question are discarded and its record restored to the last
    /// saved text before the new question is seeded.
    pub fn select_question(&mut self, index: usize) -> Result<(), WorkspaceError> {
        let document = self.document.as_mut().ok_or(WorkspaceError::NoDocument)?;
        let len = document.questions.len();
        if index >= len {
            return Err(WorkspaceError::QuestionOutOfRange { index, len });
        }

        if let Some(current) = document.questions.get_mut(self.selected) {
            if self.buffer != self.saved_response {
                debug!(question_id = %current.id, "discarding unsaved edits");
            }
            current.response = self.saved_response.clone();
            current.search_results = None;
        }

        let next = &document.questions[index];
        self.selected = index;
        self.buffer = next.response.clone();
        self.saved_response = next.response.clone();
        self.search_query.clear();
        self.expanded_suggestion = None;
        self.generation += 1;
        Ok(())
    }

    /// Returns false when already on the last question.
    pub fn next_question(&mut self) -> Result<bool, WorkspaceError> {
        let len = self.question_count()?;
        if self.selected + 1 >= len {
            return Ok(false);
        }
        self.select_question(self.selected + 1)?;
        Ok(true)
    }

    /// Returns false when already on the first question.
    pub fn previous_question(&mut self) -> Result<bool, WorkspaceError> {
        self.question_count()?;
        if self.selected == 0 {
            return Ok(false);
        }
        self.select_question(self.selected - 1)?;
        Ok(true)
    }

    pub fn can_go_next(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|document| self.selected + 1 < document.questions.len())
    }

    pub fn can_go_previous(&self) -> bool {
        self.document.is_some() && self.selected > 0
    }

    pub fn begin_section_update(
        &mut self,
        action: SectionAction,
        user: &str,
    ) -> Result<(RequestTicket, SectionUpdateRequest), WorkspaceError> {
        let operation = Operation::from(action);
        let ticket = self.ticket(operation)?;
        let (response_id, question) = {
            let document = self.document.as_ref().ok_or(WorkspaceError::NoDocument)?;
            let question = &document.questions[ticket.question_index];
            (document.source_id().to_string(), question.question.clone())
        };
        self.start(operation)?;

        let request = SectionUpdateRequest {
            response_id,
            question_id: ticket.question_id.to_string(),
            question,
            response: self.buffer.clone(),
            status: action,
            user: user.to_string(),
        };
        Ok((ticket, request))
    }

    /// Merges the server's fields into the question the request was issued
    /// for. On failure nothing but the operation's error flag changes.
    pub fn complete_section_update(
        &mut self,
        ticket: &RequestTicket,
        result: Result<SectionUpdateResponse, GatewayError>,
    ) -> Result<ApplyOutcome, WorkspaceError> {
        let operation = ticket.operation;
        if !self.is_current(ticket) {
            self.discard_stale(ticket);
            return Ok(ApplyOutcome::Stale);
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(question_id = %ticket.question_id, error = %err, "{operation} failed");
                self.finish(operation, Some(err.to_api_error()));
                return Err(err.into());
            }
        };

        let merged = response
            .validate()
            .map_err(GatewayError::from)
            .and_then(|()| self.merge_into_selected(&response.data));
        let merged = match merged {
            Ok(merged) => merged,
            Err(err) => {
                self.finish(operation, Some(err.to_api_error()));
                return Err(err.into());
            }
        };

        // The server has stored whatever it returned, drafts included.
        self.buffer = merged.clone();
        self.saved_response = merged;
        self.finish(operation, None);
        info!(question_id = %ticket.question_id, "{operation} applied");
        Ok(ApplyOutcome::Applied)
    }

    /// Returns `Ok(None)` for blank input; nothing is sent in that case.
    pub fn begin_search(
        &mut self,
        text: &str,
    ) -> Result<Option<(RequestTicket, String)>, WorkspaceError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let ticket = self.ticket(Operation::Search)?;
        self.start(Operation::Search)?;
        self.search_query = text.to_string();
        Ok(Some((ticket, text.to_string())))
    }

    pub fn complete_search(
        &mut self,
        ticket: &RequestTicket,
        result: Result<Vec<Suggestion>, GatewayError>,
    ) -> Result<ApplyOutcome, WorkspaceError> {
        if !self.is_current(ticket) {
            self.discard_stale(ticket);
            return Ok(ApplyOutcome::Stale);
        }

        match result {
            Ok(results) => {
                debug!(results = results.len(), "knowledge base search applied");
                if let Some(question) = self.selected_question_mut() {
                    question.search_results = Some(results);
                }
                self.expanded_suggestion = None;
                self.finish(Operation::Search, None);
                Ok(ApplyOutcome::Applied)
            }
            Err(err) => {
                warn!(error = %err, "knowledge base search failed");
                self.finish(Operation::Search, Some(err.to_api_error()));
                Err(err.into())
            }
        }
    }

    /// Removes the field entirely so the default suggestions show again.
    pub fn clear_search(&mut self) {
        if let Some(question) = self.selected_question_mut() {
            question.search_results = None;
        }
        self.search_query.clear();
        self.expanded_suggestion = None;
        self.clear_error(Operation::Search);
    }

    /// Suggestions currently on display: search results when present,
    /// otherwise the question's precomputed knowledge base matches.
    pub fn visible_suggestions(&self) -> &[Suggestion] {
        match self.selected_question() {
            Some(question) => match &question.search_results {
                Some(results) => results,
                None => question.suggestions(),
            },
            None => &[],
        }
    }

    pub fn showing_search_results(&self) -> bool {
        self.selected_question()
            .is_some_and(|question| question.search_results.is_some())
    }

    /// Appends the answer part of `suggestion` after a blank line. Returns
    /// false when the suggestion has no answer part.
    pub fn insert_suggestion(&mut self, suggestion: &Suggestion) -> bool {
        match suggestion.answer_text() {
            Some(answer) => {
                self.buffer = format!("{}\n\n{}", self.buffer, answer);
                true
            }
            None => false,
        }
    }

    /// Opens the full-text comparison for `id`, or closes it if it is
    /// already open.
    pub fn toggle_comparison(&mut self, id: &SuggestionId) {
        if self.expanded_suggestion.as_ref() == Some(id) {
            self.expanded_suggestion = None;
        } else {
            self.expanded_suggestion = Some(id.clone());
        }
    }

    pub fn close_comparison(&mut self) {
        self.expanded_suggestion = None;
    }

    pub fn begin_submit_review(
        &mut self,
        user: &str,
    ) -> Result<(RequestTicket, SubmitReviewRequest), WorkspaceError> {
        let ticket = self.ticket(Operation::SubmitReview)?;
        let (progress, response_id) = {
            let document = self.document.as_ref().ok_or(WorkspaceError::NoDocument)?;
            (document.progress, document.source_id().to_string())
        };
        if progress < 100 {
            return Err(WorkspaceError::ReviewNotReady(progress));
        }
        self.start(Operation::SubmitReview)?;
        Ok((ticket, SubmitReviewRequest::new(response_id, user)))
    }

    pub fn complete_submit_review(
        &mut self,
        ticket: &RequestTicket,
        result: Result<SubmitReviewResponse, GatewayError>,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, WorkspaceError> {
        if !self.is_current(ticket) {
            self.discard_stale(ticket);
            return Ok(ApplyOutcome::Stale);
        }

        match result {
            Ok(response) => {
                let message = response
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REVIEW_NOTICE.to_string());
                self.raise_notice(message, now);
                self.finish(Operation::SubmitReview, None);
                Ok(ApplyOutcome::Applied)
            }
            Err(err) => {
                warn!(error = %err, "review submission failed");
                self.raise_notice(REVIEW_FAILED_NOTICE, now);
                self.finish(Operation::SubmitReview, Some(err.to_api_error()));
                Err(err.into())
            }
        }
    }

    pub fn begin_export(&mut self) -> Result<(RequestTicket, DocumentId), WorkspaceError> {
        let ticket = self.ticket(Operation::Export)?;
        let export_id = self
            .document
            .as_ref()
            .map(|document| document.id.clone())
            .ok_or(WorkspaceError::NoDocument)?;
        self.start(Operation::Export)?;
        Ok((ticket, export_id))
    }

    /// Export outcomes are reported through the blocking alert.
    pub fn complete_export<T>(
        &mut self,
        ticket: &RequestTicket,
        result: Result<T, WorkspaceError>,
    ) -> Result<T, WorkspaceError> {
        match result {
            Ok(value) => {
                if self.is_current(ticket) {
                    self.alert = Some(EXPORT_SUCCEEDED_ALERT.to_string());
                    self.finish(Operation::Export, None);
                }
                Ok(value)
            }
            Err(err) => {
                if self.is_current(ticket) {
                    self.alert = Some(EXPORT_FAILED_ALERT.to_string());
                    self.finish(Operation::Export, Some(err.to_api_error()));
                }
                Err(err)
            }
        }
    }

    /// Whether a result for `ticket` may still be applied.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        let same_document = self
            .document
            .as_ref()
            .is_some_and(|document| document.id == ticket.document_id);
        if !same_document {
            return false;
        }
        !ticket.operation.is_question_scoped() || ticket.generation == self.generation
    }

    fn ticket(&self, operation: Operation) -> Result<RequestTicket, WorkspaceError> {
        let document = self.document.as_ref().ok_or(WorkspaceError::NoDocument)?;
        let question = document
            .questions
            .get(self.selected)
            .ok_or(WorkspaceError::QuestionOutOfRange {
                index: self.selected,
                len: document.questions.len(),
            })?;
        Ok(RequestTicket {
            operation,
            document_id: document.id.clone(),
            generation: self.generation,
            question_index: self.selected,
            question_id: question.id.clone(),
        })
    }

    fn start(&mut self, operation: Operation) -> Result<(), WorkspaceError> {
        let status = self.operations.entry(operation).or_default();
        if status.loading {
            return Err(WorkspaceError::InFlight(operation));
        }
        status.loading = true;
        status.error = None;
        Ok(())
    }

    fn finish(&mut self, operation: Operation, error: Option<ApiError>) {
        let status = self.operations.entry(operation).or_default();
        status.loading = false;
        status.error = error;
    }

    fn clear_error(&mut self, operation: Operation) {
        if let Some(status) = self.operations.get_mut(&operation) {
            status.error = None;
        }
    }

    fn discard_stale(&mut self, ticket: &RequestTicket) {
        warn!(
            operation = %ticket.operation,
            question_id = %ticket.question_id,
            issued_generation = ticket.generation,
            current_generation = self.generation,
            "discarding stale response"
        );
        let status = self.operations.entry(ticket.operation).or_default();
        status.loading = false;
    }

    fn raise_notice(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.notice = Some(Notice {
            message: message.into(),
            raised_at: now,
        });
    }

    fn question_count(&self) -> Result<usize, WorkspaceError> {
        self.document
            .as_ref()
            .map(|document| document.questions.len())
            .ok_or(WorkspaceError::NoDocument)
    }

    fn selected_question_mut(&mut self) -> Option<&mut Question> {
        let selected = self.selected;
        self.document
            .as_mut()
            .and_then(|document| document.questions.get_mut(selected))
    }

    fn merge_into_selected(&mut self, fields: &Map<String, Value>) -> Result<String, GatewayError> {
        let question = self.selected_question_mut().ok_or_else(|| {
            GatewayError::Malformed("no question selected for merge".into())
        })?;
        let merged = question.merged_with(fields)?;
        let response = merged.response.clone();
        *question = merged;
        Ok(response)
    }
}

#[cfg(test)]
#[path = "tests/workspace_tests.rs"]
mod tests;
