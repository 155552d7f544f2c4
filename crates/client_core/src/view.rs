//! Render-ready view models derived from client state. Pure functions; the
//! front end only formats what is here.

use chrono::{DateTime, Utc};
use shared::domain::{ActiveRfiSummary, AuditEventKind, QuestionStatus, Suggestion};

use crate::{
    store::{time_ago, AuditTrailState},
    workspace::{Operation, Workspace},
};

const HEADING_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceView {
    pub title: String,
    pub section: String,
    pub progress: u8,
    pub progress_label: String,
    pub questions: Vec<QuestionRow>,
    pub editor: EditorView,
    pub suggestions: SuggestionPanel,
    pub submit_review_enabled: bool,
    pub notice: Option<String>,
    pub alert: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRow {
    pub number: usize,
    pub text: String,
    pub badge: &'static str,
    pub assignee: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorView {
    pub heading: String,
    pub buffer: String,
    pub unsaved: bool,
    pub can_go_previous: bool,
    pub can_go_next: bool,
    pub busy: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPanel {
    pub heading: &'static str,
    pub results_label: String,
    pub search_query: Option<String>,
    pub items: Vec<SuggestionRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRow {
    pub id: String,
    pub title: String,
    pub category: String,
    pub snippet: String,
    pub can_insert: bool,
    pub comparison: Option<ComparisonView>,
}

/// Full text of one suggestion split into its question and answer halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonView {
    pub question: String,
    pub answer: Option<String>,
}

/// `None` until a document has been opened.
pub fn workspace_view(workspace: &Workspace, now: DateTime<Utc>) -> Option<WorkspaceView> {
    let document = workspace.document()?;
    let selected = workspace.selected_index();

    let questions = document
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| QuestionRow {
            number: index + 1,
            text: question.question.clone(),
            badge: status_badge(question.status),
            assignee: question
                .assigned_to
                .clone()
                .unwrap_or_else(|| "Assign".to_string()),
            selected: index == selected,
        })
        .collect();

    let heading = workspace
        .selected_question()
        .map(|question| {
            let preview: String = question
                .question
                .chars()
                .take(HEADING_PREVIEW_CHARS)
                .collect();
            format!("Response for: {}. {}...", selected + 1, preview)
        })
        .unwrap_or_default();

    let editor = EditorView {
        heading,
        buffer: workspace.edit_buffer().to_string(),
        unsaved: workspace.has_unsaved_edits(),
        can_go_previous: workspace.can_go_previous(),
        can_go_next: workspace.can_go_next(),
        busy: Operation::ALL
            .into_iter()
            .filter(|operation| workspace.is_loading(*operation))
            .collect(),
    };

    Some(WorkspaceView {
        title: document.title.clone(),
        section: document.section.clone(),
        progress: document.progress,
        progress_label: format!("Progress: {}%", document.progress),
        questions,
        editor,
        suggestions: suggestion_panel(workspace),
        submit_review_enabled: document.progress == 100
            && !workspace.is_loading(Operation::SubmitReview),
        notice: workspace.notice(now).map(|notice| notice.message.clone()),
        alert: workspace.alert().map(str::to_string),
        errors: workspace
            .errors()
            .into_iter()
            .map(|(operation, error)| format!("{operation}: {error}"))
            .collect(),
    })
}

fn suggestion_panel(workspace: &Workspace) -> SuggestionPanel {
    let searching = workspace.showing_search_results();
    let visible = workspace.visible_suggestions();
    SuggestionPanel {
        heading: if searching {
            "Search Results"
        } else {
            "Knowledge Base Suggestions"
        },
        results_label: format!("{} Results", visible.len()),
        search_query: searching.then(|| workspace.search_query().to_string()),
        items: visible
            .iter()
            .map(|suggestion| suggestion_row(suggestion, workspace))
            .collect(),
    }
}

fn suggestion_row(suggestion: &Suggestion, workspace: &Workspace) -> SuggestionRow {
    let expanded = workspace.expanded_suggestion() == Some(&suggestion.id);
    SuggestionRow {
        id: suggestion.id.to_string(),
        title: suggestion.title.clone(),
        category: suggestion.category.clone(),
        snippet: suggestion.snippet.clone(),
        can_insert: suggestion.answer_text().is_some(),
        comparison: expanded.then(|| ComparisonView {
            question: suggestion.question_text().to_string(),
            answer: suggestion.answer_text().map(str::to_string),
        }),
    }
}

pub fn status_badge(status: QuestionStatus) -> &'static str {
    match status {
        QuestionStatus::Completed => "✓",
        QuestionStatus::InProgress => "in-progress",
        QuestionStatus::NotStarted => "not-started",
    }
}

/// Display text for a document status as the server spells it. Unknown
/// statuses are shown verbatim.
pub fn status_label(status: &str) -> String {
    let normalized = status.trim().to_ascii_lowercase().replace(['_', ' '], "-");
    let label = match normalized.as_str() {
        "review-ready" | "ready-for-review" | "ready-review" => "Ready for review",
        "not-started" => "Not started",
        "in-progress" => "In progress",
        "in-review" => "In review",
        "completed" => "Completed",
        "draft" => "Draft",
        _ => return status.to_string(),
    };
    label.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRfiRow {
    pub id: String,
    pub title: String,
    pub status: String,
    pub progress_label: String,
    pub due_date: String,
    pub updated: String,
    pub users: String,
}

pub fn active_rfi_rows(items: &[ActiveRfiSummary]) -> Vec<ActiveRfiRow> {
    items
        .iter()
        .map(|item| ActiveRfiRow {
            id: item.id.to_string(),
            title: item.title.clone(),
            status: status_label(&item.status),
            progress_label: format!("{}%", item.progress),
            due_date: item.due_date.clone(),
            updated: item.updated.clone(),
            users: item
                .users
                .iter()
                .map(|user| user.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub icon: &'static str,
    pub actor: String,
    pub action: String,
    pub regarding: Option<String>,
    pub when: String,
}

pub fn audit_rows(state: &AuditTrailState, now: DateTime<Utc>) -> Vec<AuditRow> {
    state
        .events
        .iter()
        .map(|event| AuditRow {
            icon: match event.kind {
                AuditEventKind::Ai => "✦",
                AuditEventKind::Edit => "✎",
                AuditEventKind::Complete => "✓",
                AuditEventKind::Other(_) => "•",
            },
            actor: event.actor.clone(),
            action: event.action.clone(),
            regarding: event
                .question
                .as_ref()
                .map(|question| format!("Regarding: \"{question}\"")),
            when: time_ago(event.timestamp, now),
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
