//! Plain-text rendering of the client view models.

use std::fmt::Write;

use client_core::view::{ActiveRfiRow, AuditRow, WorkspaceView};

const RULE: &str = "------------------------------------------------------------";

pub fn workspace(view: &WorkspaceView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{} | {} | {}", view.title, view.section, view.progress_label);
    let _ = writeln!(out, "{RULE}");

    for row in &view.questions {
        let marker = if row.selected { ">" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:>2}. [{}] {} ({})",
            row.number, row.badge, row.text, row.assignee
        );
    }

    let editor = &view.editor;
    let _ = writeln!(out, "\n{}", editor.heading);
    if editor.buffer.is_empty() {
        let _ = writeln!(out, "  (empty)");
    } else {
        for line in editor.buffer.lines() {
            let _ = writeln!(out, "  | {line}");
        }
    }
    if editor.unsaved {
        let _ = writeln!(out, "  * unsaved changes");
    }
    if !editor.busy.is_empty() {
        let busy: Vec<&str> = editor.busy.iter().map(|op| op.label()).collect();
        let _ = writeln!(out, "  working: {}", busy.join(", "));
    }

    let panel = &view.suggestions;
    let _ = writeln!(out, "\n{} ({})", panel.heading, panel.results_label);
    if let Some(query) = &panel.search_query {
        let _ = writeln!(out, "  query: {query}");
    }
    for item in &panel.items {
        let insert = if item.can_insert { "" } else { " (no answer)" };
        let _ = writeln!(
            out,
            "  [{}] {} - {}{insert}",
            item.id, item.title, item.category
        );
        if !item.snippet.is_empty() {
            let _ = writeln!(out, "      {}", item.snippet);
        }
        if let Some(comparison) = &item.comparison {
            let _ = writeln!(out, "      {}", comparison.question);
            match &comparison.answer {
                Some(answer) => {
                    let _ = writeln!(out, "      Answer: {answer}");
                }
                None => {
                    let _ = writeln!(out, "      (no answer section)");
                }
            }
        }
    }

    let review = if view.submit_review_enabled {
        "ready"
    } else {
        "requires 100% progress"
    };
    let _ = writeln!(out, "\nSubmit for review: {review}");

    for error in &view.errors {
        let _ = writeln!(out, "! {error}");
    }
    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "* {notice}");
    }
    if let Some(alert) = &view.alert {
        let _ = writeln!(out, ">> {alert}");
    }
    out
}

pub fn active_list(rows: &[ActiveRfiRow]) -> String {
    if rows.is_empty() {
        return "no active RFIs\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12} {:<40} {:<18} {:>4}  due {:<12} updated {}",
            row.id, row.title, row.status, row.progress_label, row.due_date, row.updated
        );
        if !row.users.is_empty() {
            let _ = writeln!(out, "{:<12} team: {}", "", row.users);
        }
    }
    out
}

pub fn audit(rows: &[AuditRow]) -> String {
    if rows.is_empty() {
        return "no audit events\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(out, "{} {} {} ({})", row.icon, row.actor, row.action, row.when);
        if let Some(regarding) = &row.regarding {
            let _ = writeln!(out, "    {regarding}");
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
