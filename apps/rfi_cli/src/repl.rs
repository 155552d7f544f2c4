//! Interactive workspace session over stdin.

use std::path::Path;

use anyhow::{bail, Result};
use chrono::Utc;
use client_core::{
    store::AuditTrailState,
    view::{audit_rows, workspace_view},
    ApplyOutcome, RfiApi, WorkspaceController,
};
use shared::domain::SuggestionId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Show,
    Help,
    Quit,
    /// Zero-based question index.
    Select(usize),
    Next,
    Previous,
    Edit(String),
    Append(String),
    Draft,
    Save,
    Complete,
    Search(String),
    ClearSearch,
    Insert(SuggestionId),
    Compare(SuggestionId),
    Review,
    Export,
    Audit,
}

pub const HELP: &str = "\
commands:
  show                 redraw the workspace
  select <n>           open question n
  next | prev          move between questions
  edit <text>          replace the response text (\\n for newlines)
  append <text>        append to the response text
  draft                generate an AI draft
  save                 save the response
  complete             save and mark the question completed
  search <text>        search the knowledge base
  clear                back to the question's suggestions
  insert <id>          append a suggestion's answer to the response
  compare <id>         toggle the full text of a suggestion
  review               submit the document for review
  export               export and download the document
  audit                show the audit trail
  quit";

/// Blank input redraws.
pub fn parse_command(line: &str) -> Result<ReplCommand> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" | "show" => ReplCommand::Show,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        "select" | "open" => {
            let number: usize = match rest.parse() {
                Ok(number) => number,
                Err(_) => bail!("select needs a question number"),
            };
            if number == 0 {
                bail!("questions are numbered from 1");
            }
            ReplCommand::Select(number - 1)
        }
        "next" | "n" => ReplCommand::Next,
        "prev" | "previous" | "p" => ReplCommand::Previous,
        "edit" => ReplCommand::Edit(unescape(rest)),
        "append" => {
            if rest.is_empty() {
                bail!("append needs some text");
            }
            ReplCommand::Append(unescape(rest))
        }
        "draft" | "generate" => ReplCommand::Draft,
        "save" => ReplCommand::Save,
        "complete" | "done" => ReplCommand::Complete,
        "search" => ReplCommand::Search(rest.to_string()),
        "clear" => ReplCommand::ClearSearch,
        "insert" => ReplCommand::Insert(suggestion_id("insert", rest)?),
        "compare" => ReplCommand::Compare(suggestion_id("compare", rest)?),
        "review" | "submit" => ReplCommand::Review,
        "export" => ReplCommand::Export,
        "audit" | "history" => ReplCommand::Audit,
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(command)
}

fn suggestion_id(command: &str, rest: &str) -> Result<SuggestionId> {
    if rest.is_empty() {
        bail!("{command} needs a suggestion id");
    }
    Ok(SuggestionId::new(rest))
}

fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
}

pub async fn run_session(
    controller: &WorkspaceController,
    api: &dyn RfiApi,
    download_dir: &Path,
) -> Result<()> {
    redraw(controller).await;
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == ReplCommand::Quit {
            break;
        }
        if let Err(err) = execute(controller, api, download_dir, command).await {
            println!("error: {err}");
        }
    }
    Ok(())
}

async fn execute(
    controller: &WorkspaceController,
    api: &dyn RfiApi,
    download_dir: &Path,
    command: ReplCommand,
) -> Result<()> {
    match command {
        ReplCommand::Show | ReplCommand::Quit => {}
        ReplCommand::Help => {
            println!("{HELP}");
            return Ok(());
        }
        ReplCommand::Select(index) => controller.select_question(index).await?,
        ReplCommand::Next => {
            if !controller.next_question().await? {
                println!("already at the last question");
            }
        }
        ReplCommand::Previous => {
            if !controller.previous_question().await? {
                println!("already at the first question");
            }
        }
        ReplCommand::Edit(text) => controller.set_edit_buffer(text).await,
        ReplCommand::Append(text) => {
            let current = controller.snapshot().await.edit_buffer().to_string();
            controller.set_edit_buffer(format!("{current}{text}")).await;
        }
        ReplCommand::Draft => report(controller.generate_draft().await?),
        ReplCommand::Save => report(controller.save_section().await?),
        ReplCommand::Complete => report(controller.mark_complete().await?),
        ReplCommand::Search(text) => match controller.search(&text).await? {
            Some(outcome) => report(outcome),
            None => println!("enter some search text"),
        },
        ReplCommand::ClearSearch => controller.clear_search().await,
        ReplCommand::Insert(id) => {
            if !controller.insert_suggestion(&id).await {
                println!("suggestion {id} has no answer to insert");
            }
        }
        ReplCommand::Compare(id) => controller.toggle_comparison(&id).await,
        ReplCommand::Review => report(controller.submit_review().await?),
        ReplCommand::Export => {
            // The alert carries the outcome either way.
            match controller.export(download_dir).await {
                Ok(artifact) => println!(
                    "saved {} ({} bytes)",
                    artifact.path.display(),
                    artifact.size
                ),
                Err(err) => warn!(error = %err, "export failed"),
            }
        }
        ReplCommand::Audit => {
            let snapshot = controller.snapshot().await;
            let Some(document) = snapshot.document() else {
                bail!("no document is open");
            };
            let mut trail = AuditTrailState::default();
            trail.pending();
            match api.audit_trail(&document.id).await {
                Ok(events) => trail.fulfilled(events),
                Err(err) => trail.rejected(err.to_api_error()),
            }
            if let Some(error) = &trail.error {
                println!("error: {error}");
            }
            print!("{}", render::audit(&audit_rows(&trail, Utc::now())));
            return Ok(());
        }
    }
    redraw(controller).await;
    Ok(())
}

fn report(outcome: ApplyOutcome) {
    if outcome == ApplyOutcome::Stale {
        println!("(result arrived after the selection changed and was discarded)");
    }
}

async fn redraw(controller: &WorkspaceController) {
    let alert = controller.take_alert().await;
    let mut snapshot = controller.snapshot().await;
    let now = Utc::now();
    snapshot.dismiss_expired_notice(now);
    match workspace_view(&snapshot, now) {
        Some(view) => print!("{}", render::workspace(&view)),
        None => println!("no document is open"),
    }
    if let Some(alert) = alert {
        println!(">> {alert}");
    }
}

#[cfg(test)]
#[path = "tests/repl_tests.rs"]
mod tests;
