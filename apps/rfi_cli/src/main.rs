use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    store::{AuditTrailState, RfiListState},
    view::{active_rfi_rows, audit_rows, status_label},
    Attachment, ControllerSettings, DocumentIntake, DocumentUpload, HttpRfiClient, IntakeSource,
    KnowledgeBaseEntry, KnowledgeBaseState, LoadSource, RfiApi, WorkspaceController,
};
use shared::domain::{DocumentId, KnowledgeBaseEntryType, QuestionStatus};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

use config::{normalize_database_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "rfi", about = "Work on RFI/RFP responses from the terminal")]
struct Cli {
    /// Config file; `rfi.toml` in the working directory is read when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    download_url: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    user: Option<String>,
    #[arg(long, global = true)]
    reviewer: Option<String>,
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Active RFIs on the server.
    List,
    /// Open a response document in an interactive session.
    Open { id: String },
    /// Upload an RFI document for processing.
    Upload {
        path: PathBuf,
        /// Overrides the type guessed from the file name.
        #[arg(long)]
        mime: Option<String>,
        /// Open the resulting document right away.
        #[arg(long)]
        open: bool,
        /// Fall back to the bundled demo document if the upload fails.
        #[arg(long)]
        demo_fallback: bool,
    },
    /// Processing status of an uploaded document.
    Status { id: String },
    /// Audit trail of a document.
    Audit { id: String },
    /// Export a document and save the artifact.
    Export { id: String },
    /// Submit a knowledge-base entry for approval.
    KbAdd {
        #[arg(long = "type", default_value = "service")]
        entry_type: KnowledgeBaseEntryType,
        #[arg(long, default_value = "")]
        service_name: String,
        #[arg(long, default_value = "")]
        service_category: String,
        #[arg(long)]
        description: String,
        /// Comma-separated.
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Inspect or clear the local document cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    List,
    Drop { id: String },
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    info!(api_url = %settings.api_url, database_url = %settings.database_url, "starting rfi client");

    let api: Arc<dyn RfiApi> = Arc::new(
        HttpRfiClient::new(&settings.api_url)?
            .with_download_url(settings.download_url())?
            .with_upload_timeout(settings.upload_timeout()),
    );

    match cli.command {
        Command::List => {
            let mut state = RfiListState::default();
            state.pending();
            match api.list_active().await {
                Ok(items) => state.fulfilled(items),
                Err(err) => state.rejected(err.to_api_error()),
            }
            if let Some(error) = &state.error {
                anyhow::bail!("{error}");
            }
            print!("{}", render::active_list(&active_rfi_rows(&state.items)));
        }
        Command::Open { id } => {
            let storage = open_storage(&settings).await?;
            let controller = controller(&settings, api.clone(), storage);
            let source = controller.load(&DocumentId::new(id)).await?;
            if source == LoadSource::Cache {
                println!("server unreachable, showing the cached copy");
            }
            repl::run_session(&controller, api.as_ref(), &settings.download_dir).await?;
        }
        Command::Upload {
            path,
            mime,
            open,
            demo_fallback,
        } => {
            let mut upload = DocumentUpload::from_path(&path)
                .await
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if let Some(mime) = mime {
                upload = upload.with_mime_type(mime);
            }

            let storage = open_storage(&settings).await?;
            let intake = DocumentIntake::new(api.clone(), storage.clone(), &settings.upload_user)
                .with_demo_fallback(demo_fallback || settings.demo_fallback);
            let outcome = intake.submit(&upload).await?;
            if outcome.source == IntakeSource::Fixture {
                println!("upload failed, opened the demo document instead");
            }
            println!("document id: {}", outcome.document_id());

            if open {
                let controller = controller(&settings, api.clone(), storage);
                controller.load(outcome.document_id()).await?;
                repl::run_session(&controller, api.as_ref(), &settings.download_dir).await?;
            }
        }
        Command::Status { id } => {
            let document = api.document_status(&DocumentId::new(id)).await?;
            let completed = document
                .questions
                .iter()
                .filter(|question| question.status == QuestionStatus::Completed)
                .count();
            println!("{} ({})", document.title, document.id);
            println!(
                "progress {}%, {completed}/{} questions completed",
                document.progress,
                document.questions.len()
            );
            if let Some(status) = document.extra.get("status").and_then(|v| v.as_str()) {
                println!("status: {}", status_label(status));
            }
            if let Some(source) = document
                .meta_data
                .as_ref()
                .and_then(|meta| meta.source_filename.as_deref())
            {
                println!("source file: {source}");
            }
        }
        Command::Audit { id } => {
            let mut state = AuditTrailState::default();
            state.pending();
            match api.audit_trail(&DocumentId::new(id)).await {
                Ok(events) => state.fulfilled(events),
                Err(err) => state.rejected(err.to_api_error()),
            }
            if let Some(error) = &state.error {
                anyhow::bail!("{error}");
            }
            print!("{}", render::audit(&audit_rows(&state, Utc::now())));
        }
        Command::Export { id } => {
            let storage = open_storage(&settings).await?;
            let controller = controller(&settings, api.clone(), storage);
            controller.load(&DocumentId::new(id)).await?;
            let result = controller.export(&settings.download_dir).await;
            if let Some(alert) = controller.take_alert().await {
                println!("{alert}");
            }
            let artifact = result?;
            println!("saved {} ({} bytes)", artifact.path.display(), artifact.size);
        }
        Command::KbAdd {
            entry_type,
            service_name,
            service_category,
            description,
            tags,
            attachments,
        } => {
            let mut entry = KnowledgeBaseEntry::new(entry_type, description)
                .with_service(service_name, service_category)
                .with_tags(tags);
            for path in &attachments {
                let attachment = Attachment::from_path(path)
                    .await
                    .with_context(|| format!("failed to read '{}'", path.display()))?;
                entry.add_attachment(attachment);
            }

            let mut state = KnowledgeBaseState::default();
            state.pending();
            match api.submit_knowledge_base_entry(&entry).await {
                Ok(response) => state.fulfilled(&response),
                Err(err) => state.rejected(err.to_api_error()),
            }
            if let Some(error) = &state.error {
                anyhow::bail!("{error}");
            }
            if let Some(message) = &state.success_message {
                println!("{message}");
            }
        }
        Command::Cache { action } => {
            let storage = open_storage(&settings).await?;
            match action {
                CacheAction::List => {
                    let documents = storage.list_documents().await?;
                    if documents.is_empty() {
                        println!("cache is empty");
                    }
                    for summary in documents {
                        println!(
                            "{:<24} {:<40} cached {}",
                            summary.document_id.as_str(),
                            summary.title,
                            summary.cached_at.to_rfc3339()
                        );
                    }
                }
                CacheAction::Drop { id } => {
                    if storage.delete_document(&DocumentId::new(id.clone())).await? {
                        println!("dropped {id}");
                    } else {
                        println!("{id} is not cached");
                    }
                }
                CacheAction::Clear => {
                    let removed = storage.clear().await?;
                    println!("removed {removed} cached documents");
                }
            }
        }
    }

    Ok(())
}

/// Flags override the environment, which overrides the config file.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(v) = &cli.api_url {
        settings.api_url = v.clone();
    }
    if let Some(v) = &cli.download_url {
        settings.download_url = Some(v.clone());
    }
    if let Some(v) = &cli.database_url {
        settings.database_url = normalize_database_url(v);
    }
    if let Some(v) = &cli.user {
        settings.user = v.clone();
    }
    if let Some(v) = &cli.reviewer {
        settings.reviewer = v.clone();
    }
    if let Some(v) = &cli.download_dir {
        settings.download_dir = v.clone();
    }
    Ok(settings)
}

async fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let storage = Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open cache at '{}'", settings.database_url))?;
    Ok(Arc::new(storage))
}

fn controller(
    settings: &Settings,
    api: Arc<dyn RfiApi>,
    storage: Arc<Storage>,
) -> WorkspaceController {
    WorkspaceController::new(
        api,
        storage,
        ControllerSettings {
            user: settings.user.clone(),
            reviewer: settings.reviewer.clone(),
        },
    )
}
