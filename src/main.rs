use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petflow::api::{CreatedAnnouncement, HttpReportRepository};
use petflow::config::Config;
use petflow::draft::{step_errors, ReportDraft};
use petflow::photos::{PhotoAttachmentCache, PhotoSource};
use petflow::submission::{cancel_pair, CancelHandle, RetryPolicy, SubmissionError};
use petflow::{logging, FlowSessionStore, ReportSession, SessionError, SubmissionOrchestrator};

#[derive(Parser)]
#[command(name = "petflow")]
#[command(about = "Report missing and found pets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every step of a draft without submitting it
    Validate {
        /// Draft file (TOML)
        draft: PathBuf,
    },

    /// Submit a draft to the announcements backend
    Submit {
        /// Draft file (TOML)
        draft: PathBuf,
    },

    /// Upload the photo of an announcement whose upload failed
    RetryUpload {
        /// Announcement id
        #[arg(long)]
        id: String,

        /// Management password of the announcement
        #[arg(long)]
        password: String,

        /// Photo file
        photo: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let result = match cli.command {
        Commands::Validate { draft } => cmd_validate(&config, &draft),
        Commands::Submit { draft } => cmd_submit(&config, &draft).await,
        Commands::RetryUpload {
            id,
            password,
            photo,
        } => cmd_retry_upload(&config, id, password, photo).await,
        Commands::Config => cmd_config(&config),
    };

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

fn draft_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn orchestrator(config: &Config) -> Result<SubmissionOrchestrator> {
    let repository =
        HttpReportRepository::new(&config.api).context("Failed to create HTTP client")?;
    Ok(SubmissionOrchestrator::with_retry(
        Arc::new(repository),
        RetryPolicy::from_config(&config.submission),
    ))
}

/// Point at the credential when the backend refused it
fn print_auth_hint(err: &SubmissionError) {
    if let Some(api) = err.api_error().filter(|api| api.is_auth_error()) {
        eprintln!(
            "The {} backend refused the credentials of this request.",
            api.provider_name()
        );
        if err.partial_announcement().is_some() {
            eprintln!("Check the announcement id and management password.");
        }
    }
}

/// Cancel on Ctrl-C
fn cancel_on_ctrl_c(handle: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            handle.cancel();
        }
    });
}

fn cmd_validate(config: &Config, draft_path: &Path) -> Result<()> {
    let draft = ReportDraft::load(draft_path)?;
    let mut store = FlowSessionStore::new(
        draft.kind,
        PhotoAttachmentCache::new(config.photo_cache_path()),
    );

    // A broken photo is reported, the remaining steps are still checked
    if let Err(e) = draft.fill(&mut store, &draft_dir(draft_path)) {
        println!("✗ {}", e);
    }
    let errors = step_errors(store.state());
    let kind = store.kind();
    store.clear();

    if errors.is_empty() {
        println!("✓ {} draft is complete", kind.display_name());
        return Ok(());
    }

    println!("{}", kind.display_name());
    println!("{}", "─".repeat(60));
    for (step, result) in &errors {
        println!("{}", step.title());
        for (field, message) in result.iter() {
            println!("  {}: {}", field.label(), message);
        }
    }
    bail!("{} step(s) need attention", errors.len())
}

async fn cmd_submit(config: &Config, draft_path: &Path) -> Result<()> {
    let draft = ReportDraft::load(draft_path)?;
    let mut store = FlowSessionStore::new(
        draft.kind,
        PhotoAttachmentCache::new(config.photo_cache_path()),
    );
    if let Err(e) = draft.apply(&mut store, &draft_dir(draft_path)) {
        store.clear();
        return Err(e).context("Draft is not ready to submit");
    }

    let mut session = ReportSession::new(store, orchestrator(config)?);
    let (handle, signal) = cancel_pair();
    cancel_on_ctrl_c(handle);

    match session.submit(&signal).await {
        Ok(result) => {
            println!("✓ Announcement {} created", result.announcement_id);
            println!("  Management password: {}", result.management_password);
            println!("  Keep it to edit or close the announcement later.");
            session.finish();
            Ok(())
        }
        Err(e) => {
            if let SessionError::Submission(err) = &e {
                print_auth_hint(err);
                if let Some(created) = err.partial_announcement() {
                    eprintln!(
                        "Announcement {} was created without its photo.",
                        created.id
                    );
                    eprintln!(
                        "Retry with: petflow retry-upload --id {} --password {} <photo>",
                        created.id, created.management_password
                    );
                }
            }
            session.cancel();
            Err(e.into())
        }
    }
}

async fn cmd_retry_upload(
    config: &Config,
    id: String,
    password: String,
    photo: PathBuf,
) -> Result<()> {
    let mut cache = PhotoAttachmentCache::new(config.photo_cache_path());
    let photo = cache
        .save(PhotoSource::File(photo))
        .context("Failed to read photo")?;
    let created = CreatedAnnouncement {
        id,
        management_password: password,
    };

    let (handle, signal) = cancel_pair();
    cancel_on_ctrl_c(handle);
    let result = orchestrator(config)?
        .upload_photo(&created, &photo, &signal)
        .await;

    if let Err(e) = cache.clear_all() {
        tracing::warn!(error = %e, "failed to release cached photo");
    }

    if let Err(e) = &result {
        print_auth_hint(e);
    }
    let result = result?;
    println!("✓ Photo attached to announcement {}", result.announcement_id);
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
