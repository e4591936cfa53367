//! Stratus CLI: upload local files to the CDN dashboard.
//!
//! Reads STRATUS_API_URL, STRATUS_CDN_URL, STRATUS_CDN_TOKEN, STRATUS_SESSION_COOKIE
//! and the STRATUS_* upload policy variables; flags override the policy.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use stratus_api_client::StratusClient;
use stratus_cli::{init_tracing, load_files, resolve_folder, truncate_string, UploadOverrides};
use stratus_core::models::{CompletedUpload, TaskStatus, UploadResult, UploadTask};
use stratus_core::{ClientConfig, UploadConfig, UploadObserver};
use stratus_uploader::UploadOrchestrator;
use uuid::Uuid;

const NAME_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "stratus", about = "Stratus CDN upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files
    Upload {
        /// Paths of the files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Destination folder id or dashboard folder URL (default: root folder)
        #[arg(long)]
        folder: Option<String>,
        /// Maximum number of files uploaded at once
        #[arg(long)]
        max_concurrent: Option<usize>,
        /// Maximum file size in megabytes
        #[arg(long)]
        max_size_mb: Option<u64>,
        /// Accepted type: MIME type, `.ext` or `type/*` (repeatable)
        #[arg(long = "allow")]
        allow: Vec<String>,
        /// Per-file deadline in seconds, 0 disables it
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Do not print the live status summary
        #[arg(long)]
        quiet: bool,
    },
    /// Print the id of the root folder
    RootFolder,
}

/// Logs lifecycle events; the live summary is printed from snapshots.
struct ConsoleObserver;

impl UploadObserver for ConsoleObserver {
    fn on_upload_start(&self, tasks: &[UploadTask]) {
        tracing::info!(files = tasks.len(), "Starting upload");
    }

    fn on_upload_complete(&self, task_id: Uuid, result: &UploadResult) {
        tracing::debug!(task_id = %task_id, cdn_url = %result.cdn_url, "Uploaded");
    }

    fn on_upload_error(&self, task_id: Uuid, error: &str) {
        tracing::debug!(task_id = %task_id, error, "Upload error");
    }

    fn on_all_uploads_complete(&self, completed: &[CompletedUpload]) {
        tracing::info!(completed = completed.len(), "All uploads finished");
    }
}

#[derive(Serialize)]
struct FileOutcome<'a> {
    file: &'a str,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a UploadResult>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn upload(
    client: StratusClient,
    config: UploadConfig,
    paths: Vec<PathBuf>,
    folder_id: Option<String>,
    quiet: bool,
) -> anyhow::Result<()> {
    let (files, skipped) = load_files(&paths, config.max_file_size_bytes).await;
    for skip in &skipped {
        eprintln!("✗ {}", skip);
    }

    let uploader = UploadOrchestrator::new(config, Arc::new(client), Arc::new(ConsoleObserver))?;
    let mut snapshots = uploader.subscribe();
    let report = uploader.submit(files, folder_id);

    for rejection in &report.rejected {
        eprintln!("✗ {}", rejection);
    }

    if !quiet {
        let mut last = String::new();
        loop {
            let (rendered, idle) = {
                let snapshot = snapshots.borrow_and_update();
                (snapshot.notification().to_string(), snapshot.is_idle())
            };
            if rendered != last {
                eprintln!("{}", rendered);
                last = rendered;
            }
            if idle || snapshots.changed().await.is_err() {
                break;
            }
        }
    }
    let tasks = uploader.wait_idle().await;

    let outcomes: Vec<FileOutcome> = tasks
        .iter()
        .map(|t| FileOutcome {
            file: &t.file.name,
            status: t.status,
            error: t.error.as_deref(),
            result: t.result.as_ref(),
        })
        .collect();
    print_json(&outcomes)?;

    for task in &tasks {
        if let Some(result) = &task.result {
            eprintln!(
                "✓ {:<width$} {}",
                truncate_string(&task.file.name, NAME_WIDTH),
                result.cdn_url,
                width = NAME_WIDTH
            );
        }
    }

    let failed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Error)
        .count()
        + report.rejected.len()
        + skipped.len();
    if failed > 0 {
        anyhow::bail!(
            "{} of {} files failed to upload",
            failed,
            paths.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let client_config = ClientConfig::from_env().context(
        "Invalid client configuration. Check STRATUS_API_URL, STRATUS_CDN_URL and STRATUS_CDN_TOKEN",
    )?;
    let client = StratusClient::new(&client_config)?;

    match cli.command {
        Commands::Upload {
            files,
            folder,
            max_concurrent,
            max_size_mb,
            allow,
            timeout_secs,
            quiet,
        } => {
            let overrides = UploadOverrides {
                max_concurrent,
                max_size_mb,
                allow,
                timeout_secs,
            };
            let config = overrides.apply(UploadConfig::from_env()?);
            upload(client, config, files, resolve_folder(folder.as_deref()), quiet).await?;
        }
        Commands::RootFolder => {
            let id = client.fetch_root_folder_id().await?;
            print_json(&serde_json::json!({ "root_folder_id": id }))?;
        }
    }

    Ok(())
}
