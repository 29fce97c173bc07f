//! Command handlers for DSpace Uploader CLI
//!
//! This module implements the command handlers that connect CLI arguments,
//! the layered configuration and the core application functionality.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::app::items::{
    discover_item_folders, discover_loose_files, file_fingerprint, summarize_folders,
    IngestLedger,
};
use crate::app::metadata::ensure_sidecar;
use crate::app::models::UploadTask;
use crate::app::worker::{
    format_summary, BatchReport, DispatchContext, WorkerConfig, WorkerPool,
};
use crate::app::DspaceSession;
use crate::auth::{
    clear_credentials, setup_credentials, show_auth_status, verify_credentials, Credentials,
};
use crate::cli::args::{AuthAction, AuthArgs, BatchArgs, IngestArgs, ScanArgs, UploadArgs};
use crate::cli::progress::{BatchProgress, ProgressConfig};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Apply batch flags on top of file and environment configuration
fn apply_batch_overrides(config: &mut AppConfig, batch: &BatchArgs) {
    if let Some(uuid) = &batch.collection {
        config.dspace.collection_uuid = Some(uuid.trim().to_string());
    }
    if let Some(dir) = &batch.error_dir {
        config.dspace.error_dir = Some(dir.clone());
    }
    if let Some(dir) = &batch.archive_dir {
        config.dspace.archive_dir = Some(dir.clone());
    }
}

fn apply_worker_overrides(mut worker: WorkerConfig, batch: &BatchArgs) -> WorkerConfig {
    if let Some(count) = batch.workers {
        worker.worker_count = count;
    }
    if let Some(attempts) = batch.attempts {
        worker.max_attempts = attempts;
    }
    worker
}

/// Run a batch through the worker pool with progress output
async fn dispatch(
    config: &AppConfig,
    worker_config: WorkerConfig,
    tasks: Vec<UploadTask>,
    label: &str,
    quiet: bool,
) -> Result<BatchReport> {
    worker_config.validate()?;
    let collection = config.require_collection()?;
    let credentials = Credentials::from_env()?;

    let context = DispatchContext::new(config.client_config(), credentials, collection)
        .with_holding(config.holding_areas())
        .shared();

    let progress = BatchProgress::new(
        ProgressConfig {
            quiet,
            ..Default::default()
        },
        tasks.len(),
        label,
    );

    info!(
        "Submitting {} item(s) to collection {} with {} worker(s)",
        tasks.len(),
        collection,
        worker_config.worker_count
    );
    let mut pool = WorkerPool::new(worker_config, context);
    let report = pool
        .run(tasks, |event, stats| progress.handle(event, stats))
        .await?;
    progress.finish(&report);

    Ok(report)
}

fn print_report(report: &BatchReport) {
    println!();
    println!("Summary: {}", format_summary(report));
    if !report.failures.is_empty() {
        println!("Failed items:");
        for failure in &report.failures {
            let status = failure
                .status
                .map(|s| format!(" (HTTP {})", s))
                .unwrap_or_default();
            println!(
                "  {} [{}{}]: {}",
                failure.name, failure.step, status, failure.message
            );
        }
    }
}

fn batch_outcome(report: &BatchReport) -> Result<()> {
    if report.is_complete_success() {
        Ok(())
    } else {
        Err(AppError::generic(format!(
            "{} of {} item(s) failed",
            report.failed, report.total
        )))
    }
}

/// Handle the upload command
///
/// Every sub-folder with `metadata.xml` and a PDF becomes one submission.
pub async fn handle_upload(args: UploadArgs, mut config: AppConfig, quiet: bool) -> Result<()> {
    args.batch.validate().map_err(AppError::generic)?;
    apply_batch_overrides(&mut config, &args.batch);

    let tasks = discover_item_folders(&args.dir)?;
    if tasks.is_empty() {
        println!("No item folders ready to upload in {}", args.dir.display());
        return Ok(());
    }

    if args.dry_run {
        println!("Would submit {} item(s):", tasks.len());
        for task in &tasks {
            println!("  {} <- {}", task.name, task.metadata_path.display());
        }
        return Ok(());
    }

    let worker_config = apply_worker_overrides(config.worker_config(), &args.batch);
    let report = dispatch(&config, worker_config, tasks, "Uploading", quiet).await?;
    print_report(&report);
    batch_outcome(&report)
}

/// Handle the ingest command
///
/// Loose PDFs get a generated Dublin Core sidecar when they have none. Files
/// recorded in the directory's ingest ledger are skipped unless forced.
pub async fn handle_ingest(args: IngestArgs, mut config: AppConfig, quiet: bool) -> Result<()> {
    args.batch.validate().map_err(AppError::generic)?;
    apply_batch_overrides(&mut config, &args.batch);

    let mut ledger = IngestLedger::load(&args.dir)?;
    let mut fingerprints: HashMap<PathBuf, String> = HashMap::new();
    let mut tasks = Vec::new();

    for content in discover_loose_files(&args.dir)? {
        let fingerprint = file_fingerprint(&content)?;
        if !args.force && ledger.contains(&fingerprint) {
            debug!("Skipping {}: already ingested", content.display());
            continue;
        }

        let metadata = match ensure_sidecar(&content).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping {}: {}", content.display(), e);
                continue;
            }
        };
        fingerprints.insert(content.clone(), fingerprint);
        tasks.push(UploadTask::from_loose_file(content, metadata));
    }

    if tasks.is_empty() {
        println!("Nothing new to ingest in {}", args.dir.display());
        return Ok(());
    }

    let worker_config = apply_worker_overrides(config.ingest_worker_config(), &args.batch);
    let report = dispatch(&config, worker_config, tasks, "Ingesting", quiet).await?;

    for item in &report.submitted {
        if let Some(fingerprint) = fingerprints.remove(&item.content_path) {
            if let Err(e) = ledger.record(fingerprint) {
                warn!("Could not record {} in ingest ledger: {}", item.name, e);
            }
        }
    }

    print_report(&report);
    batch_outcome(&report)
}

/// Handle the scan command
pub async fn handle_scan(args: ScanArgs) -> Result<()> {
    let summary = summarize_folders(&args.dir)?;
    println!("Scanned {}", args.dir.display());
    println!("  Item folders: {}", summary.folders);
    println!("  With metadata.xml: {}", summary.with_metadata);
    println!("  Ready to upload: {}", summary.ready);
    Ok(())
}

/// Handle the collections command
pub async fn handle_collections(config: AppConfig) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let mut session = DspaceSession::connect(&config.client_config(), credentials).await?;
    let collections = session.list_collections().await?;

    if collections.is_empty() {
        println!("No collections visible to this account");
        return Ok(());
    }

    println!("{:<38} NAME", "UUID");
    for collection in &collections {
        println!("{:<38} {}", collection.uuid, collection.name);
    }
    println!();
    println!("{} collection(s)", collections.len());
    Ok(())
}

/// Handle authentication commands
pub async fn handle_auth(args: AuthArgs, config: AppConfig) -> Result<()> {
    let client_config = config.client_config();
    match args.action {
        AuthAction::Setup => setup_credentials(&client_config).await?,
        AuthAction::Verify => {
            if !verify_credentials(&client_config).await? {
                return Err(AppError::generic("Credential verification failed"));
            }
        }
        AuthAction::Status => show_auth_status(&client_config).await?,
        AuthAction::Clear => {
            if clear_credentials()? {
                println!("Removed stored credentials from .env");
            } else {
                println!("No stored credentials found in .env");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_batch_overrides() {
        let mut config = AppConfig::default();
        let batch = BatchArgs {
            collection: Some(" c0ffee ".to_string()),
            workers: Some(3),
            attempts: None,
            error_dir: Some(PathBuf::from("/data/error")),
            archive_dir: None,
        };

        apply_batch_overrides(&mut config, &batch);
        assert_eq!(config.require_collection().unwrap(), "c0ffee");
        assert_eq!(config.dspace.error_dir, Some(PathBuf::from("/data/error")));
        assert!(config.dspace.archive_dir.is_none());

        let worker = apply_worker_overrides(config.ingest_worker_config(), &batch);
        assert_eq!(worker.worker_count, 3);
        assert_eq!(worker.max_attempts, 3);
    }

    #[test]
    fn test_ingest_workers_follow_config_file() {
        let mut config: AppConfig = toml::from_str(
            r#"
[workers]
retry_delay_ms = 250
progress_buffer_size = 7
"#,
        )
        .unwrap();
        let batch = BatchArgs {
            attempts: Some(5),
            ..Default::default()
        };

        apply_batch_overrides(&mut config, &batch);
        let worker = apply_worker_overrides(config.ingest_worker_config(), &batch);
        assert_eq!(worker.retry_delay, std::time::Duration::from_millis(250));
        assert_eq!(worker.progress_buffer_size, 7);
        assert_eq!(worker.max_attempts, 5);
        assert_eq!(worker.worker_count, crate::constants::workers::INGEST_WORKER_COUNT);
    }

    #[test]
    fn test_batch_outcome() {
        let ok = BatchReport {
            total: 2,
            succeeded: 2,
            ..Default::default()
        };
        assert!(batch_outcome(&ok).is_ok());

        let partial = BatchReport {
            total: 2,
            succeeded: 1,
            failed: 1,
            ..Default::default()
        };
        let err = batch_outcome(&partial).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_need_credentials() {
        let temp = TempDir::new().unwrap();
        let item = temp.path().join("item_001");
        std::fs::create_dir(&item).unwrap();
        std::fs::write(item.join("metadata.xml"), "<dublin_core/>").unwrap();
        std::fs::write(item.join("scan.pdf"), b"%PDF-1.4").unwrap();

        let args = UploadArgs {
            dir: temp.path().to_path_buf(),
            batch: BatchArgs::default(),
            dry_run: true,
        };
        assert!(handle_upload(args, AppConfig::default(), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_without_collection_fails() {
        let temp = TempDir::new().unwrap();
        let item = temp.path().join("item_001");
        std::fs::create_dir(&item).unwrap();
        std::fs::write(item.join("metadata.xml"), "<dublin_core/>").unwrap();
        std::fs::write(item.join("scan.pdf"), b"%PDF-1.4").unwrap();

        let args = UploadArgs {
            dir: temp.path().to_path_buf(),
            batch: BatchArgs::default(),
            dry_run: false,
        };
        let result = handle_upload(args, AppConfig::default(), true).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_scan_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(handle_scan(ScanArgs {
            dir: temp.path().to_path_buf()
        })
        .await
        .is_ok());
    }
}
