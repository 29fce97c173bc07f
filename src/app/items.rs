//! Item discovery and holding areas
//!
//! Turns directories into [`UploadTask`]s and moves finished inputs into the
//! error or archive areas after submission.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::app::models::{TaskOrigin, UploadTask};
use crate::constants::files;

/// Name of the per-directory ledger of already submitted loose files
pub const INGEST_LEDGER_FILE: &str = ".dspace_ingested";

/// Folder counts reported by `scan`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub folders: usize,
    pub with_metadata: usize,
    pub ready: usize,
}

fn has_content_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(files::CONTENT_EXTENSION))
        .unwrap_or(false)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

/// First content file of an item folder, by name
pub fn find_content_file(folder: &Path) -> io::Result<Option<PathBuf>> {
    Ok(sorted_entries(folder)?
        .into_iter()
        .find(|p| p.is_file() && has_content_extension(p)))
}

/// Count item folders and how many are ready to upload
pub fn summarize_folders(dir: &Path) -> io::Result<FolderSummary> {
    let mut summary = FolderSummary::default();
    for folder in sorted_entries(dir)?.into_iter().filter(|p| p.is_dir()) {
        summary.folders += 1;
        if folder.join(files::METADATA_FILE_NAME).is_file() {
            summary.with_metadata += 1;
            if find_content_file(&folder)?.is_some() {
                summary.ready += 1;
            }
        }
    }
    Ok(summary)
}

/// One task per sub-folder holding `metadata.xml` and a content file
///
/// Folders missing either are logged and skipped.
pub fn discover_item_folders(dir: &Path) -> io::Result<Vec<UploadTask>> {
    let mut tasks = Vec::new();

    for folder in sorted_entries(dir)?.into_iter().filter(|p| p.is_dir()) {
        let metadata = folder.join(files::METADATA_FILE_NAME);
        if !metadata.is_file() {
            tracing::debug!("Skipping {}: no {}", folder.display(), files::METADATA_FILE_NAME);
            continue;
        }
        match find_content_file(&folder)? {
            Some(content) => tasks.push(UploadTask::from_folder(&folder, metadata, content)),
            None => tracing::warn!("Skipping {}: no .{} file", folder.display(), files::CONTENT_EXTENSION),
        }
    }

    tracing::info!("Discovered {} item folder(s) in {}", tasks.len(), dir.display());
    Ok(tasks)
}

/// Loose content files directly inside `dir`
pub fn discover_loose_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file() && has_content_extension(p))
        .collect())
}

/// Fingerprint of a loose file: md5 of `<name>-<size>`
pub fn file_fingerprint(path: &Path) -> io::Result<String> {
    let size = std::fs::metadata(path)?.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(format!("{:x}", md5::compute(format!("{}-{}", name, size))))
}

/// Fingerprints of loose files already submitted from one directory
#[derive(Debug)]
pub struct IngestLedger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl IngestLedger {
    /// Load the ledger of `dir`, empty if none exists yet
    pub fn load(dir: &Path) -> io::Result<Self> {
        let path = dir.join(INGEST_LEDGER_FILE);
        let seen = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, seen })
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a fingerprint and append it to the ledger file
    pub fn record(&mut self, fingerprint: String) -> io::Result<()> {
        use std::io::Write;

        if self.seen.contains(&fingerprint) {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", fingerprint)?;
        self.seen.insert(fingerprint);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Optional error and archive destinations for finished tasks
#[derive(Debug, Clone, Default)]
pub struct HoldingAreas {
    pub error_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
}

impl HoldingAreas {
    pub fn new(error_dir: Option<PathBuf>, archive_dir: Option<PathBuf>) -> Self {
        Self {
            error_dir,
            archive_dir,
        }
    }

    /// Move a failed task's inputs to `error_dir/YYYYMMDD/`
    ///
    /// Returns the destination, or `None` when no error area is configured.
    pub async fn move_to_error(&self, task: &UploadTask) -> io::Result<Option<PathBuf>> {
        let Some(error_dir) = &self.error_dir else {
            return Ok(None);
        };
        let dated = error_dir.join(Local::now().format(files::ERROR_DATE_FORMAT).to_string());
        tokio::fs::create_dir_all(&dated).await?;

        match &task.origin {
            TaskOrigin::ItemFolder(folder) => {
                move_into(folder, &dated).await?;
            }
            TaskOrigin::LooseFile => {
                move_into(&task.content_path, &dated).await?;
                if task.metadata_path.exists() {
                    move_into(&task.metadata_path, &dated).await?;
                }
            }
        }

        tracing::info!("Moved {} to error area {}", task.name, dated.display());
        Ok(Some(dated))
    }

    /// Move a submitted task's inputs to `archive_dir/item_<id>/`
    ///
    /// Loose-file sidecars are renamed `item_<id>_dublin_core.xml`.
    pub async fn archive(&self, task: &UploadTask, workspace_id: u64) -> io::Result<Option<PathBuf>> {
        let Some(archive_dir) = &self.archive_dir else {
            return Ok(None);
        };
        let item_name = format!("{}{}", files::ARCHIVE_ITEM_PREFIX, workspace_id);
        let destination = archive_dir.join(&item_name);

        match &task.origin {
            TaskOrigin::ItemFolder(folder) => {
                tokio::fs::create_dir_all(archive_dir).await?;
                move_path(folder, &destination).await?;
            }
            TaskOrigin::LooseFile => {
                tokio::fs::create_dir_all(&destination).await?;
                move_into(&task.content_path, &destination).await?;
                if task.metadata_path.exists() {
                    let renamed = destination.join(format!("{}{}", item_name, files::DUBLIN_CORE_SUFFIX));
                    move_path(&task.metadata_path, &renamed).await?;
                }
            }
        }

        tracing::info!("Archived {} to {}", task.name, destination.display());
        Ok(Some(destination))
    }
}

async fn move_into(source: &Path, dir: &Path) -> io::Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name in {}", source.display()),
        )
    })?;
    let target = dir.join(name);
    move_path(source, &target).await?;
    Ok(target)
}

/// Rename, or copy and remove when `target` is on another filesystem
async fn move_path(source: &Path, target: &Path) -> io::Result<()> {
    match tokio::fs::rename(source, target).await {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                "{} and {} are on different filesystems, copying",
                source.display(),
                target.display()
            );
            copy_then_remove(source, target).await
        }
        other => other,
    }
}

async fn copy_then_remove(source: &Path, target: &Path) -> io::Result<()> {
    if tokio::fs::metadata(source).await?.is_dir() {
        copy_dir(source, target).await?;
        tokio::fs::remove_dir_all(source).await
    } else {
        tokio::fs::copy(source, target).await?;
        tokio::fs::remove_file(source).await
    }
}

async fn copy_dir(source: &Path, target: &Path) -> io::Result<()> {
    let mut pending = vec![(source.to_path_buf(), target.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dest = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), dest));
            } else {
                tokio::fs::copy(entry.path(), &dest).await?;
            }
        }
    }
    Ok(())
}
