//! Prelude module for DSpace Uploader Library
//!
//! Re-exports the most commonly used items so a typical integration needs a
//! single `use dspace_uploader::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dspace_uploader::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let tasks = discover_item_folders(Path::new("./items"))?;
//!     let context = DispatchContext::new(
//!         ClientConfig::default(),
//!         Credentials::from_env()?,
//!         "collection-uuid",
//!     )
//!     .shared();
//!
//!     let report = WorkerPool::new(ConfigPresets::bulk_upload(), context)
//!         .run(tasks, |_, _| {})
//!         .await?;
//!     println!("{} submitted", report.succeeded);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components
pub use crate::app::{
    discover_item_folders, discover_loose_files, read_metadata_file, BatchReport, ClientConfig,
    ConfigPresets, DispatchContext, DspaceSession, HoldingAreas, MetadataPatch,
    SubmissionDriver, SubmissionReceipt, UploadTask, WorkerConfig, WorkerPool, WorkspaceItem,
};

// Authentication
pub use crate::auth::{check_credentials, get_auth_status, AuthStatus, Credentials};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{
    DEFAULT_RATE_LIMIT_RPS, DEFAULT_WORKER_COUNT, ENV_EMAIL, ENV_PASSWORD, USER_AGENT,
};

pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let _worker_config = WorkerConfig::default();
        let _app_config = AppConfig::default();
        let _status = get_auth_status();

        assert_eq!(DEFAULT_WORKER_COUNT, 8);
        assert_eq!(ENV_PASSWORD, "DSPACE_PASSWORD");
    }
}
