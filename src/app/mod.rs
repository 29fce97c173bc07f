//! Core application logic for DSpace Uploader
//!
//! This module contains the DSpace REST client, the submission data model,
//! Dublin Core metadata handling, input discovery and the bulk dispatcher.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dspace_uploader::app::{ClientConfig, DspaceSession, SubmissionDriver};
//! use dspace_uploader::app::metadata::read_metadata_file;
//! use dspace_uploader::auth::Credentials;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session =
//!     DspaceSession::connect(&ClientConfig::default(), Credentials::from_env()?).await?;
//!
//! let patch = read_metadata_file(Path::new("item_001/metadata.xml")).await?;
//! let receipt = SubmissionDriver::new(&mut session)
//!     .submit_item("collection-uuid", &patch, Path::new("item_001/scan.pdf"))
//!     .await?;
//! println!("Workspace item {} submitted", receipt.workspace_id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod items;
pub mod metadata;
pub mod models;
pub mod worker;

// Re-export main public API
pub use client::{ApiResponse, ClientConfig, DspaceSession, SubmissionDriver, TokenStore};
pub use items::{
    discover_item_folders, discover_loose_files, summarize_folders, FolderSummary, HoldingAreas,
    IngestLedger,
};
pub use metadata::{ensure_sidecar, parse_dublin_core, read_metadata_file};
pub use models::{
    CollectionSummary, MetadataPatch, PatchOp, PatchOperation, SubmissionReceipt, UploadTask,
    WorkspaceItem, WorkspaceState,
};
pub use worker::{BatchReport, ConfigPresets, DispatchContext, WorkerConfig, WorkerPool};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert!(MetadataPatch::new().is_empty());
    }
}
