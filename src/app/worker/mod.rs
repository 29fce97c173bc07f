//! Bulk submission workers
//!
//! A batch of [`UploadTask`](crate::app::models::UploadTask)s is spread over a
//! bounded pool of workers. Each worker owns a separate DSpace session, pulls
//! the next task from a shared queue and runs the full workflow for it. A
//! failing task never stops the batch: its error is recorded and the worker
//! moves on.
//!
//! # Module Organization
//!
//! - [`config`] - Worker configuration with validation and presets
//! - [`types`] - Events, per-task outcomes and the batch report
//! - [`stats`] - Running counters and retry timing
//! - [`core`] - Individual worker implementation
//! - [`pool`] - Worker pool management and coordination
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use dspace_uploader::app::client::ClientConfig;
//! use dspace_uploader::app::items::discover_item_folders;
//! use dspace_uploader::app::worker::{ConfigPresets, DispatchContext, WorkerPool};
//! use dspace_uploader::auth::Credentials;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = DispatchContext::new(
//!     ClientConfig::default(),
//!     Credentials::from_env()?,
//!     "5a1f2b3c-0000-0000-0000-000000000000",
//! )
//! .shared();
//!
//! let tasks = discover_item_folders(Path::new("./items"))?;
//! let mut pool = WorkerPool::new(ConfigPresets::bulk_upload(), context);
//! let report = pool
//!     .run(tasks, |_event, stats| {
//!         println!("{}/{} done", stats.completed(), stats.total());
//!     })
//!     .await?;
//!
//! println!("{} submitted, {} failed", report.succeeded, report.failed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod pool;
pub mod stats;
pub mod types;

// Re-export main public API
pub use config::{ConfigPresets, WorkerConfig, WorkerConfigBuilder};
pub use core::{is_retryable, SubmissionWorker, TaskQueue};
pub use pool::{PoolState, WorkerPool};
pub use stats::{format_summary, BackoffCalculator, StatsAggregator};
pub use types::{
    BatchReport, DispatchContext, FailedItem, ItemOutcome, SubmittedItem, WorkerEvent,
    WorkerStatus,
};
