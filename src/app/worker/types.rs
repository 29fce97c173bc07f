//! Worker type definitions and data structures
//!
//! Progress events sent from workers to the dispatcher, per-task outcomes and
//! the final batch report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::app::client::ClientConfig;
use crate::app::items::HoldingAreas;
use crate::app::models::{SubmissionReceipt, UploadTask};
use crate::auth::Credentials;
use crate::errors::{SubmissionError, SubmissionResult};

/// Everything a worker needs to open its own session and finish tasks
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub client_config: ClientConfig,
    pub credentials: Credentials,
    pub collection_uuid: String,
    pub holding: HoldingAreas,
}

impl DispatchContext {
    pub fn new(
        client_config: ClientConfig,
        credentials: Credentials,
        collection_uuid: impl Into<String>,
    ) -> Self {
        Self {
            client_config,
            credentials,
            collection_uuid: collection_uuid.into(),
            holding: HoldingAreas::default(),
        }
    }

    pub fn with_holding(mut self, holding: HoldingAreas) -> Self {
        self.holding = holding;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Current status of a submission worker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WorkerStatus {
    /// Worker is waiting for its first task
    Idle,
    /// Opening a session (probe, CSRF, login)
    Connecting,
    /// Running the five-step workflow
    Submitting { attempt: u32 },
    /// Sleeping before a restart
    WaitingToRetry { attempt: u32 },
    /// Queue drained, worker exiting
    Shutdown,
}

impl WorkerStatus {
    /// Check if this status indicates the worker is actively working
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            WorkerStatus::Connecting | WorkerStatus::Submitting { .. }
        )
    }
}

/// Final result of one task
#[derive(Debug)]
pub struct ItemOutcome {
    pub task: UploadTask,
    pub result: SubmissionResult<SubmissionReceipt>,
    /// Workflow attempts made (0 if the metadata could not be read)
    pub attempts: u32,
    pub elapsed: Duration,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Message from a worker to the dispatcher
#[derive(Debug)]
pub enum WorkerEvent {
    Status { worker_id: u32, status: WorkerStatus },
    Finished { worker_id: u32, outcome: ItemOutcome },
}

impl WorkerEvent {
    pub fn worker_id(&self) -> u32 {
        match self {
            WorkerEvent::Status { worker_id, .. } | WorkerEvent::Finished { worker_id, .. } => {
                *worker_id
            }
        }
    }
}

/// A task that reached the workflow
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedItem {
    pub name: String,
    pub content_path: PathBuf,
    pub receipt: SubmissionReceipt,
    pub attempts: u32,
}

/// A task that did not
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub name: String,
    pub content_path: PathBuf,
    pub step: &'static str,
    pub status: Option<u16>,
    pub message: String,
    pub attempts: u32,
}

impl FailedItem {
    pub fn from_error(task: &UploadTask, error: &SubmissionError, attempts: u32) -> Self {
        Self {
            name: task.name.clone(),
            content_path: task.content_path.clone(),
            step: error.step(),
            status: error.status(),
            message: error.to_string(),
            attempts,
        }
    }
}

/// Aggregate result of a batch; `succeeded + failed == total`
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub submitted: Vec<SubmittedItem>,
    pub failures: Vec<FailedItem>,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Items finished per second over the whole batch
    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            (self.succeeded + self.failed) as f64 / secs
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }
}
