//! Individual submission worker
//!
//! A worker pulls tasks from the shared queue until it is empty. It owns its
//! DSpace session, opening it lazily and dropping it after session-level
//! failures so the next attempt logs in again.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::config::WorkerConfig;
use super::stats::BackoffCalculator;
use super::types::{DispatchContext, ItemOutcome, WorkerEvent, WorkerStatus};
use crate::app::client::{DspaceSession, SubmissionDriver};
use crate::app::metadata::read_metadata_file;
use crate::app::models::{MetadataPatch, SubmissionReceipt, UploadTask};
use crate::errors::{DispatchError, DispatchResult, SubmissionError, SubmissionResult};

/// Shared FIFO of pending tasks
pub type TaskQueue = Arc<Mutex<VecDeque<UploadTask>>>;

/// Whether a failed attempt is worth starting over
///
/// Input problems and out-of-order steps fail the same way every time.
pub fn is_retryable(error: &SubmissionError) -> bool {
    !matches!(
        error,
        SubmissionError::Metadata(_)
            | SubmissionError::Io(_)
            | SubmissionError::InvalidTransition { .. }
    )
}

/// Whether the session should be discarded after this error
fn invalidates_session(error: &SubmissionError) -> bool {
    matches!(
        error,
        SubmissionError::Auth(_) | SubmissionError::Transport { .. }
    )
}

/// Individual submission worker
#[derive(Debug)]
pub struct SubmissionWorker {
    id: u32,
    config: WorkerConfig,
    context: Arc<DispatchContext>,
    queue: TaskQueue,
    events_tx: mpsc::Sender<WorkerEvent>,
    session: Option<DspaceSession>,
}

impl SubmissionWorker {
    pub fn new(
        id: u32,
        config: WorkerConfig,
        context: Arc<DispatchContext>,
        queue: TaskQueue,
        events_tx: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        Self {
            id,
            config,
            context,
            queue,
            events_tx,
            session: None,
        }
    }

    /// Start the worker loop; returns when the queue is empty
    pub async fn run(mut self) -> DispatchResult<()> {
        info!("Worker {} starting", self.id);
        self.report(WorkerStatus::Idle).await;

        loop {
            let next = self.queue.lock().await.pop_front();
            let Some(task) = next else {
                break;
            };

            let outcome = self.process(task).await;
            self.events_tx
                .send(WorkerEvent::Finished {
                    worker_id: self.id,
                    outcome,
                })
                .await
                .map_err(|_| DispatchError::ChannelClosed { missing: 1 })?;
        }

        self.report(WorkerStatus::Shutdown).await;
        debug!("Worker {} finished", self.id);
        Ok(())
    }

    async fn report(&self, status: WorkerStatus) {
        let _ = self
            .events_tx
            .send(WorkerEvent::Status {
                worker_id: self.id,
                status,
            })
            .await;
    }

    /// Run one task to a terminal outcome, restarting on failure
    async fn process(&mut self, task: UploadTask) -> ItemOutcome {
        let start = Instant::now();

        let patch = match read_metadata_file(&task.metadata_path).await {
            Ok(patch) => patch,
            Err(e) => {
                warn!("Worker {}: cannot read metadata for {}: {}", self.id, task.name, e);
                return self
                    .finish(task, Err(SubmissionError::Metadata(e)), 0, start)
                    .await;
            }
        };

        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            self.report(WorkerStatus::Submitting { attempt }).await;

            match self.attempt(&task, &patch).await {
                Ok(receipt) => break Ok(receipt),
                Err(e) if attempt < self.config.max_attempts && is_retryable(&e) => {
                    if invalidates_session(&e) {
                        self.session = None;
                    }
                    let delay = BackoffCalculator::retry_delay(
                        self.config.retry_delay,
                        attempt,
                        self.config.retry_jitter_fraction,
                    );
                    warn!(
                        "Worker {}: attempt {}/{} for {} failed: {}. Restarting in {:?}",
                        self.id, attempt, self.config.max_attempts, task.name, e, delay
                    );
                    self.report(WorkerStatus::WaitingToRetry { attempt }).await;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if invalidates_session(&e) {
                        self.session = None;
                    }
                    break Err(e);
                }
            }
        };

        self.finish(task, result, attempt, start).await
    }

    /// One full pass through the workflow with a fresh workspace item
    async fn attempt(
        &mut self,
        task: &UploadTask,
        patch: &MetadataPatch,
    ) -> SubmissionResult<SubmissionReceipt> {
        let context = Arc::clone(&self.context);

        let session = match self.session.take() {
            Some(session) => session,
            None => {
                self.report(WorkerStatus::Connecting).await;
                DspaceSession::connect(&context.client_config, context.credentials.clone()).await?
            }
        };
        let session = self.session.insert(session);

        SubmissionDriver::new(session)
            .submit_item(&context.collection_uuid, patch, &task.content_path)
            .await
    }

    /// Apply holding-area moves and build the outcome
    async fn finish(
        &self,
        task: UploadTask,
        result: SubmissionResult<SubmissionReceipt>,
        attempts: u32,
        start: Instant,
    ) -> ItemOutcome {
        let holding = &self.context.holding;
        match &result {
            Ok(receipt) => {
                info!(
                    "Worker {}: {} submitted as workspace {}",
                    self.id, task.name, receipt.workspace_id
                );
                if let Err(e) = holding.archive(&task, receipt.workspace_id).await {
                    warn!("Could not archive {}: {}", task.name, e);
                }
            }
            Err(e) => {
                warn!("Worker {}: {} failed: {}", self.id, task.name, e);
                if let Err(move_err) = holding.move_to_error(&task).await {
                    warn!("Could not move {} to error area: {}", task.name, move_err);
                }
            }
        }

        ItemOutcome {
            task,
            result,
            attempts,
            elapsed: start.elapsed(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}
