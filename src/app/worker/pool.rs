//! Worker pool management and coordination
//!
//! The pool spreads a batch of tasks over a bounded number of workers, each
//! with its own session, and folds their progress events into a
//! [`BatchReport`].

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::WorkerConfig;
use super::core::{SubmissionWorker, TaskQueue};
use super::stats::StatsAggregator;
use super::types::{BatchReport, DispatchContext, WorkerEvent};
use crate::app::models::UploadTask;
use crate::errors::{DispatchError, DispatchResult};

/// Current state of the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Pool has been created but not started
    Created,
    /// Workers are processing the batch
    Running,
    /// Batch finished; a pool runs once
    Finished,
}

/// Pool for dispatching one batch over several workers
#[derive(Debug)]
pub struct WorkerPool {
    config: WorkerConfig,
    context: Arc<DispatchContext>,
    state: PoolState,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, context: Arc<DispatchContext>) -> Self {
        Self {
            config,
            context,
            state: PoolState::Created,
        }
    }

    /// Run all tasks to completion
    ///
    /// `on_event` sees every worker event after it has been counted. The
    /// returned report always satisfies `succeeded + failed == tasks.len()`.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` for invalid settings or a reused pool;
    /// `ChannelClosed` if workers stopped before reporting every task
    pub async fn run<F>(&mut self, tasks: Vec<UploadTask>, mut on_event: F) -> DispatchResult<BatchReport>
    where
        F: FnMut(&WorkerEvent, &StatsAggregator),
    {
        if self.state != PoolState::Created {
            return Err(DispatchError::ConfigurationError(format!(
                "Cannot start pool in state: {:?}",
                self.state
            )));
        }
        self.config.validate()?;

        let total = tasks.len();
        let mut stats = StatsAggregator::new(total);
        if total == 0 {
            self.state = PoolState::Finished;
            return Ok(stats.into_report());
        }

        self.state = PoolState::Running;
        let worker_count = self.config.worker_count.min(total);
        info!("Dispatching {} task(s) over {} worker(s)", total, worker_count);

        let queue: TaskQueue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (events_tx, mut events_rx) = mpsc::channel(self.config.progress_buffer_size);

        let handles: Vec<(u32, JoinHandle<DispatchResult<()>>)> = (0..worker_count as u32)
            .map(|worker_id| {
                let worker = SubmissionWorker::new(
                    worker_id,
                    self.config.clone(),
                    Arc::clone(&self.context),
                    Arc::clone(&queue),
                    events_tx.clone(),
                );
                (worker_id, tokio::spawn(worker.run()))
            })
            .collect();
        drop(events_tx);

        while let Some(event) = events_rx.recv().await {
            stats.record(&event);
            on_event(&event, &stats);
        }

        let (worker_ids, joins): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();
        let mut panicked = None;
        for (worker_id, joined) in worker_ids.into_iter().zip(join_all(joins).await) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Worker {} stopped early: {}", worker_id, e),
                Err(e) => {
                    error!("Worker {} panicked: {}", worker_id, e);
                    panicked.get_or_insert(worker_id);
                }
            }
        }

        self.state = PoolState::Finished;

        let missing = stats.remaining();
        if missing > 0 {
            return Err(match panicked {
                Some(worker_id) => DispatchError::WorkerPanic { worker_id },
                None => DispatchError::ChannelClosed { missing },
            });
        }

        let report = stats.into_report();
        info!(
            "Batch finished: {} succeeded, {} failed in {:.1}s",
            report.succeeded,
            report.failed,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::ClientConfig;
    use crate::app::worker::config::ConfigPresets;
    use crate::auth::Credentials;
    use std::path::PathBuf;

    fn context() -> Arc<DispatchContext> {
        DispatchContext::new(
            ClientConfig::default(),
            Credentials::new("user@example.org", "secret"),
            "c0ffee",
        )
        .shared()
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let mut pool = WorkerPool::new(ConfigPresets::testing(), context());
        let report = pool.run(Vec::new(), |_, _| {}).await.unwrap();
        assert_eq!(report.total, 0);
        assert!(report.is_complete_success());
        assert_eq!(pool.state(), PoolState::Finished);
    }

    #[tokio::test]
    async fn test_pool_runs_once() {
        let mut pool = WorkerPool::new(ConfigPresets::testing(), context());
        pool.run(Vec::new(), |_, _| {}).await.unwrap();
        assert!(matches!(
            pool.run(Vec::new(), |_, _| {}).await,
            Err(DispatchError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = WorkerConfig {
            worker_count: 0,
            ..ConfigPresets::testing()
        };
        let mut pool = WorkerPool::new(config, context());
        assert!(pool.run(Vec::new(), |_, _| {}).await.is_err());
        assert_eq!(pool.state(), PoolState::Created);
    }

    #[tokio::test]
    async fn test_every_task_is_reported() {
        // Missing metadata fails each task locally without touching the network
        let tasks: Vec<_> = (0..5)
            .map(|i| {
                UploadTask::from_loose_file(
                    PathBuf::from(format!("/nonexistent/{}.pdf", i)),
                    PathBuf::from(format!("/nonexistent/{}_dublin_core.xml", i)),
                )
            })
            .collect();

        let mut finished_events = 0;
        let mut pool = WorkerPool::new(ConfigPresets::testing(), context());
        let report = pool
            .run(tasks, |event, _| {
                if matches!(event, WorkerEvent::Finished { .. }) {
                    finished_events += 1;
                }
            })
            .await
            .unwrap();

        assert_eq!(finished_events, 5);
        assert_eq!(report.total, 5);
        assert_eq!(report.succeeded + report.failed, 5);
        assert_eq!(report.failures.len(), 5);
        assert!(report.failures.iter().all(|f| f.step == "metadata input"));
    }
}
