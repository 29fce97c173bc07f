//! Worker statistics and retry timing
//!
//! The dispatcher owns one [`StatsAggregator`]; workers only talk to it
//! through the progress channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::{
    BatchReport, FailedItem, SubmittedItem, WorkerEvent, WorkerStatus,
};

/// Running counters for one batch
#[derive(Debug)]
pub struct StatsAggregator {
    total: usize,
    succeeded: usize,
    failed: usize,
    attempts: u64,
    workers: HashMap<u32, WorkerStatus>,
    submitted: Vec<SubmittedItem>,
    failures: Vec<FailedItem>,
    started: Instant,
}

impl StatsAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            attempts: 0,
            workers: HashMap::new(),
            submitted: Vec::new(),
            failures: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Update counters from a worker event
    pub fn record(&mut self, event: &WorkerEvent) {
        match event {
            WorkerEvent::Status { worker_id, status } => {
                self.workers.insert(*worker_id, status.clone());
            }
            WorkerEvent::Finished { outcome, .. } => {
                self.attempts += u64::from(outcome.attempts);
                match &outcome.result {
                    Ok(receipt) => {
                        self.succeeded += 1;
                        self.submitted.push(SubmittedItem {
                            name: outcome.task.name.clone(),
                            content_path: outcome.task.content_path.clone(),
                            receipt: receipt.clone(),
                            attempts: outcome.attempts,
                        });
                    }
                    Err(error) => {
                        self.failed += 1;
                        self.failures.push(FailedItem::from_error(
                            &outcome.task,
                            error,
                            outcome.attempts,
                        ));
                    }
                }
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed())
    }

    /// Workflow attempts made so far, across all tasks
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Workers currently connecting or submitting
    pub fn active_workers(&self) -> usize {
        self.workers.values().filter(|s| s.is_working()).count()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Finished items per second so far
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.completed() as f64 / secs
        }
    }

    /// Estimated time to finish the remaining items
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.throughput();
        if rate <= 0.0 || self.remaining() == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.remaining() as f64 / rate))
    }

    pub fn into_report(self) -> BatchReport {
        BatchReport {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            elapsed: self.started.elapsed(),
            submitted: self.submitted,
            failures: self.failures,
        }
    }
}

/// Retry delay calculation
pub struct BackoffCalculator;

impl BackoffCalculator {
    /// Delay before restart number `attempt` (1-based): `base * attempt` plus jitter
    pub fn retry_delay(base: Duration, attempt: u32, jitter_fraction: f64) -> Duration {
        let linear = base.saturating_mul(attempt.max(1));
        if jitter_fraction <= 0.0 {
            return linear;
        }
        let jitter = linear.mul_f64(jitter_fraction * fastrand::f64());
        linear + jitter
    }
}

/// Summary line for a finished batch
pub fn format_summary(report: &BatchReport) -> String {
    format!(
        "{} submitted, {} failed of {} in {:.1}s ({:.2} items/s)",
        report.succeeded,
        report.failed,
        report.total,
        report.elapsed.as_secs_f64(),
        report.items_per_second()
    )
}
