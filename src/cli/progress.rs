//! Progress display for batch submissions
//!
//! Uses an indicatif bar when stderr is a terminal and falls back to a plain
//! progress line every few finished items otherwise (for logs and pipes).

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::worker::{BatchReport, StatsAggregator, WorkerEvent};
use crate::constants::progress;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable the visual progress bar
    pub enable_progress_bar: bool,
    /// Print a text line every this many finished items in text mode
    pub report_every: usize,
    /// Suppress all progress output
    pub quiet: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: true,
            report_every: progress::REPORT_EVERY,
            quiet: false,
        }
    }
}

/// Progress display for one batch
pub struct BatchProgress {
    config: ProgressConfig,
    bar: Option<ProgressBar>,
}

impl BatchProgress {
    pub fn new(config: ProgressConfig, total: usize, label: &str) -> Self {
        let use_bar =
            config.enable_progress_bar && !config.quiet && atty::is(atty::Stream::Stderr);

        let bar = use_bar.then(|| {
            let bar = ProgressBar::new(total as u64);
            let style = ProgressStyle::with_template(
                "{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(progress::TICK_MS));
            bar
        });

        if bar.is_none() && !config.quiet {
            println!("{}: {} item(s)", label, total);
        }

        Self { config, bar }
    }

    /// Update the display from a worker event
    pub fn handle(&self, event: &WorkerEvent, stats: &StatsAggregator) {
        let WorkerEvent::Finished { outcome, .. } = event else {
            return;
        };
        if self.config.quiet {
            return;
        }

        match &self.bar {
            Some(bar) => {
                bar.set_position(stats.completed() as u64);
                bar.set_message(format!(
                    "{} ok, {} failed, {} active",
                    stats.succeeded(),
                    stats.failed(),
                    stats.active_workers()
                ));
                if let Err(e) = &outcome.result {
                    bar.println(format!("FAILED {}: {}", outcome.task.name, e));
                }
            }
            None => {
                if let Err(e) = &outcome.result {
                    println!("FAILED {}: {}", outcome.task.name, e);
                }
                if should_report(stats.completed(), stats.total(), self.config.report_every) {
                    println!("{}", progress_line(stats));
                }
            }
        }
    }

    pub fn finish(&self, report: &BatchReport) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!(
                "{} ok, {} failed",
                report.succeeded, report.failed
            ));
        }
    }
}

/// Report on every `every`-th item and on the last one
fn should_report(completed: usize, total: usize, every: usize) -> bool {
    completed == total || (every > 0 && completed % every == 0)
}

/// One-line textual progress
pub fn progress_line(stats: &StatsAggregator) -> String {
    let eta = stats
        .eta()
        .map(|eta| format!(", ETA {}s", eta.as_secs()))
        .unwrap_or_default();
    format!(
        "Progress: {}/{} ({} ok, {} failed, {:.2} items/s{})",
        stats.completed(),
        stats.total(),
        stats.succeeded(),
        stats.failed(),
        stats.throughput(),
        eta
    )
}
