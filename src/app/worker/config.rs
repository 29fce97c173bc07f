//! Worker configuration management
//!
//! Settings for the bulk dispatcher: pool size, per-task restart policy and
//! progress channel sizing, with validation, a builder and presets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{DispatchError, DispatchResult};

/// Configuration for submission workers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers, each with its own session
    pub worker_count: usize,
    /// Attempts per task; every attempt starts over with a new workspace item
    pub max_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_delay: Duration,
    /// Jitter added to retry delays, as a fraction of the delay
    pub retry_jitter_fraction: f64,
    /// Channel buffer size for progress reporting
    pub progress_buffer_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            max_attempts: workers::DEFAULT_MAX_ATTEMPTS,
            retry_delay: workers::RETRY_DELAY,
            retry_jitter_fraction: workers::RETRY_JITTER_FRACTION,
            progress_buffer_size: workers::CHANNEL_BUFFER_SIZE,
        }
    }
}

impl WorkerConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> DispatchResult<()> {
        if self.worker_count == 0 {
            return Err(DispatchError::ConfigurationError(
                "Worker count cannot be zero".to_string(),
            ));
        }

        if self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(DispatchError::ConfigurationError(format!(
                "Worker count ({}) exceeds maximum ({})",
                self.worker_count,
                workers::MAX_WORKER_COUNT
            )));
        }

        if self.max_attempts == 0 {
            return Err(DispatchError::ConfigurationError(
                "At least one attempt per task is required".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retry_jitter_fraction) {
            return Err(DispatchError::ConfigurationError(
                "Retry jitter fraction must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.progress_buffer_size == 0 {
            return Err(DispatchError::ConfigurationError(
                "Progress buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for WorkerConfig
#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
        }
    }

    /// Set the number of workers
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Set attempts per task
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set base retry delay
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn retry_jitter_fraction(mut self, fraction: f64) -> Self {
        self.config.retry_jitter_fraction = fraction;
        self
    }

    /// Set progress buffer size
    pub fn progress_buffer_size(mut self, size: usize) -> Self {
        self.config.progress_buffer_size = size;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> DispatchResult<WorkerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> WorkerConfig {
        self.config
    }
}

/// Configuration presets for the two batch modes
pub struct ConfigPresets;

impl ConfigPresets {
    /// Item-folder uploads: wide pool, one attempt per item
    pub fn bulk_upload() -> WorkerConfig {
        WorkerConfig::default()
    }

    /// Loose-file ingest: small pool, restarts with growing delay
    pub fn ingest() -> WorkerConfig {
        WorkerConfig {
            worker_count: workers::INGEST_WORKER_COUNT,
            max_attempts: workers::INGEST_MAX_ATTEMPTS,
            ..Default::default()
        }
    }

    /// Testing configuration with near-zero delays
    pub fn testing() -> WorkerConfig {
        WorkerConfig {
            worker_count: 2,
            max_attempts: 1,
            retry_delay: Duration::from_millis(5),
            retry_jitter_fraction: 0.0,
            progress_buffer_size: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.progress_buffer_size, workers::CHANNEL_BUFFER_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = WorkerConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.worker_count = workers::MAX_WORKER_COUNT + 1;
        assert!(config.validate().is_err());

        config.worker_count = workers::MAX_WORKER_COUNT;
        assert!(config.validate().is_ok());

        config.max_attempts = 0;
        assert!(config.validate().is_err());

        config.max_attempts = 3;
        config.retry_jitter_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = WorkerConfigBuilder::new()
            .worker_count(12)
            .max_attempts(3)
            .retry_delay(Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(config.worker_count, 12);
        assert_eq!(config.max_attempts, 3);

        assert!(WorkerConfigBuilder::new().worker_count(0).build().is_err());
        assert_eq!(
            WorkerConfigBuilder::new()
                .worker_count(0)
                .build_unchecked()
                .worker_count,
            0
        );
    }

    #[test]
    fn test_presets_are_valid() {
        for config in [
            ConfigPresets::bulk_upload(),
            ConfigPresets::ingest(),
            ConfigPresets::testing(),
        ] {
            assert!(config.validate().is_ok());
        }
        assert_eq!(ConfigPresets::ingest().max_attempts, 3);
        assert_eq!(ConfigPresets::ingest().worker_count, 2);
    }
}
