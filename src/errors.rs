//! Error types for DSpace Uploader
//!
//! This module defines the error types for all components of the application.
//! Errors raised by a single submission stay local to that task; the bulk
//! dispatcher collects them into the batch report instead of aborting.

use std::path::PathBuf;
use thiserror::Error;

use crate::app::models::WorkspaceState;

/// Session and authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing environment variables for credentials
    #[error(
        "Missing DSpace credentials. Set DSPACE_EMAIL and DSPACE_PASSWORD environment variables or run 'auth setup'"
    )]
    MissingCredentials,

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// HTTP request failed during authentication
    #[error("HTTP request failed during authentication")]
    Http(#[from] reqwest::Error),

    /// The CSRF endpoint answered without a token in header, cookie or body
    #[error("No CSRF token found in response headers, cookies, or body")]
    NoTokenFound,

    /// Login answered with a non-200 status
    #[error("DSpace login rejected: HTTP {status} - {body}")]
    AuthRejected { status: u16, body: String },

    /// Transport-level failure reaching the server
    #[error("Cannot reach DSpace at {url}")]
    ConnectionUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Invalid email format
    #[error("Invalid email format: {reason}")]
    InvalidEmail { reason: String },

    /// Invalid server URL
    #[error("Invalid DSpace URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Server answered a session-level call in an unexpected way
    #[error("Unexpected answer from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    /// Client settings that cannot be used
    #[error("Invalid client configuration: {reason}")]
    InvalidClientConfig { reason: String },

    /// File I/O error during credential storage
    #[error("Failed to save credentials to file")]
    CredentialStorage(#[from] std::io::Error),
}

/// Errors of the five-step submission workflow
///
/// Step failures carry the HTTP status and response body of the offending call.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Workspace item could not be created
    #[error("Workspace creation failed: HTTP {status} - {body}")]
    WorkspaceCreateFailed { status: u16, body: String },

    /// Metadata patch was rejected
    #[error("Metadata patch failed: HTTP {status} - {body}")]
    MetadataPatchFailed { status: u16, body: String },

    /// Both upload endpoints failed; reports the legacy endpoint's answer
    #[error("Bitstream upload failed: HTTP {status} - {body}")]
    UploadFailed { status: u16, body: String },

    /// Upload was accepted but the workspace lists no files
    #[error("Upload not registered in workspace {workspace_id}: upload section is empty")]
    UploadNotRegistered { workspace_id: u64 },

    /// Neither add nor replace granted the license, and it is not granted
    #[error("License acceptance failed: HTTP {status} - {body}")]
    LicenseFailed { status: u16, body: String },

    /// Workflow hand-off was rejected
    #[error("Submission to workflow failed: HTTP {status} - {body}")]
    SubmitFailed { status: u16, body: String },

    /// Transport failure during a workflow step
    #[error("Transport error during {step}")]
    Transport {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// A step was attempted out of order
    #[error("Workspace {workspace_id} is {state}; cannot {step}")]
    InvalidTransition {
        workspace_id: u64,
        state: WorkspaceState,
        step: &'static str,
    },

    /// Response could not be interpreted
    #[error("Unexpected response during {step}: {reason}")]
    InvalidResponse { step: &'static str, reason: String },

    /// Session could not be (re-)established
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Metadata input could not be read
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Content file could not be read
    #[error("File I/O error")]
    Io(#[from] std::io::Error),
}

impl SubmissionError {
    /// HTTP status of the failing call, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmissionError::WorkspaceCreateFailed { status, .. }
            | SubmissionError::MetadataPatchFailed { status, .. }
            | SubmissionError::UploadFailed { status, .. }
            | SubmissionError::LicenseFailed { status, .. }
            | SubmissionError::SubmitFailed { status, .. } => Some(*status),
            SubmissionError::Auth(AuthError::AuthRejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Short step label for reports
    pub fn step(&self) -> &'static str {
        match self {
            SubmissionError::WorkspaceCreateFailed { .. } => "create",
            SubmissionError::MetadataPatchFailed { .. } => "metadata",
            SubmissionError::UploadFailed { .. } | SubmissionError::UploadNotRegistered { .. } => {
                "upload"
            }
            SubmissionError::LicenseFailed { .. } => "license",
            SubmissionError::SubmitFailed { .. } => "submit",
            SubmissionError::Transport { step, .. }
            | SubmissionError::InvalidTransition { step, .. }
            | SubmissionError::InvalidResponse { step, .. } => *step,
            SubmissionError::Auth(_) => "auth",
            SubmissionError::Metadata(_) => "metadata input",
            SubmissionError::Io(_) => "io",
        }
    }
}

/// Metadata input errors
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Metadata file not found
    #[error("Metadata file not found: {path}")]
    NotFound { path: PathBuf },

    /// I/O error reading or writing metadata
    #[error("I/O error on metadata file")]
    Io(#[from] std::io::Error),

    /// A patch without operations cannot attach metadata
    #[error("Metadata patch has no operations")]
    EmptyPatch,

    /// File parsed but contained no whitelisted field with a value
    #[error("No usable Dublin Core fields in {path}")]
    NoUsableFields { path: PathBuf },
}

/// Bulk dispatcher errors
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Invalid dispatcher configuration
    #[error("Invalid worker configuration: {0}")]
    ConfigurationError(String),

    /// Progress channel closed before all tasks reported
    #[error("Progress channel closed with {missing} task(s) unreported")]
    ChannelClosed { missing: usize },

    /// Worker panic or unexpected termination
    #[error("Worker {worker_id} panicked or terminated unexpectedly")]
    WorkerPanic { worker_id: u32 },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// I/O error reading or writing the configuration file
    #[error("Configuration file I/O error")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Submission error
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Metadata error
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Dispatcher error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is transient and worth restarting the item for
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Auth(AuthError::Http(_))
            | AppError::Auth(AuthError::ConnectionUnreachable { .. })
            | AppError::Submission(SubmissionError::Transport { .. }) => true,

            AppError::Submission(err) => matches!(err.status(), Some(s) if s >= 500),

            AppError::Auth(AuthError::AuthRejected { .. })
            | AppError::Auth(AuthError::MissingCredentials)
            | AppError::Metadata(_)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Submission(_) => "submission",
            AppError::Metadata(_) => "metadata",
            AppError::Dispatch(_) => "dispatch",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Submission result type alias
pub type SubmissionResult<T> = std::result::Result<T, SubmissionError>;

/// Metadata result type alias
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Dispatcher result type alias
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
