//! Application constants for DSpace Uploader
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for configuration and authentication
pub mod env {
    /// DSpace server root (without `/server/api`)
    pub const DSPACE_URL: &str = "DSPACE_URL";

    /// Environment variable name for the DSpace login email
    pub const EMAIL: &str = "DSPACE_EMAIL";

    /// Environment variable name for the DSpace password
    pub const PASSWORD: &str = "DSPACE_PASSWORD";

    /// Default owning collection for new workspace items
    pub const COLLECTION_UUID: &str = "COLLECTION_UUID";

    /// Holding area for items that failed submission
    pub const ERROR_DIR: &str = "DSPACE_ERROR_DIR";

    /// Destination for successfully submitted ingest files
    pub const ARCHIVE_DIR: &str = "DSPACE_ARCHIVE_DIR";
}

/// Authentication and credential-related constants
pub mod auth {
    /// Minimum allowed email length
    pub const MIN_EMAIL_LENGTH: usize = 3;

    /// Maximum allowed email length
    pub const MAX_EMAIL_LENGTH: usize = 254;

    /// File permissions for .env file (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const ENV_FILE_PERMISSIONS: u32 = 0o600;

    /// Response headers that may carry a CSRF token, in priority order
    pub const CSRF_HEADERS: [&str; 3] = ["DSPACE-XSRF-TOKEN", "XSRF-TOKEN", "X-XSRF-TOKEN"];

    /// Cookies that may carry a CSRF token, in priority order
    pub const CSRF_COOKIES: [&str; 3] = ["DSPACE-XSRF-COOKIE", "DSPACE-XSRF-TOKEN", "XSRF-TOKEN"];

    /// JSON body keys that may carry a CSRF token, in priority order
    pub const CSRF_BODY_KEYS: [&str; 3] = ["token", "csrfToken", "xsrfToken"];

    /// Request headers the current CSRF token is sent in
    pub const CSRF_REQUEST_HEADERS: [&str; 2] = ["X-XSRF-TOKEN", "DSPACE-XSRF-TOKEN"];
}

/// DSpace REST endpoints, relative to `{DSPACE_URL}/server/api`
pub mod dspace {
    /// Default DSpace server root
    pub const DEFAULT_URL: &str = "http://localhost:8080";

    /// Path from server root to the REST API
    pub const API_PATH: &str = "/server/api";

    /// CSRF token endpoint
    pub const CSRF_ENDPOINT: &str = "security/csrf";

    /// Login endpoint (form-encoded credentials)
    pub const LOGIN_ENDPOINT: &str = "authn/login";

    /// Collections listing, also used as a connectivity probe
    pub const COLLECTIONS_ENDPOINT: &str = "core/collections";

    /// Workspace item collection
    pub const WORKSPACE_ITEMS_ENDPOINT: &str = "submission/workspaceitems";

    /// Workflow item collection
    pub const WORKFLOW_ITEMS_ENDPOINT: &str = "workflow/workflowitems";

    /// Submission section that receives metadata patches
    pub const METADATA_SECTION: &str = "traditionalpageone";

    /// JSON-Patch path of the license grant flag
    pub const LICENSE_GRANTED_PATH: &str = "/sections/license/granted";

    /// Page size requested when listing collections
    pub const COLLECTION_PAGE_SIZE: u32 = 100;
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("DSpace-Uploader/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host kept by one session
    pub const POOL_MAX_PER_HOST: usize = 4;

    /// Content type of JSON-Patch bodies
    pub const JSON_PATCH: &str = "application/json-patch+json";

    /// Content type of the workflow hand-off body
    pub const URI_LIST: &str = "text/uri-list";

    /// Fallback content type for bitstreams
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit per session (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;

    /// Maximum characters of a response body kept in error messages
    pub const ERROR_BODY_PREVIEW: usize = 500;
}

/// File-based input layout
pub mod files {
    /// Metadata file expected in every item folder
    pub const METADATA_FILE_NAME: &str = "metadata.xml";

    /// Extension of content files picked up from item folders
    pub const CONTENT_EXTENSION: &str = "pdf";

    /// Suffix of generated Dublin Core sidecars for loose ingest files
    pub const DUBLIN_CORE_SUFFIX: &str = "_dublin_core.xml";

    /// Prefix of per-item archive folders
    pub const ARCHIVE_ITEM_PREFIX: &str = "item_";

    /// Date format of error holding sub-folders
    pub const ERROR_DATE_FORMAT: &str = "%Y%m%d";
}

/// Worker and concurrency configuration
pub mod workers {
    use super::Duration;

    /// Default number of submission workers
    pub const DEFAULT_WORKER_COUNT: usize = 8;

    /// Maximum concurrent workers (each holds its own session)
    pub const MAX_WORKER_COUNT: usize = 50;

    /// Channel buffer size for worker progress reports
    pub const CHANNEL_BUFFER_SIZE: usize = 100;

    /// Default attempts per task for bulk uploads
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

    /// Default attempts per file for ingest runs
    pub const INGEST_MAX_ATTEMPTS: u32 = 3;

    /// Base delay between restart attempts (multiplied by the attempt number)
    pub const RETRY_DELAY: Duration = Duration::from_secs(5);

    /// Jitter added to retry delays, as a fraction of the delay
    pub const RETRY_JITTER_FRACTION: f64 = 0.1;

    /// Default workers for ingest runs
    pub const INGEST_WORKER_COUNT: usize = 2;
}

/// Progress reporting
pub mod progress {
    /// Print a textual progress line every this many finished tasks
    pub const REPORT_EVERY: usize = 10;

    /// Spinner refresh interval (milliseconds)
    pub const TICK_MS: u64 = 120;
}

// Re-export commonly used constants for convenience
pub use env::{EMAIL as ENV_EMAIL, PASSWORD as ENV_PASSWORD};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use workers::DEFAULT_WORKER_COUNT;
