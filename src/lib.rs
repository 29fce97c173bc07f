//! DSpace Uploader Library
//!
//! Submits items into a DSpace 7+ repository through its REST API: CSRF and
//! bearer session handling, the five-step workspace item workflow, Dublin Core
//! metadata mapping and a concurrent bulk dispatcher.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(DEFAULT_WORKER_COUNT, 8);
        assert_eq!(ENV_EMAIL, "DSPACE_EMAIL");
        assert!(USER_AGENT.contains("DSpace-Uploader"));
    }

    #[test]
    fn test_error_types() {
        let auth_error = errors::AuthError::NoTokenFound;
        let app_error = AppError::Auth(auth_error);

        assert_eq!(app_error.category(), "authentication");
        assert!(!app_error.is_recoverable());
    }
}
