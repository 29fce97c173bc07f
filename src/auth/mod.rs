//! Authentication management for DSpace credentials
//!
//! This module provides functions for managing the DSpace login used by the
//! uploader, including interactive setup, verification against the server,
//! and storage in .env files.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dspace_uploader::app::ClientConfig;
//! use dspace_uploader::auth::{check_credentials, setup_credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! if !check_credentials() {
//!     println!("Setting up credentials...");
//!     setup_credentials(&ClientConfig::default()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod credentials;

// Re-export main public API
pub use credentials::{
    check_credentials, clear_credentials, get_auth_status, is_valid_email, prompt_credentials,
    save_credentials, setup_credentials, show_auth_status, verify_credentials, AuthStatus,
    Credentials,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let status = get_auth_status();
        assert_eq!(status.has_credentials(), status.email_set && status.password_set);
        assert!(is_valid_email("a@b.c"));
    }
}
