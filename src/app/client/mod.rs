//! DSpace REST client
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and API root resolution
//! - `tokens`: CSRF/bearer token extraction and rotation
//! - `http`: rate-limited request execution that feeds every response to the token store
//! - `session`: CSRF acquisition, login, re-login and collection listing
//! - `submission`: the five-step workspace item workflow

pub mod config;
pub mod http;
pub mod session;
pub mod submission;
pub mod tokens;

pub use config::ClientConfig;
pub use http::ApiResponse;
pub use session::DspaceSession;
pub use submission::SubmissionDriver;
pub use tokens::TokenStore;
