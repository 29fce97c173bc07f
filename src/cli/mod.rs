//! Command-line interface components
//!
//! This module contains CLI-specific code for the DSpace Uploader application,
//! including argument parsing, progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    AuthAction, AuthArgs, BatchArgs, Cli, Commands, GlobalArgs, IngestArgs, ScanArgs, UploadArgs,
};
pub use commands::{handle_auth, handle_collections, handle_ingest, handle_scan, handle_upload};
pub use progress::{BatchProgress, ProgressConfig};
