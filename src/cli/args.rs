//! Command-line argument parsing for DSpace Uploader
//!
//! This module defines the CLI structure using clap derive macros: bulk
//! uploads of item folders, ingest of loose PDF files, folder scans,
//! collection listing and credential management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// DSpace Uploader - submit items into a DSpace repository
#[derive(Parser, Debug)]
#[command(
    name = "dspace_uploader",
    version,
    about = "Submit items into a DSpace repository through its REST API",
    long_about = "Creates workspace items, attaches Dublin Core metadata and a file, accepts the
deposit license and hands each item to the review workflow. Many items are processed
concurrently, each worker with its own authenticated session."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit every item folder (metadata.xml + PDF) under a directory
    Upload(UploadArgs),

    /// Submit loose PDF files, generating Dublin Core sidecars as needed
    Ingest(IngestArgs),

    /// Count item folders and how many are ready to upload
    Scan(ScanArgs),

    /// List collections on the server
    Collections,

    /// Manage authentication credentials
    Auth(AuthArgs),
}

/// Options shared by the two batch commands
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Owning collection UUID (overrides COLLECTION_UUID and the config file)
    #[arg(short, long, value_name = "UUID")]
    pub collection: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Attempts per item; each attempt starts with a new workspace item
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Move failed items here, under a dated sub-folder
    #[arg(long, value_name = "DIR")]
    pub error_dir: Option<PathBuf>,

    /// Move submitted items here
    #[arg(long, value_name = "DIR")]
    pub archive_dir: Option<PathBuf>,
}

/// Arguments for the upload command
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Directory containing one sub-folder per item
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// List the items that would be submitted without contacting the server
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the ingest command
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Directory containing loose PDF files
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Submit files again even if they were ingested before
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the scan command
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Directory containing one sub-folder per item
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,
}

/// Arguments for authentication management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Authentication actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Set up DSpace credentials
    Setup,

    /// Verify current credentials by logging in
    Verify,

    /// Show authentication status
    Status,

    /// Clear stored credentials
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl BatchArgs {
    /// Reject values clap accepts but the dispatcher cannot use
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        if self.attempts == Some(0) {
            return Err("Number of attempts must be greater than 0".to_string());
        }
        if matches!(self.collection.as_deref(), Some(uuid) if uuid.trim().is_empty()) {
            return Err("Collection UUID cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_upload_args() {
        let cli = parse(&[
            "dspace_uploader",
            "upload",
            "./items",
            "--collection",
            "c0ffee",
            "-w",
            "4",
            "--error-dir",
            "./error",
            "--dry-run",
        ]);

        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.dir, PathBuf::from("./items"));
                assert_eq!(args.batch.collection.as_deref(), Some("c0ffee"));
                assert_eq!(args.batch.workers, Some(4));
                assert_eq!(args.batch.error_dir, Some(PathBuf::from("./error")));
                assert!(args.batch.archive_dir.is_none());
                assert!(args.dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_and_auth_args() {
        let cli = parse(&["dspace_uploader", "-v", "ingest", "./incoming", "--force"]);
        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Commands::Ingest(IngestArgs { force: true, .. })));

        let cli = parse(&["dspace_uploader", "auth", "clear"]);
        assert!(matches!(
            cli.command,
            Commands::Auth(AuthArgs {
                action: AuthAction::Clear
            })
        ));

        assert!(Cli::try_parse_from(["dspace_uploader", "upload"]).is_err());
    }

    #[test]
    fn test_batch_args_validation() {
        let mut args = BatchArgs::default();
        assert!(args.validate().is_ok());

        args.workers = Some(0);
        assert!(args.validate().is_err());

        args.workers = Some(2);
        args.attempts = Some(0);
        assert!(args.validate().is_err());

        args.attempts = None;
        args.collection = Some("  ".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let cli_quiet = Cli {
            global: GlobalArgs {
                verbose: false,
                very_verbose: false,
                quiet: true,
                config: None,
            },
            command: Commands::Collections,
        };

        let cli_verbose = Cli {
            global: GlobalArgs {
                verbose: true,
                very_verbose: false,
                quiet: false,
                config: None,
            },
            command: Commands::Collections,
        };

        assert_eq!(cli_quiet.log_level(), tracing::Level::ERROR);
        assert_eq!(cli_verbose.log_level(), tracing::Level::INFO);
        assert_eq!(
            parse(&["dspace_uploader", "--very-verbose", "collections"]).log_level(),
            tracing::Level::DEBUG
        );
    }
}
