//! DSpace Uploader CLI application
//!
//! Command-line interface for bulk submission of items into a DSpace repository.

use std::process;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use dspace_uploader::cli::{
    handle_auth, handle_collections, handle_ingest, handle_scan, handle_upload, Cli, Commands,
};
use dspace_uploader::config::AppConfig;
use dspace_uploader::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("DSpace Uploader v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.global.config.is_none() {
        if let Err(e) = AppConfig::initialize_first_run().await {
            warn!("Could not create default configuration file: {}", e);
        }
    }
    let config = AppConfig::load(cli.global.config.clone()).await?;
    let quiet = cli.global.quiet;

    match cli.command {
        Commands::Upload(args) => {
            info!("Executing upload command");
            handle_upload(args, config, quiet).await
        }
        Commands::Ingest(args) => {
            info!("Executing ingest command");
            handle_ingest(args, config, quiet).await
        }
        Commands::Scan(args) => handle_scan(args).await,
        Commands::Collections => handle_collections(config).await,
        Commands::Auth(args) => {
            info!("Executing auth command");
            handle_auth(args, config).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("dspace_uploader={}", log_level).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
