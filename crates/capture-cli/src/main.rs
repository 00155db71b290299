//! # capture CLI entry point
//!
//! Parses command-line arguments, opens the local stores, and dispatches
//! to the subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use capture_cli::payload::{run_get, run_put, run_rm, run_thumbnail};
use capture_cli::record::{run_list, run_seal, run_verify};
use capture_cli::Workspace;
use capture_core::CaptureConfig;

/// Capture core toolchain.
///
/// Stores media content-addressed, derives thumbnails, and seals and
/// verifies signed provenance records.
#[derive(Parser, Debug)]
#[command(name = "capture", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Persistent data directory (overrides CAPTURE_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Cache directory (overrides CAPTURE_CACHE_DIR).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file and print its content hash.
    Put {
        file: PathBuf,
        /// MIME type recorded for the payload.
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },

    /// Read a payload by hash.
    Get {
        hash: String,
        /// Write raw bytes here instead of printing base64.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove a payload and its thumbnail.
    Rm { hash: String },

    /// Print the thumbnail of an image payload as a data URI.
    Thumbnail {
        hash: String,
        /// Write the thumbnail bytes here instead.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Assemble, sign, and persist a record for a file.
    Seal {
        file: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },

    /// Verify every signature of a record file.
    Verify { record: PathBuf },

    /// List stored records.
    List,
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<CaptureConfig> {
    let mut config = CaptureConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let open = || -> Result<Workspace> { Workspace::open(load_config(&cli)?) };
    match &cli.command {
        Commands::Put { file, mime } => run_put(&open()?, file, mime).await,
        Commands::Get { hash, out } => run_get(&open()?, hash, out.as_ref()).await,
        Commands::Rm { hash } => run_rm(&open()?, hash).await,
        Commands::Thumbnail { hash, out } => run_thumbnail(&open()?, hash, out.as_ref()).await,
        Commands::Seal { file, mime } => run_seal(&open()?, file, mime).await,
        Commands::List => run_list(&open()?).await,
        Commands::Verify { record } => run_verify(record).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("FAIL: {e:#}");
            ExitCode::from(1)
        }
    }
}
