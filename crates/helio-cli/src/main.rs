//! Helio Bridge CLI - run engine commands from the shell.
//!
//! Loads the layered configuration, sets up logging, builds an
//! [`helio_bridge::EngineBridge`] and runs one subcommand against it.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use helio_config::{Config, LoadOptions};
use helio_telemetry::LogFormat;
use tracing::debug;

mod commands;
mod config_bridge;
mod theme;

use commands::{call, list, probe};

/// Helio Bridge - invoke the external computation engine
#[derive(Parser)]
#[command(name = "helio-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file merged above every other layer
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the engine scripts
    #[arg(long, global = true)]
    engine_root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one engine command and print its result envelope
    Call {
        /// Command name (see `helio-bridge commands`)
        #[arg(value_name = "COMMAND")]
        name: String,

        /// JSON payload
        #[arg(short, long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Read the JSON payload from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// Override the command's timeout
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_ms: Option<u64>,
    },

    /// List the known engine commands
    Commands,

    /// Resolve the engine interpreter and show what was found
    Probe,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let workspace_root = std::env::current_dir().context("failed to read current directory")?;
    let options = LoadOptions {
        workspace_root: Some(workspace_root.clone()),
        explicit_file: cli.config.clone(),
        ..LoadOptions::default()
    };
    let cfg = Config::load_with(&options)
        .context("failed to load configuration")?
        .config;

    let mut log_config = config_bridge::to_log_config(&cfg);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format);
    }
    if let Err(e) = helio_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let root = config_bridge::engine_root(&cfg, cli.engine_root.as_deref(), &workspace_root);
    let bridge = config_bridge::to_bridge(&cfg, &root)?;
    debug!(
        engine_root = %root.display(),
        scratch = %bridge.scratch().path().display(),
        "Bridge configured"
    );

    let ok = match cli.command {
        Commands::Call {
            name,
            payload,
            payload_file,
            timeout_ms,
        } => {
            let payload = call::read_payload(payload.as_deref(), payload_file.as_deref())?;
            call::run_call(&bridge, &name, payload, timeout_ms).await?
        },
        Commands::Commands => {
            list::list_commands(bridge.registry(), bridge.timeouts());
            true
        },
        Commands::Probe => probe::run_probe(&bridge).await?,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
