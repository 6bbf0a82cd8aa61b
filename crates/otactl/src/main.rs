//! otactl - badge OTA update runner
//!
//! Runs the badge update flow on a development host: releases are resolved
//! against the real endpoints and images are downloaded into a slot
//! directory instead of a flash partition.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod config;
mod error;
mod flasher;
mod host;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::RunOptions;
use crate::config::Overrides;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "otactl")]
#[command(about = "Badge OTA update runner")]
#[command(version)]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// YAML configuration file
    #[arg(long, global = true, env = "OTACTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct EndpointArgs {
    /// Override the redirecting "latest" image URL
    #[arg(long, global = true, hide = true)]
    latest_url: Option<String>,

    /// Override the release metadata URL
    #[arg(long, global = true, hide = true)]
    metadata_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update session
    Run {
        /// Directory standing in for the update partition
        #[arg(long)]
        slot_dir: PathBuf,

        /// Version of the firmware being replaced
        #[arg(long, default_value = "HEAD-HASH-NOTFOUND")]
        current_version: String,

        /// Network name to report; an empty name simulates an unconfigured badge
        #[arg(long, default_value = "host")]
        network: Option<String>,

        /// Seconds the final status stays up before reset or close
        #[arg(long)]
        grace_secs: Option<u64>,

        /// Give up after this many attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Compare versions as plain strings
        #[arg(long)]
        lexical: bool,
    },

    /// Show the latest release without flashing
    Check {
        /// Running version to compare against
        #[arg(long)]
        current_version: Option<String>,

        /// Compare versions as plain strings
        #[arg(long)]
        lexical: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("otactl={log_level},badge_ota={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(cli.command, cli.config, cli.endpoints, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn execute_command(
    command: Commands,
    config_path: Option<PathBuf>,
    endpoints: EndpointArgs,
    json: bool,
) -> Result<()> {
    let mut overrides = Overrides {
        latest_url: endpoints.latest_url,
        metadata_url: endpoints.metadata_url,
        ..Overrides::default()
    };

    match command {
        Commands::Run {
            slot_dir,
            current_version,
            network,
            grace_secs,
            max_attempts,
            lexical,
        } => {
            overrides.grace_secs = grace_secs;
            overrides.max_attempts = max_attempts;
            overrides.lexical = lexical;
            let config = config::load(config_path.as_deref(), &overrides)?;
            let options = RunOptions {
                slot_dir,
                current_version,
                network: network.filter(|name| !name.is_empty()),
            };
            commands::run(config, options, json).await
        }
        Commands::Check {
            current_version,
            lexical,
        } => {
            overrides.lexical = lexical;
            let config = config::load(config_path.as_deref(), &overrides)?;
            commands::check(config, current_version, json).await
        }
    }
}
