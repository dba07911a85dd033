//! # QDII Console Entry Point
//!
//! Runs one command against the dashboard server, or an interactive shell.
//!
//! ## Example Usage
//!
//! ```bash
//! # List scheduled tasks on the default server
//! cargo run -- tasks list
//!
//! # Create a task running Mondays, Wednesdays and Fridays at 14:30
//! cargo run -- tasks create --time 14:30 --days 1,3,5 --recipients ops@example.com
//!
//! # Refresh the table against another server
//! cargo run -- --server http://10.0.0.2:8866 data refresh --premium-min 3
//!
//! # Interactive shell
//! cargo run -- shell
//! ```
//!
//! Log levels can be controlled through the `RUST_LOG` environment variable.

use clap::Parser;
use qdii_console::cli::{Cli, Command};
use qdii_console::config::{Config, CONFIG_FILE};
use qdii_console::error::ConsoleError;
use qdii_console::shell::Console;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main entry point for the QDII console
///
/// This function:
/// 1. Initializes the tracing subscriber, logging to stderr
/// 2. Parses the command line and loads the configuration file
/// 3. Runs the command, or the interactive shell, until it finishes or Ctrl-C
///
/// The process exits with a non-zero status when the command failed.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ConsoleError> {
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut config = Config::load(&config_path)?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    tracing::debug!("Using server {}", config.server_url);

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            shutdown.cancel();
        }
    });

    let mut console = Console::new(config, config_path, cancel_token.clone())?;
    let result = match cli.command {
        Command::Shell => console.run_interactive().await,
        command => {
            let output = tokio::select! {
                () = cancel_token.cancelled() => {
                    return Err(ConsoleError::Generic("Interrupted".to_string()));
                }
                output = console.dispatch(command) => output?,
            };
            if !output.is_empty() {
                println!("{}", output.trim_end());
            }
            Ok(())
        }
    };

    cancel_token.cancel();
    result
}
