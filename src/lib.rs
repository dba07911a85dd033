//! # QDII Console Library
//!
//! This library provides the client side of the QDII premium-rate monitoring
//! dashboard: a terminal console that talks to the dashboard server, manages
//! scheduled notification tasks, edits the SMTP settings and refreshes the
//! premium-rate table while following the server's progress stream.
//!
//! ## Overview
//!
//! - `api`: HTTP client with one method per server endpoint and per-action cooldowns
//! - `cron`: Encodes and describes the weekly schedules tasks run on
//! - `tasks`: Task edit session state machine and task list actions
//! - `refresh`: Refresh trigger, event-stream decoding and the silence watchdog
//! - `data`: Data table filters
//! - `mail`: SMTP settings
//! - `shell`: The console that dispatches commands, one-shot or interactive
//!
//! ## Getting Started
//!
//! ```no_run
//! use qdii_console::{config::{Config, CONFIG_FILE}, shell::Console};
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qdii_console::error::ConsoleError> {
//!     let config_path = PathBuf::from(CONFIG_FILE);
//!     let config = Config::load(&config_path)?;
//!     let mut console = Console::new(config, config_path, CancellationToken::new())?;
//!     console.run_interactive().await
//! }
//! ```
//!
//! ## Architecture
//!
//! Every outcome is reported as a toast through a [`notify::Notifier`]. The
//! HTTP client reports transport and HTTP failures itself; the feature modules
//! report validation, cooldown and server-side failures. Rendered output is
//! produced by askama templates in [`views`].

/// Custom error types module
///
/// Defines the `ConsoleError` enum shared by every module, with the toast
/// severity each failure maps to.
pub mod error;

/// Configuration management module
///
/// Loads and saves the JSON5 configuration file: server address, request
/// timeout and theme preference.
pub mod config;

/// Per-action cooldown windows
pub mod cooldown;

/// Wire types exchanged with the dashboard server
pub mod models;

/// Cron expression codec
///
/// Builds `minute hour * * days` expressions from the task form and renders
/// stored expressions as readable labels such as "every Mon、Wed、Fri 14:30".
pub mod cron;

/// Form input and client-side validation
pub mod forms;

/// Toast notifications and the sinks that display them
pub mod notify;

/// HTTP client module
///
/// Wraps every dashboard endpoint. Mutating calls are gated by cooldowns and
/// fail without a request while their window is open.
pub mod api;

/// Text views rendered from templates
pub mod views;

/// Mail settings module
pub mod mail;

/// Data table filters and refresh requests
pub mod data;

/// Refresh progress module
///
/// Follows the `/refresh-status` event stream with a watchdog and drives the
/// refresh trigger through its running and cooling-down states.
pub mod refresh;

/// Scheduled task module
///
/// The single edit session and the list actions: start, stop, logs and delete.
pub mod tasks;

/// Command-line grammar
pub mod cli;

/// Console dispatching commands against one long-lived client
pub mod shell;

/// Utility functions module
///
/// Timestamp formatting for task logs and refresh summaries.
pub mod utils;
