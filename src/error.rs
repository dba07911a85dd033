//! Custom error types for the QDII console
//!
//! This module defines the crate error type and implements the necessary traits
//! so every failure, from a cooldown rejection to a broken config file, travels
//! through the same `Result`.

use crate::cooldown::Action;
use crate::notify::Severity;
use std::fmt;

/// Main error type for the QDII console
#[derive(Debug)]
pub enum ConsoleError {
    /// The action is still cooling down; no request was sent
    CooldownActive(Action),

    /// The server answered with a non-2xx status
    Http { status: u16, message: String },

    /// The request never produced a response
    Transport(reqwest::Error),

    /// The server answered 2xx but reported `status: "error"`
    Application(String),

    /// Form input rejected before reaching the network
    Validation(String),

    /// Error occurred while reading or writing the configuration file
    ConfigRead(std::io::Error),

    /// Error occurred while parsing configuration
    ConfigParse(json5::Error),

    /// The interactive terminal could not be read or written
    Terminal(std::io::Error),

    /// A JSON payload nested inside a response could not be decoded
    Decode(serde_json::Error),

    /// A view template failed to render
    Template(askama::Error),

    /// The server base URL or an endpoint path is malformed
    InvalidUrl(url::ParseError),

    /// Generic error with a message
    Generic(String),
}

impl ConsoleError {
    /// Toast severity used when this error is shown to the user.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            ConsoleError::CooldownActive(_) | ConsoleError::Validation(_) => Severity::Warning,
            _ => Severity::Danger,
        }
    }

    /// Whether the HTTP client already reported this error through its notifier.
    #[must_use]
    pub fn surfaced_by_client(&self) -> bool {
        matches!(
            self,
            ConsoleError::Http { .. } | ConsoleError::Transport(_)
        )
    }

    /// Message without the variant prefix, suitable for a toast body.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::CooldownActive(_) => {
                "Operation too frequent, please try again later".to_string()
            }
            ConsoleError::Http { message, .. }
            | ConsoleError::Application(message)
            | ConsoleError::Validation(message)
            | ConsoleError::Generic(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::CooldownActive(action) => {
                write!(
                    f,
                    "Operation too frequent, please try again later ({action} is cooling down)"
                )
            }
            ConsoleError::Http { status, message } => {
                write!(f, "{message} (HTTP {status})")
            }
            ConsoleError::Transport(e) => {
                write!(f, "Network error: {e}")
            }
            ConsoleError::Application(msg) => {
                write!(f, "Server error: {msg}")
            }
            ConsoleError::Validation(msg) => {
                write!(f, "Invalid input: {msg}")
            }
            ConsoleError::ConfigRead(e) => {
                write!(f, "Failed to read configuration file: {e}")
            }
            ConsoleError::ConfigParse(e) => {
                write!(f, "Failed to parse configuration: {e}")
            }
            ConsoleError::Terminal(e) => {
                write!(f, "Terminal I/O failed: {e}")
            }
            ConsoleError::Decode(e) => {
                write!(f, "Failed to decode payload: {e}")
            }
            ConsoleError::Template(e) => {
                write!(f, "Failed to render view: {e}")
            }
            ConsoleError::InvalidUrl(e) => {
                write!(f, "Invalid server URL: {e}")
            }
            ConsoleError::Generic(msg) => {
                write!(f, "Error: {msg}")
            }
        }
    }
}

impl std::error::Error for ConsoleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConsoleError::Transport(e) => Some(e),
            ConsoleError::ConfigRead(e) => Some(e),
            ConsoleError::ConfigParse(e) => Some(e),
            ConsoleError::Terminal(e) => Some(e),
            ConsoleError::Decode(e) => Some(e),
            ConsoleError::Template(e) => Some(e),
            ConsoleError::InvalidUrl(e) => Some(e),
            ConsoleError::CooldownActive(_)
            | ConsoleError::Http { .. }
            | ConsoleError::Application(_)
            | ConsoleError::Validation(_)
            | ConsoleError::Generic(_) => None,
        }
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(error: reqwest::Error) -> Self {
        ConsoleError::Transport(error)
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(error: std::io::Error) -> Self {
        ConsoleError::ConfigRead(error)
    }
}

impl From<json5::Error> for ConsoleError {
    fn from(error: json5::Error) -> Self {
        ConsoleError::ConfigParse(error)
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(error: serde_json::Error) -> Self {
        ConsoleError::Decode(error)
    }
}

impl From<askama::Error> for ConsoleError {
    fn from(error: askama::Error) -> Self {
        ConsoleError::Template(error)
    }
}

impl From<url::ParseError> for ConsoleError {
    fn from(error: url::ParseError) -> Self {
        ConsoleError::InvalidUrl(error)
    }
}

impl From<&str> for ConsoleError {
    fn from(message: &str) -> Self {
        ConsoleError::Generic(message.to_string())
    }
}

impl From<String> for ConsoleError {
    fn from(message: String) -> Self {
        ConsoleError::Generic(message)
    }
}

/// Result type alias using our custom error type
pub type Result<T> = std::result::Result<T, ConsoleError>;
