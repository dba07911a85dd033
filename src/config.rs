use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "qdii-console.json5";

/// Address of the dashboard server when none is configured
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8866";

/// Per-request timeout when none is configured
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Console configuration structure
///
/// Contains everything the console needs to reach the server and present results
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Base URL of the dashboard server
    pub server_url: String,
    /// Timeout applied to every ordinary request, in seconds
    pub request_timeout_secs: u64,
    /// Colour scheme preference for notifications
    pub theme: ThemePreference,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            theme: ThemePreference::System,
        }
    }
}

impl Config {
    /// Load the configuration from a JSON5 file.
    ///
    /// A missing file yields the defaults. Keys absent from the file are filled
    /// in from the defaults as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not a JSON5
    /// object, or holds values of the wrong type
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading console configuration from {}", path.display());

        if !path.exists() {
            tracing::info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)?;
        let mut value: serde_json::Value = json5::from_str(&config_str)?;

        let Some(obj) = value.as_object_mut() else {
            return Err(ConsoleError::Generic("Config is not an object".to_string()));
        };

        let defaults = serde_json::to_value(Self::default())?;
        if let Some(default_obj) = defaults.as_object() {
            for (key, default_value) in default_obj {
                if !obj.contains_key(key) {
                    obj.insert(key.clone(), default_value.clone());
                }
            }
        }

        let config: Config = serde_json::from_value(value)?;

        tracing::info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Write the configuration back as JSON5.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json = json5::to_string(self)
            .map_err(|e| ConsoleError::Generic(format!("Failed to serialize config: {e}")))?;
        fs::write(path, config_json)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Theme preference stored in the config file
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    /// Follow the terminal's background
    #[default]
    System,
}

impl ThemePreference {
    /// Resolve the preference against the terminal.
    ///
    /// `System` inspects `COLORFGBG` (`"fg;bg"`); a background colour of 0-6 or
    /// 8 is a dark terminal. Anything else resolves to light.
    #[must_use]
    pub fn resolve(self) -> Theme {
        match self {
            ThemePreference::Light => Theme::Light,
            ThemePreference::Dark => Theme::Dark,
            ThemePreference::System => {
                let colorfgbg = std::env::var("COLORFGBG").ok();
                theme_from_colorfgbg(colorfgbg.as_deref())
            }
        }
    }
}

impl std::str::FromStr for ThemePreference {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "system" => Ok(ThemePreference::System),
            other => Err(ConsoleError::Validation(format!(
                "Unknown theme '{other}', expected light, dark or system"
            ))),
        }
    }
}

impl std::fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemePreference::Light => f.write_str("light"),
            ThemePreference::Dark => f.write_str("dark"),
            ThemePreference::System => f.write_str("system"),
        }
    }
}

/// Resolved colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

fn theme_from_colorfgbg(value: Option<&str>) -> Theme {
    let background = value
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());

    match background {
        Some(0..=6 | 8) => Theme::Dark,
        _ => Theme::Light,
    }
}
