//! Toast notifications
//!
//! Every module reports outcomes as a short toast: a title, a message and a
//! severity. The binary prints them to stderr; tests collect them in memory.

use crate::config::Theme;
use crate::error::ConsoleError;
use colored::{Color, Colorize};
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

impl Severity {
    fn icon(self) -> &'static str {
        match self {
            Severity::Success => "✔",
            Severity::Info => "ℹ",
            Severity::Warning => "⚠",
            Severity::Danger => "✖",
        }
    }

    fn color(self, theme: Theme) -> Color {
        match (self, theme) {
            (Severity::Success, Theme::Dark) => Color::BrightGreen,
            (Severity::Success, _) => Color::Green,
            (Severity::Info, Theme::Dark) => Color::BrightCyan,
            (Severity::Info, _) => Color::Blue,
            (Severity::Warning, Theme::Dark) => Color::BrightYellow,
            (Severity::Warning, _) => Color::Yellow,
            (Severity::Danger, Theme::Dark) => Color::BrightRed,
            (Severity::Danger, _) => Color::Red,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Toast {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Sink for toasts. Implementations must be cheap and never block.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Log a failed operation and toast it, unless the HTTP client already did.
pub fn report_failure(notifier: &dyn Notifier, title: &str, err: &ConsoleError) {
    tracing::warn!("{title}: {err}");
    if !err.surfaced_by_client() {
        notifier.notify(Toast::new(title, err.user_message(), err.severity()));
    }
}

/// Prints toasts on stderr using the theme palette.
pub struct TerminalNotifier {
    theme: RwLock<Theme>,
}

impl TerminalNotifier {
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            theme: RwLock::new(theme),
        }
    }

    /// Switch the palette used for later toasts.
    pub fn set_theme(&self, theme: Theme) {
        match self.theme.write() {
            Ok(mut guard) => *guard = theme,
            Err(e) => tracing::error!("Failed to acquire theme lock: {e}"),
        }
    }

    fn theme(&self) -> Theme {
        self.theme.read().map_or(Theme::Light, |guard| *guard)
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, toast: Toast) {
        let color = toast.severity.color(self.theme());
        let header = format!("{} {}", toast.severity.icon(), toast.title)
            .color(color)
            .bold();
        eprintln!("{header}  {}", toast.message);
    }
}

/// Keeps every toast, for tests and for embedding the library in another UI.
#[derive(Default)]
pub struct MemoryNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every toast received so far.
    #[must_use]
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, toast: Toast) {
        match self.toasts.lock() {
            Ok(mut guard) => guard.push(toast),
            Err(e) => tracing::error!("Failed to acquire toast lock: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_keeps_order() {
        let notifier = MemoryNotifier::new();
        notifier.notify(Toast::new("Saved", "Task saved", Severity::Success));
        notifier.notify(Toast::new("Form error", "Pick a day", Severity::Warning));

        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].title, "Saved");
        assert_eq!(toasts[1].severity, Severity::Warning);
    }

    #[test]
    fn test_report_failure_skips_errors_the_client_reported() {
        let notifier = MemoryNotifier::new();
        report_failure(
            &notifier,
            "Save failed",
            &ConsoleError::Http {
                status: 500,
                message: "Failed to save task".to_string(),
            },
        );
        assert!(notifier.toasts().is_empty());

        report_failure(
            &notifier,
            "Save failed",
            &ConsoleError::Validation("Please select at least one day".to_string()),
        );
        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "Please select at least one day");
        assert_eq!(toasts[0].severity, Severity::Warning);
    }

    #[test]
    fn test_dark_palette_differs_from_light() {
        assert_ne!(
            Severity::Danger.color(Theme::Dark),
            Severity::Danger.color(Theme::Light)
        );
    }
}
