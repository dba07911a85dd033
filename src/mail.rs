//! SMTP settings: show, save and send a test email.

use crate::api::ApiClient;
use crate::error::{ConsoleError, Result};
use crate::forms::{is_valid_email, MailForm};
use crate::notify::{report_failure, Notifier, Severity, Toast};
use crate::views::{render, MailConfigView, MailTestResultView};
use tracing::info;

/// Load the stored settings into a form, password masked.
///
/// # Errors
///
/// Returns an error if the settings cannot be loaded
pub async fn load(api: &ApiClient, notifier: &dyn Notifier) -> Result<MailForm> {
    match api.load_mail_config().await {
        Ok(config) => Ok(MailForm::from_config(&config)),
        Err(e) => {
            report_failure(notifier, "Failed to load mail settings", &e);
            Err(e)
        }
    }
}

/// Render a mail form.
///
/// # Errors
///
/// Returns an error if the template fails to render
pub fn show(form: &MailForm) -> Result<String> {
    render(&MailConfigView::new(form))
}

/// Validate the form and save it.
///
/// # Errors
///
/// Returns the validation, cooldown or request error
pub async fn save(api: &ApiClient, notifier: &dyn Notifier, form: &MailForm) -> Result<()> {
    let result = match form.build_config() {
        Ok(config) => api.save_mail_config(&config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(message) => {
            info!("Mail settings saved for {}", form.username.trim());
            notifier.notify(Toast::new(
                "Saved",
                message.unwrap_or_else(|| "Mail settings saved".to_string()),
                Severity::Success,
            ));
            Ok(())
        }
        Err(e) => {
            report_failure(notifier, "Save failed", &e);
            Err(e)
        }
    }
}

/// Send a test email to `recipient` with the stored settings.
///
/// # Errors
///
/// Returns a validation error for a malformed address, or the cooldown or
/// request error
pub async fn send_test(api: &ApiClient, notifier: &dyn Notifier, recipient: &str) -> Result<String> {
    let recipient = recipient.trim();
    let result = if is_valid_email(recipient) {
        api.test_mail_config(recipient).await
    } else {
        Err(ConsoleError::Validation(format!(
            "Invalid recipient address: {recipient}"
        )))
    };

    match result {
        Ok(message) => {
            notifier.notify(Toast::new(
                "Sent successfully",
                message.unwrap_or_else(|| format!("Test email sent to {recipient}")),
                Severity::Success,
            ));
            render(&MailTestResultView { recipient })
        }
        Err(e) => {
            report_failure(notifier, "Test failed", &e);
            Err(e)
        }
    }
}
