//! Client-side form validation.
//!
//! Forms hold raw user input. Building a request body validates it; a failure
//! is a [`ConsoleError::Validation`] and nothing reaches the network.

use crate::cron::{self, ExecutionTime, WeekdaySet};
use crate::error::{ConsoleError, Result};
use crate::models::{split_recipients, MailConfig, StatusFilter, Task, TaskConditions, TaskDraft, TaskId};
use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder shown instead of a stored SMTP password
pub const MASKED_PASSWORD: &str = "******";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern")
});

/// Whether `candidate` looks like an email address
#[must_use]
pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate)
}

/// Split a comma-separated recipient list and validate every address.
///
/// # Errors
///
/// Returns a validation error when the list is empty, or one error naming
/// every malformed address
pub fn parse_recipients(raw: &str) -> Result<Vec<String>> {
    let recipients = split_recipients(raw);
    if recipients.is_empty() {
        return Err(ConsoleError::Validation(
            "Please add at least one recipient email".to_string(),
        ));
    }

    let invalid: Vec<&str> = recipients
        .iter()
        .map(String::as_str)
        .filter(|email| !is_valid_email(email))
        .collect();
    if !invalid.is_empty() {
        return Err(ConsoleError::Validation(format!(
            "These email addresses are malformed: {}",
            invalid.join(", ")
        )));
    }

    Ok(recipients)
}

/// Parse a premium-rate threshold; it must be a non-negative number.
///
/// # Errors
///
/// Returns a validation error for anything else
pub fn parse_premium_min(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ConsoleError::Validation(
            "Please enter a valid minimum premium rate".to_string(),
        )),
    }
}

/// Input of the task create/edit form
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub execution_time: String,
    pub days: WeekdaySet,
    pub recipients: String,
    pub premium_min: String,
    pub status_filter: StatusFilter,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            execution_time: "09:00".to_string(),
            days: WeekdaySet::empty(),
            recipients: String::new(),
            premium_min: "0".to_string(),
            status_filter: StatusFilter::All,
        }
    }
}

impl TaskForm {
    /// Pre-fill the form from a stored task.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored schedule or conditions cannot be decoded
    pub fn from_task(task: &Task) -> Result<Self> {
        let (time, days) = cron::parse_schedule(&task.cron_expression)?;
        let conditions = task.parsed_conditions()?;
        Ok(Self {
            execution_time: time.to_string(),
            days,
            recipients: task.recipients.clone(),
            premium_min: conditions.premium_min.to_string(),
            status_filter: conditions.status_filter,
        })
    }

    /// State of the "every day" toggle: on exactly when all 7 days are set.
    #[must_use]
    pub fn every_day(&self) -> bool {
        self.days.is_all()
    }

    /// Set or clear every day at once.
    pub fn set_every_day(&mut self, on: bool) {
        self.days = if on {
            WeekdaySet::all()
        } else {
            WeekdaySet::empty()
        };
    }

    /// Validate the form and build the request body.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure in form order: time, days,
    /// recipients, premium threshold
    pub fn build_draft(&self, id: Option<TaskId>) -> Result<TaskDraft> {
        let time: ExecutionTime = self.execution_time.parse()?;
        let cron_expression = cron::encode(time, self.days)?;
        let recipients = parse_recipients(&self.recipients)?;
        let premium_min = parse_premium_min(&self.premium_min)?;

        let conditions = TaskConditions {
            premium_min,
            status_filter: self.status_filter,
        };

        Ok(TaskDraft {
            id,
            cron_expression,
            recipients: recipients.join(", "),
            conditions: conditions.to_json()?,
        })
    }
}

/// Input of the SMTP settings form
#[derive(Debug, Clone, PartialEq)]
pub struct MailForm {
    pub smtp_server: String,
    pub smtp_port: String,
    /// Doubles as the sender address
    pub username: String,
    /// Either the masked placeholder, empty, or a new password
    pub password: String,
    pub use_ssl: bool,
}

impl MailForm {
    /// Pre-fill from the server's config, masking any stored password.
    #[must_use]
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            smtp_server: config.smtp_server.clone(),
            smtp_port: config.smtp_port.to_string(),
            username: config.username.clone(),
            password: if config.password.is_empty() {
                String::new()
            } else {
                MASKED_PASSWORD.to_string()
            },
            use_ssl: config.use_ssl,
        }
    }

    /// Validate and build the body for `POST /api/mail/config`.
    ///
    /// An untouched masked password, or an empty one, is sent as an empty
    /// string so the server keeps the stored secret.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty server, a port outside
    /// 1-65535 or a malformed username
    pub fn build_config(&self) -> Result<MailConfig> {
        let smtp_server = self.smtp_server.trim();
        if smtp_server.is_empty() {
            return Err(ConsoleError::Validation(
                "SMTP server cannot be empty".to_string(),
            ));
        }

        let smtp_port = match self.smtp_port.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                return Err(ConsoleError::Validation(format!(
                    "Invalid SMTP port: {}",
                    self.smtp_port
                )))
            }
        };

        let username = self.username.trim();
        if !is_valid_email(username) {
            return Err(ConsoleError::Validation(format!(
                "Invalid email account: {username}"
            )));
        }

        let password = if self.password == MASKED_PASSWORD {
            String::new()
        } else {
            self.password.clone()
        };

        Ok(MailConfig {
            smtp_server: smtp_server.to_string(),
            smtp_port,
            username: username.to_string(),
            password,
            sender_email: username.to_string(),
            use_ssl: self.use_ssl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> TaskForm {
        TaskForm {
            execution_time: "14:30".to_string(),
            days: WeekdaySet::from_days(&[1, 3, 5]).unwrap(),
            recipients: "ops@example.com, desk@example.cn".to_string(),
            premium_min: "2.5".to_string(),
            status_filter: StatusFilter::Limited,
        }
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.cn"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@c.com"));
        assert!(!is_valid_email("a@@c.com"));
    }

    #[test]
    fn test_all_invalid_recipients_reported_together() {
        let err = parse_recipients("good@x.com, bad-one, also@bad").unwrap_err();
        assert_eq!(
            err.user_message(),
            "These email addresses are malformed: bad-one, also@bad"
        );
    }

    #[test]
    fn test_empty_recipient_list_rejected() {
        assert!(parse_recipients(" , ").is_err());
    }

    #[test]
    fn test_premium_min_must_be_non_negative_number() {
        assert!((parse_premium_min("1.25").unwrap() - 1.25).abs() < f64::EPSILON);
        assert!(parse_premium_min("0").is_ok());
        assert!(parse_premium_min("-0.5").is_err());
        assert!(parse_premium_min("abc").is_err());
        assert!(parse_premium_min("NaN").is_err());
    }

    #[test]
    fn test_build_draft() {
        let draft = filled_form().build_draft(Some(7)).unwrap();
        assert_eq!(draft.id, Some(7));
        assert_eq!(draft.cron_expression, "30 14 * * 1,3,5");
        assert_eq!(draft.recipients, "ops@example.com, desk@example.cn");

        let conditions: TaskConditions = serde_json::from_str(&draft.conditions).unwrap();
        assert_eq!(conditions.status_filter, StatusFilter::Limited);
        assert!((conditions.premium_min - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_draft_checks_in_form_order() {
        let mut form = filled_form();
        form.execution_time = String::new();
        form.days = WeekdaySet::empty();
        assert_eq!(
            form.build_draft(None).unwrap_err().user_message(),
            "Please set the execution time"
        );

        form.execution_time = "08:00".to_string();
        assert_eq!(
            form.build_draft(None).unwrap_err().user_message(),
            "Please select at least one day"
        );
    }

    #[test]
    fn test_every_day_toggle_tracks_days() {
        let mut form = TaskForm::default();
        assert!(!form.every_day());
        form.set_every_day(true);
        assert!(form.every_day());
        form.days.toggle(0);
        assert!(!form.every_day());
        form.days.toggle(0);
        assert!(form.every_day());
    }

    #[test]
    fn test_form_from_task_round_trips() {
        let draft = filled_form().build_draft(Some(4)).unwrap();
        let task = Task {
            id: 4,
            cron_expression: draft.cron_expression.clone(),
            recipients: draft.recipients.clone(),
            conditions: draft.conditions.clone(),
            is_active: true,
        };

        let form = TaskForm::from_task(&task).unwrap();
        assert_eq!(form.execution_time, "14:30");
        assert_eq!(form.build_draft(Some(4)).unwrap(), draft);
    }

    #[test]
    fn test_masked_password_sent_as_unchanged() {
        let stored = MailConfig {
            smtp_server: "smtp.qq.com".to_string(),
            smtp_port: 465,
            username: "me@qq.com".to_string(),
            password: "secret".to_string(),
            sender_email: "me@qq.com".to_string(),
            use_ssl: true,
        };

        let form = MailForm::from_config(&stored);
        assert_eq!(form.password, MASKED_PASSWORD);

        let body = form.build_config().unwrap();
        assert_eq!(body.password, "");
        assert_eq!(body.sender_email, "me@qq.com");

        let mut changed = form.clone();
        changed.password = "new-secret".to_string();
        assert_eq!(changed.build_config().unwrap().password, "new-secret");
    }

    #[test]
    fn test_mail_form_rejects_bad_port() {
        let mut form = MailForm::from_config(&MailConfig::default());
        form.smtp_server = "smtp.example.com".to_string();
        form.username = "me@example.com".to_string();
        form.smtp_port = "0".to_string();
        assert!(form.build_config().is_err());
        form.smtp_port = "70000".to_string();
        assert!(form.build_config().is_err());
        form.smtp_port = "587".to_string();
        assert_eq!(form.build_config().unwrap().smtp_port, 587);
    }
}
