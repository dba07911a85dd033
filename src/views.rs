//! Text views rendered with askama templates from `templates/`.

use crate::api::{RefreshOutcome, TaskTestOutcome};
use crate::cron::describe;
use crate::error::Result;
use crate::forms::MailForm;
use crate::models::{DataRow, LogStatus, Task, TaskId, TaskLogEntry};
use crate::utils::format_run_time;
use askama::Template;

/// Recipients shown in full before the list is summarised
const MAX_LISTED_RECIPIENTS: usize = 2;

pub struct TaskRow {
    pub id: TaskId,
    pub schedule: String,
    pub recipients: String,
    pub status_filter: String,
    pub premium_min: String,
    pub state: &'static str,
}

impl TaskRow {
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        let (status_filter, premium_min) = match task.parsed_conditions() {
            Ok(conditions) => (
                conditions.status_filter.label().to_string(),
                conditions.premium_min.to_string(),
            ),
            Err(e) => {
                tracing::error!("Task {} has unreadable conditions: {e}", task.id);
                ("unknown".to_string(), "?".to_string())
            }
        };

        Self {
            id: task.id,
            schedule: describe(&task.cron_expression),
            recipients: summarize_recipients(&task.recipient_list(), &task.recipients),
            status_filter,
            premium_min,
            state: if task.is_active { "running" } else { "stopped" },
        }
    }
}

fn summarize_recipients(list: &[String], raw: &str) -> String {
    match list.first() {
        Some(first) if list.len() > MAX_LISTED_RECIPIENTS => {
            format!("{first} and {} recipients in total", list.len())
        }
        _ => raw.to_string(),
    }
}

#[derive(Template)]
#[template(path = "task_list.txt")]
pub struct TaskListView {
    pub rows: Vec<TaskRow>,
}

impl TaskListView {
    #[must_use]
    pub fn new(tasks: &[Task]) -> Self {
        Self {
            rows: tasks.iter().map(TaskRow::from_task).collect(),
        }
    }
}

pub struct LogRow {
    pub run_time: String,
    pub status: &'static str,
    pub filtered_count: u64,
}

#[derive(Template)]
#[template(path = "task_logs.txt")]
pub struct TaskLogView {
    pub task_id: TaskId,
    pub entries: Vec<LogRow>,
}

impl TaskLogView {
    #[must_use]
    pub fn new(task_id: TaskId, logs: &[TaskLogEntry]) -> Self {
        Self {
            task_id,
            entries: logs
                .iter()
                .map(|log| LogRow {
                    run_time: format_run_time(&log.run_time),
                    status: match log.status {
                        LogStatus::Executed => "succeeded",
                        LogStatus::Failed => "failed   ",
                    },
                    filtered_count: log.filtered_count,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "task_test_result.txt")]
pub struct TaskTestResultView {
    pub recipients: Vec<String>,
    pub filtered_count: u64,
}

impl TaskTestResultView {
    #[must_use]
    pub fn new(recipients: Vec<String>, outcome: &TaskTestOutcome) -> Self {
        Self {
            recipients,
            filtered_count: outcome.filtered_count,
        }
    }
}

pub struct DataRowView<'a> {
    pub origin: &'a str,
    pub code: &'a str,
    pub name: &'a str,
    pub premium_rate: &'a str,
    pub subscription_status: &'a str,
    pub badge: &'static str,
}

/// Badge for a subscription status as the server words it
#[must_use]
pub fn subscription_badge(status: &str) -> &'static str {
    match status {
        "开放申购" => "open",
        "限量申购" => "limited",
        "暂停申购" => "suspended",
        _ => "other",
    }
}

#[derive(Template)]
#[template(path = "data_table.txt")]
pub struct DataTableView<'a> {
    pub rows: Vec<DataRowView<'a>>,
}

impl<'a> DataTableView<'a> {
    #[must_use]
    pub fn new(rows: &'a [DataRow]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| DataRowView {
                    origin: &row.origin,
                    code: &row.code,
                    name: &row.name,
                    premium_rate: &row.premium_rate,
                    subscription_status: &row.subscription_status,
                    badge: subscription_badge(&row.subscription_status),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "mail_config.txt")]
pub struct MailConfigView<'a> {
    pub smtp_server: &'a str,
    pub smtp_port: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub use_ssl: &'static str,
}

impl<'a> MailConfigView<'a> {
    #[must_use]
    pub fn new(form: &'a MailForm) -> Self {
        Self {
            smtp_server: &form.smtp_server,
            smtp_port: &form.smtp_port,
            username: &form.username,
            password: if form.password.is_empty() {
                "(not set)"
            } else {
                form.password.as_str()
            },
            use_ssl: if form.use_ssl { "yes" } else { "no" },
        }
    }
}

#[derive(Template)]
#[template(path = "mail_test_result.txt")]
pub struct MailTestResultView<'a> {
    pub recipient: &'a str,
}

#[derive(Template)]
#[template(path = "refresh_status.txt")]
pub struct RefreshStatusView<'a> {
    pub headline: &'a str,
    pub lines: Vec<&'a str>,
}

#[derive(Template)]
#[template(path = "refresh_summary.txt")]
pub struct RefreshSummaryView<'a> {
    pub message: &'a str,
    pub timestamp: &'a str,
    pub output: &'a str,
}

impl<'a> RefreshSummaryView<'a> {
    #[must_use]
    pub fn new(outcome: &'a RefreshOutcome) -> Self {
        Self {
            message: outcome.message.as_deref().unwrap_or("Data refreshed"),
            timestamp: outcome.timestamp.as_deref().unwrap_or("-"),
            output: outcome
                .output
                .as_deref()
                .filter(|output| !output.trim().is_empty())
                .unwrap_or("No detailed output"),
        }
    }
}

/// Render any view, mapping template errors into the crate error.
///
/// # Errors
///
/// Returns an error if the template fails to render
pub fn render<T: Template>(view: &T) -> Result<String> {
    Ok(view.render()?)
}
