//! Wire types exchanged with the dashboard server.

use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned task identity
pub type TaskId = i64;

/// `status` field present in every JSON response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    #[serde(other)]
    Error,
}

/// Common response shape: a status, an optional message and an action payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: ApiStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

/// Payload of responses that only carry a message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoPayload {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksPayload {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsPayload {
    #[serde(default)]
    pub logs: Vec<TaskLogEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfigPayload {
    #[serde(default)]
    pub config: MailConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskTestPayload {
    #[serde(default)]
    pub filtered_count: u64,
}

/// Subscription status a task filters data rows by
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    Limited,
    Closed,
}

impl StatusFilter {
    /// Human label shown in the task list
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all statuses",
            StatusFilter::Open => "open for subscription",
            StatusFilter::Limited => "limited subscription",
            StatusFilter::Closed => "subscription suspended",
        }
    }

    /// Value sent on the wire
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Open => "open",
            StatusFilter::Limited => "limited",
            StatusFilter::Closed => "closed",
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => Ok(StatusFilter::All),
            "open" => Ok(StatusFilter::Open),
            "limited" => Ok(StatusFilter::Limited),
            "closed" => Ok(StatusFilter::Closed),
            other => Err(ConsoleError::Validation(format!(
                "Unknown status filter '{other}', expected all, open, limited or closed"
            ))),
        }
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter condition of a scheduled task, stored by the server as a JSON string
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskConditions {
    pub premium_min: f64,
    pub status_filter: StatusFilter,
}

impl TaskConditions {
    /// Encode into the JSON string the server stores.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A scheduled notification task as returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub cron_expression: String,
    pub recipients: String,
    pub conditions: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_active: bool,
}

impl Task {
    /// Decode the conditions JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored string is not valid conditions JSON
    pub fn parsed_conditions(&self) -> Result<TaskConditions> {
        Ok(serde_json::from_str(&self.conditions)?)
    }

    /// Recipients split on commas, trimmed, empties dropped
    #[must_use]
    pub fn recipient_list(&self) -> Vec<String> {
        split_recipients(&self.recipients)
    }
}

/// Body of task save and test requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub cron_expression: String,
    pub recipients: String,
    pub conditions: String,
}

impl TaskDraft {
    #[must_use]
    pub fn recipient_list(&self) -> Vec<String> {
        split_recipients(&self.recipients)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Executed,
    #[serde(other)]
    Failed,
}

/// One execution of a scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub run_time: String,
    pub status: LogStatus,
    #[serde(default)]
    pub filtered_count: u64,
}

/// SMTP settings as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub sender_email: String,
    pub use_ssl: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_server: String::new(),
            smtp_port: 465,
            username: String::new(),
            password: String::new(),
            sender_email: String::new(),
            use_ssl: true,
        }
    }
}

/// One row of the QDII data table. Keys match the server's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    #[serde(rename = "来源", deserialize_with = "scalar_text")]
    pub origin: String,
    #[serde(rename = "代码", deserialize_with = "scalar_text")]
    pub code: String,
    #[serde(rename = "名称", deserialize_with = "scalar_text")]
    pub name: String,
    #[serde(rename = "T-1溢价率", deserialize_with = "scalar_text")]
    pub premium_rate: String,
    #[serde(rename = "申购状态", deserialize_with = "scalar_text")]
    pub subscription_status: String,
}

/// Payload of `POST /refresh`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshPayload {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub data: Vec<DataRow>,
}

/// Filter parameters shared by refresh and table filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterParams {
    pub premium_min: f64,
    pub status_filter: StatusFilter,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            premium_min: 0.0,
            status_filter: StatusFilter::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshEventStatus {
    Running,
    Completed,
    Error,
}

/// One message of the `/refresh-status` event stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshEvent {
    pub status: RefreshEventStatus,
    #[serde(default)]
    pub message: Option<String>,
}

pub(crate) fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts strings, numbers, booleans and null, rendering them as display text.
fn scalar_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// SQLite hands booleans back as 0/1; accept both forms.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        serde_json::Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}
