//! HTTP client for the dashboard server.
//!
//! One method per server action. Mutating actions pass through the
//! [`CooldownMap`] first and fail with [`ConsoleError::CooldownActive`] without
//! touching the network while their window is open. HTTP and transport failures
//! are reported to the installed [`Notifier`] before being returned.

use crate::cooldown::{Action, CooldownMap};
use crate::error::{ConsoleError, Result};
use crate::models::{
    ApiStatus, DataRow, Envelope, FilterParams, LogsPayload, MailConfig, MailConfigPayload,
    NoPayload, RefreshPayload, Task, TaskDraft, TaskId, TaskLogEntry, TaskTestPayload,
    TasksPayload,
};
use crate::notify::{Notifier, Severity, Toast};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a task dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTestOutcome {
    pub filtered_count: u64,
    pub message: Option<String>,
}

/// Result of `POST /refresh`
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub output: Option<String>,
    pub rows: Vec<DataRow>,
}

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    request_timeout: Duration,
    cooldowns: Arc<CooldownMap>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApiClient {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the HTTP client cannot be
    /// built
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            base,
            http,
            request_timeout,
            cooldowns: Arc::new(CooldownMap::new()),
            notifier: None,
        })
    }

    /// Report HTTP and transport failures through `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn cooldowns(&self) -> &CooldownMap {
        &self.cooldowns
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn guard(&self, action: Action) -> Result<()> {
        if self.cooldowns.try_begin(action) {
            Ok(())
        } else {
            Err(ConsoleError::CooldownActive(action))
        }
    }

    fn report(&self, err: &ConsoleError) {
        error!("API error: {err}");
        if let Some(notifier) = &self.notifier {
            notifier.notify(Toast::new(
                "Operation failed",
                err.to_string(),
                Severity::Danger,
            ));
        }
    }

    fn timed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.timeout(self.request_timeout)
    }

    /// Send a request and return the raw response if it is 2xx.
    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
        failure: &str,
    ) -> Result<reqwest::Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = ConsoleError::Transport(e);
                self.report(&err);
                return Err(err);
            }
        };

        let status = response.status();
        debug!("{} responded with {status}", response.url());
        if !status.is_success() {
            let err = ConsoleError::Http {
                status: status.as_u16(),
                message: failure.to_string(),
            };
            self.report(&err);
            return Err(err);
        }

        Ok(response)
    }

    /// Send a request expecting a JSON envelope, and unwrap it.
    ///
    /// No timeout is added here; callers bound ordinary requests with
    /// `timed`.
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        failure: &str,
    ) -> Result<(Option<String>, T)> {
        let response = self.dispatch(request, failure).await?;

        let envelope: Envelope<T> = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                let err = ConsoleError::Transport(e);
                self.report(&err);
                return Err(err);
            }
        };

        match envelope.status {
            ApiStatus::Success => Ok((envelope.message, envelope.payload)),
            ApiStatus::Error => Err(ConsoleError::Application(
                envelope.message.unwrap_or_else(|| failure.to_string()),
            )),
        }
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        failure: &str,
    ) -> Result<(Option<String>, T)> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        self.call(self.timed(self.http.post(url).json(body)), failure)
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        failure: &str,
    ) -> Result<(Option<String>, T)> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");
        self.call(self.timed(self.http.get(url)), failure).await
    }

    /// `GET /api/mail/config`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server reports an error
    pub async fn load_mail_config(&self) -> Result<MailConfig> {
        let (_, payload): (_, MailConfigPayload) = self
            .get_json("api/mail/config", "Failed to load mail configuration")
            .await?;
        Ok(payload.config)
    }

    /// `POST /api/mail/config`, guarded by the save cooldown
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// server rejects the configuration
    pub async fn save_mail_config(&self, config: &MailConfig) -> Result<Option<String>> {
        self.guard(Action::Save)?;
        let (message, _): (_, NoPayload) = self
            .post_json("api/mail/config", config, "Failed to save mail configuration")
            .await?;
        Ok(message)
    }

    /// `POST /api/mail/test`, guarded by the test cooldown
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// server could not send the test email
    pub async fn test_mail_config(&self, recipient: &str) -> Result<Option<String>> {
        self.guard(Action::Test)?;
        let body = serde_json::json!({ "recipient": recipient });
        let (message, _): (_, NoPayload) = self
            .post_json("api/mail/test", &body, "Mail test failed")
            .await?;
        Ok(message)
    }

    /// `GET /api/tasks`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server reports an error
    pub async fn load_tasks(&self) -> Result<Vec<Task>> {
        let (_, payload): (_, TasksPayload) =
            self.get_json("api/tasks", "Failed to load tasks").await?;
        Ok(payload.tasks)
    }

    /// `GET /api/tasks?id=<id>`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server reports an error or no
    /// task with that id exists
    pub async fn load_task(&self, id: TaskId) -> Result<Task> {
        let url = self.endpoint("api/tasks")?;
        debug!("GET {url}?id={id}");
        let (message, payload): (_, TasksPayload) = self
            .call(
                self.timed(self.http.get(url).query(&[("id", id)])),
                "Failed to load task",
            )
            .await?;

        payload.tasks.into_iter().next().ok_or_else(|| {
            ConsoleError::Application(message.unwrap_or_else(|| "Task does not exist".to_string()))
        })
    }

    /// `POST /api/tasks`, guarded by the save cooldown
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// server rejects the task
    pub async fn save_task(&self, draft: &TaskDraft) -> Result<Option<String>> {
        self.guard(Action::Save)?;
        let (message, _): (_, NoPayload) = self
            .post_json("api/tasks", draft, "Failed to save task")
            .await?;
        Ok(message)
    }

    /// `POST /api/tasks/test`, guarded by the test cooldown
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// server reports a failed dry run
    pub async fn test_task(&self, draft: &TaskDraft) -> Result<TaskTestOutcome> {
        self.guard(Action::Test)?;
        let (message, payload): (_, TaskTestPayload) = self
            .post_json("api/tasks/test", draft, "Failed to test task")
            .await?;
        Ok(TaskTestOutcome {
            filtered_count: payload.filtered_count,
            message,
        })
    }

    /// `POST /api/tasks/<id>/status`, guarded by the save cooldown
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// server rejects the change
    pub async fn toggle_task_status(&self, id: TaskId, is_active: bool) -> Result<Option<String>> {
        self.guard(Action::Save)?;
        let body = serde_json::json!({ "is_active": is_active });
        let (message, _): (_, NoPayload) = self
            .post_json(
                &format!("api/tasks/{id}/status"),
                &body,
                "Failed to update task status",
            )
            .await?;
        Ok(message)
    }

    /// `GET /api/tasks/<id>/logs`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server reports an error
    pub async fn task_logs(&self, id: TaskId) -> Result<Vec<TaskLogEntry>> {
        let (_, payload): (_, LogsPayload) = self
            .get_json(&format!("api/tasks/{id}/logs"), "Failed to load logs")
            .await?;
        Ok(payload.logs)
    }

    /// `DELETE /api/tasks/<id>`, guarded by the delete cooldown
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// server refuses the deletion
    pub async fn delete_task(&self, id: TaskId) -> Result<Option<String>> {
        self.guard(Action::Delete)?;
        let url = self.endpoint(&format!("api/tasks/{id}"))?;
        debug!("DELETE {url}");
        let (message, _): (_, NoPayload) = self
            .call(self.timed(self.http.delete(url)), "Failed to delete task")
            .await?;
        Ok(message)
    }

    /// `POST /refresh` with form-encoded filters, guarded by the refresh cooldown
    ///
    /// The server answers only once the scrape is over, so only the connect
    /// timeout applies.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is cooling down, the request fails or the
    /// scrape failed on the server
    pub async fn refresh_data(&self, params: &FilterParams) -> Result<RefreshOutcome> {
        self.guard(Action::Refresh)?;
        let url = self.endpoint("refresh")?;
        debug!("POST {url}");
        let (message, payload): (_, RefreshPayload) = self
            .call(self.http.post(url).form(params), "Failed to refresh data")
            .await?;
        Ok(RefreshOutcome {
            message,
            timestamp: payload.timestamp,
            output: payload.output,
            rows: payload.data,
        })
    }

    /// `POST /` with form-encoded filters; returns the rendered page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers non-2xx
    pub async fn filter_page(&self, params: &FilterParams) -> Result<String> {
        let url = self.endpoint("")?;
        debug!("POST {url}");
        let request = self.timed(self.http.post(url).form(params));
        let response = self.dispatch(request, "Failed to apply filters").await?;
        match response.text().await {
            Ok(text) => Ok(text),
            Err(e) => {
                let err = ConsoleError::Transport(e);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// `GET /refresh-status`; returns the open event stream response.
    ///
    /// No request timeout applies; the caller's watchdog decides when the
    /// stream has gone quiet.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the server answers non-2xx
    pub async fn open_refresh_stream(&self) -> Result<reqwest::Response> {
        let url = self.endpoint("refresh-status")?;
        debug!("GET {url} (event stream)");
        let request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        self.dispatch(request, "Failed to follow refresh progress")
            .await
    }
}
