//! Scheduled task management: the edit session and the list actions.
//!
//! The editor walks `Closed -> Loading -> Editing -> Submitting` and ends in
//! `Closed` on success or `EditingWithError` when the server refuses the task.
//! Only one session exists at a time.

use crate::api::ApiClient;
use crate::cron::{describe, ExecutionTime};
use crate::error::{ConsoleError, Result};
use crate::forms::TaskForm;
use crate::models::{StatusFilter, Task, TaskId};
use crate::notify::{report_failure, Notifier, Severity, Toast};
use crate::views::{render, TaskListView, TaskLogView, TaskTestResultView};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Closed,
    Loading { id: TaskId },
    Editing,
    Submitting,
    EditingWithError { error: String },
}

#[derive(Debug)]
pub struct TaskEditor {
    state: EditorState,
    task_id: Option<TaskId>,
    form: TaskForm,
}

impl Default for TaskEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskEditor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: EditorState::Closed,
            task_id: None,
            form: TaskForm::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != EditorState::Closed
    }

    /// Whether the form accepts input.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(
            self.state,
            EditorState::Editing | EditorState::EditingWithError { .. }
        )
    }

    /// Id of the task being edited; `None` while creating.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    #[must_use]
    pub fn form(&self) -> &TaskForm {
        &self.form
    }

    /// The form, while the session accepts input.
    pub fn form_mut(&mut self) -> Option<&mut TaskForm> {
        if self.is_editable() {
            Some(&mut self.form)
        } else {
            None
        }
    }

    pub fn set_time(&mut self, time: ExecutionTime) {
        if let Some(form) = self.form_mut() {
            form.execution_time = time.to_string();
        }
    }

    /// Flip one weekday; returns whether it is now selected.
    pub fn toggle_day(&mut self, day: u8) -> bool {
        self.form_mut().is_some_and(|form| form.days.toggle(day))
    }

    pub fn set_every_day(&mut self, on: bool) {
        if let Some(form) = self.form_mut() {
            form.set_every_day(on);
        }
    }

    pub fn set_recipients(&mut self, recipients: impl Into<String>) {
        if let Some(form) = self.form_mut() {
            form.recipients = recipients.into();
        }
    }

    pub fn set_premium_min(&mut self, premium_min: impl Into<String>) {
        if let Some(form) = self.form_mut() {
            form.premium_min = premium_min.into();
        }
    }

    pub fn set_status_filter(&mut self, status_filter: StatusFilter) {
        if let Some(form) = self.form_mut() {
            form.status_filter = status_filter;
        }
    }

    /// Open a blank form for a new task.
    ///
    /// Returns `false` without touching the open session if there is one.
    pub fn open_new(&mut self) -> bool {
        if self.is_open() {
            debug!("Ignoring new task request, a session is already open");
            return false;
        }
        self.task_id = None;
        self.form = TaskForm::default();
        self.state = EditorState::Editing;
        true
    }

    /// Load task `id` into the form.
    ///
    /// Returns whether the form is now open for editing. An open session is
    /// left alone; a failed load closes the editor again.
    pub async fn begin_edit(
        &mut self,
        api: &ApiClient,
        notifier: &dyn Notifier,
        id: TaskId,
    ) -> bool {
        if self.is_open() {
            debug!("Ignoring edit request for task {id}, a session is already open");
            return false;
        }

        self.state = EditorState::Loading { id };
        let loaded = match api.load_task(id).await {
            Ok(task) => TaskForm::from_task(&task),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(form) => {
                self.task_id = Some(id);
                self.form = form;
                self.state = EditorState::Editing;
                true
            }
            Err(e) => {
                report_failure(notifier, "Failed to load task", &e);
                self.state = EditorState::Closed;
                false
            }
        }
    }

    /// Validate and save the form.
    ///
    /// On success the session closes and the reloaded task list is returned.
    /// A validation failure sends nothing and leaves the session as it was; a
    /// server or network failure moves it to `EditingWithError`.
    ///
    /// # Errors
    ///
    /// Returns the validation, cooldown or request error
    pub async fn submit(&mut self, api: &ApiClient, notifier: &dyn Notifier) -> Result<String> {
        if !self.is_editable() {
            return Err(ConsoleError::Generic("No task is being edited".to_string()));
        }

        let draft = match self.form.build_draft(self.task_id) {
            Ok(draft) => draft,
            Err(e) => {
                report_failure(notifier, "Form error", &e);
                return Err(e);
            }
        };

        let previous = std::mem::replace(&mut self.state, EditorState::Submitting);
        match api.save_task(&draft).await {
            Ok(message) => {
                info!("Saved task {:?}", self.task_id);
                notifier.notify(Toast::new(
                    "Saved",
                    message.unwrap_or_else(|| "Task saved".to_string()),
                    Severity::Success,
                ));
                self.close();
                Ok(load_tasks(api, notifier).await.unwrap_or_default())
            }
            Err(e) => {
                report_failure(notifier, "Save failed", &e);
                self.state = match e {
                    ConsoleError::CooldownActive(_) => previous,
                    _ => EditorState::EditingWithError {
                        error: e.user_message(),
                    },
                };
                Err(e)
            }
        }
    }

    /// Validate the form and dry-run it on the server; the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the validation, cooldown or request error
    pub async fn test(&self, api: &ApiClient, notifier: &dyn Notifier) -> Result<String> {
        if !self.is_editable() {
            return Err(ConsoleError::Generic("No task is being edited".to_string()));
        }

        let result = match self.form.build_draft(self.task_id) {
            Ok(draft) => api
                .test_task(&draft)
                .await
                .map(|outcome| (draft, outcome)),
            Err(e) => Err(e),
        };

        match result {
            Ok((draft, outcome)) => {
                notifier.notify(Toast::new(
                    "Test succeeded",
                    outcome.message.clone().unwrap_or_else(|| {
                        format!("{} matching rows found", outcome.filtered_count)
                    }),
                    Severity::Success,
                ));
                render(&TaskTestResultView::new(draft.recipient_list(), &outcome))
            }
            Err(e) => {
                report_failure(notifier, "Test failed", &e);
                Err(e)
            }
        }
    }

    /// Discard the session.
    pub fn cancel(&mut self) {
        if self.is_open() {
            debug!("Edit session cancelled");
        }
        self.close();
    }

    fn close(&mut self) {
        self.state = EditorState::Closed;
        self.task_id = None;
        self.form = TaskForm::default();
    }
}

/// Fetch and render the task list.
///
/// # Errors
///
/// Returns an error if the list cannot be loaded or rendered
pub async fn load_tasks(api: &ApiClient, notifier: &dyn Notifier) -> Result<String> {
    match api.load_tasks().await {
        Ok(tasks) => render(&TaskListView::new(&tasks)),
        Err(e) => {
            report_failure(notifier, "Failed to load tasks", &e);
            Err(e)
        }
    }
}

/// Start or stop a task, then return the reloaded list.
///
/// # Errors
///
/// Returns the cooldown or request error
pub async fn set_task_active(
    api: &ApiClient,
    notifier: &dyn Notifier,
    id: TaskId,
    active: bool,
) -> Result<String> {
    let verb = if active { "started" } else { "stopped" };
    match api.toggle_task_status(id, active).await {
        Ok(message) => {
            info!("Task {id} {verb}");
            notifier.notify(Toast::new(
                "Status updated",
                message.unwrap_or_else(|| format!("Task {verb}")),
                Severity::Success,
            ));
            Ok(load_tasks(api, notifier).await.unwrap_or_default())
        }
        Err(e) => {
            report_failure(notifier, "Status update failed", &e);
            Err(e)
        }
    }
}

/// Stop an active task or start an inactive one.
///
/// # Errors
///
/// Returns the cooldown or request error
pub async fn toggle_task(api: &ApiClient, notifier: &dyn Notifier, task: &Task) -> Result<String> {
    set_task_active(api, notifier, task.id, !task.is_active).await
}

/// Render the execution log of task `id`.
///
/// # Errors
///
/// Returns an error if the logs cannot be loaded or rendered
pub async fn view_logs(api: &ApiClient, notifier: &dyn Notifier, id: TaskId) -> Result<String> {
    match api.task_logs(id).await {
        Ok(logs) => render(&TaskLogView::new(id, &logs)),
        Err(e) => {
            report_failure(notifier, "Failed to load logs", &e);
            Err(e)
        }
    }
}

/// Question asked before deleting `task`, naming its schedule.
#[must_use]
pub fn delete_confirmation(task: &Task) -> String {
    format!(
        "Delete task #{} ({})? This cannot be undone.",
        task.id,
        describe(&task.cron_expression)
    )
}

/// Load task `id` and build its delete confirmation.
///
/// # Errors
///
/// Returns an error if the task cannot be loaded
pub async fn confirmation_for(api: &ApiClient, notifier: &dyn Notifier, id: TaskId) -> Result<String> {
    match api.load_task(id).await {
        Ok(task) => Ok(delete_confirmation(&task)),
        Err(e) => {
            report_failure(notifier, "Failed to load task", &e);
            Err(e)
        }
    }
}

/// Delete task `id`; callers confirm first. Returns the reloaded list.
///
/// # Errors
///
/// Returns the cooldown or request error
pub async fn delete_task(api: &ApiClient, notifier: &dyn Notifier, id: TaskId) -> Result<String> {
    match api.delete_task(id).await {
        Ok(message) => {
            info!("Deleted task {id}");
            notifier.notify(Toast::new(
                "Deleted",
                message.unwrap_or_else(|| "Task deleted".to_string()),
                Severity::Success,
            ));
            Ok(load_tasks(api, notifier).await.unwrap_or_default())
        }
        Err(e) => {
            report_failure(notifier, "Delete failed", &e);
            Err(e)
        }
    }
}
