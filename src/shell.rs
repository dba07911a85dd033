//! The console: one long-lived client, editor and refresh trigger, driven by
//! parsed commands from the command line or the interactive shell.

use crate::api::ApiClient;
use crate::cli::{Command, DataCommand, MailCommand, ShellLine, TaskCommand, TaskFormArgs};
use crate::config::{Config, ThemePreference};
use crate::data;
use crate::error::{ConsoleError, Result};
use crate::mail;
use crate::models::TaskId;
use crate::notify::{report_failure, Notifier, Severity, TerminalNotifier, Toast};
use crate::refresh::{self, RefreshTrigger};
use crate::tasks::{self, EditorState, TaskEditor};
use crate::views::{render, DataTableView};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const PROMPT: &str = "qdii> ";

pub struct Console {
    config: Config,
    config_path: PathBuf,
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    terminal: Option<Arc<TerminalNotifier>>,
    editor: TaskEditor,
    trigger: RefreshTrigger,
    cancel_token: CancellationToken,
    input: Option<Lines<BufReader<Stdin>>>,
    interactive: bool,
}

impl Console {
    /// Build a console printing toasts on the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL in `config` is invalid
    pub fn new(config: Config, config_path: PathBuf, cancel_token: CancellationToken) -> Result<Self> {
        let terminal = Arc::new(TerminalNotifier::new(config.theme.resolve()));
        let mut console =
            Self::with_notifier(config, config_path, terminal.clone(), cancel_token)?;
        console.terminal = Some(terminal);
        Ok(console)
    }

    /// Build a console reporting to `notifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL in `config` is invalid
    pub fn with_notifier(
        config: Config,
        config_path: PathBuf,
        notifier: Arc<dyn Notifier>,
        cancel_token: CancellationToken,
    ) -> Result<Self> {
        let api = ApiClient::new(
            &config.server_url,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_notifier(notifier.clone());

        info!("Console connected to {}", api.base_url());
        Ok(Self {
            config,
            config_path,
            api,
            notifier,
            terminal: None,
            editor: TaskEditor::new(),
            trigger: RefreshTrigger::new(),
            cancel_token,
            input: None,
            interactive: false,
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn trigger(&self) -> &RefreshTrigger {
        &self.trigger
    }

    #[must_use]
    pub fn editor(&self) -> &TaskEditor {
        &self.editor
    }

    /// Keep task forms open after a failed save, for correction on later
    /// lines. Set by [`Console::run_interactive`].
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Run one command and return the text to print.
    ///
    /// Failures have already been toasted when this returns an error.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed command
    pub async fn dispatch(&mut self, command: Command) -> Result<String> {
        debug!("Dispatching {command:?}");
        match command {
            Command::Tasks { action } => self.run_task_command(action).await,
            Command::Mail { action } => self.run_mail_command(action).await,
            Command::Data { action } => self.run_data_command(action).await,
            Command::Theme { preference } => self.set_theme(preference),
            Command::Shell => Ok("Already in the interactive shell".to_string()),
        }
    }

    async fn run_task_command(&mut self, action: TaskCommand) -> Result<String> {
        let api = &self.api;
        let notifier = self.notifier.as_ref();
        match action {
            TaskCommand::List => tasks::load_tasks(api, notifier).await,
            TaskCommand::Show { id } => {
                let mut viewer = TaskEditor::new();
                let blank = TaskFormArgs::default();
                open_form(&mut viewer, api, notifier, Some(id), &blank).await?;
                Ok(describe_form(&viewer))
            }
            TaskCommand::Create(form) => self.replace_and_submit(None, &form).await,
            TaskCommand::Edit { id, form } => self.replace_and_submit(Some(id), &form).await,
            TaskCommand::Test { id: None, form } if self.editor.is_editable() => {
                form.apply(&mut self.editor);
                self.editor.test(api, notifier).await
            }
            TaskCommand::Test { id, form } => {
                let mut scratch = TaskEditor::new();
                open_form(&mut scratch, api, notifier, id, &form).await?;
                scratch.test(api, notifier).await
            }
            TaskCommand::Form(form) => {
                self.require_open_form()?;
                form.apply(&mut self.editor);
                Ok(describe_form(&self.editor))
            }
            TaskCommand::Submit => {
                self.require_open_form()?;
                self.editor.submit(&self.api, self.notifier.as_ref()).await
            }
            TaskCommand::Cancel => {
                self.require_open_form()?;
                self.editor.cancel();
                Ok("Task form discarded".to_string())
            }
            TaskCommand::Start { id } => tasks::set_task_active(api, notifier, id, true).await,
            TaskCommand::Stop { id } => tasks::set_task_active(api, notifier, id, false).await,
            TaskCommand::Toggle { id } => {
                let task = api.load_task(id).await.map_err(|e| {
                    report_failure(notifier, "Failed to load task", &e);
                    e
                })?;
                tasks::toggle_task(api, notifier, &task).await
            }
            TaskCommand::Logs { id } => tasks::view_logs(api, notifier, id).await,
            TaskCommand::Delete { id, yes } => self.delete_task(id, yes).await,
        }
    }

    /// Open a fresh session, discarding the current one, and save it.
    ///
    /// In the interactive shell a failed save leaves the form open for
    /// `tasks form` and `tasks submit`.
    async fn replace_and_submit(
        &mut self,
        id: Option<TaskId>,
        form: &TaskFormArgs,
    ) -> Result<String> {
        if self.editor.is_open() {
            info!("Discarding the open task form");
            self.editor.cancel();
        }
        open_form(&mut self.editor, &self.api, self.notifier.as_ref(), id, form).await?;
        let result = self.editor.submit(&self.api, self.notifier.as_ref()).await;
        if result.is_err() {
            if self.interactive && self.editor.is_editable() {
                self.notifier.notify(Toast::new(
                    "Form kept open",
                    "Correct it with `tasks form`, then `tasks submit` or `tasks cancel`",
                    Severity::Info,
                ));
            } else {
                self.editor.cancel();
            }
        }
        result
    }

    fn require_open_form(&self) -> Result<()> {
        if self.editor.is_editable() {
            return Ok(());
        }
        let err = ConsoleError::Validation(
            "No task form is open. Start one with `tasks create` or `tasks edit <id>`".to_string(),
        );
        report_failure(self.notifier.as_ref(), "Nothing to edit", &err);
        Err(err)
    }

    async fn delete_task(&mut self, id: TaskId, confirmed: bool) -> Result<String> {
        if !confirmed {
            let question =
                tasks::confirmation_for(&self.api, self.notifier.as_ref(), id).await?;
            if !self.confirm(&question).await? {
                self.notifier.notify(Toast::new(
                    "Cancelled",
                    format!("Task #{id} was not deleted"),
                    Severity::Info,
                ));
                return Ok(String::new());
            }
        }
        tasks::delete_task(&self.api, self.notifier.as_ref(), id).await
    }

    async fn run_mail_command(&mut self, action: MailCommand) -> Result<String> {
        let api = &self.api;
        let notifier = self.notifier.as_ref();
        match action {
            MailCommand::Show => mail::show(&mail::load(api, notifier).await?),
            MailCommand::Save(fields) => {
                let mut form = mail::load(api, notifier).await?;
                fields.apply(&mut form);
                mail::save(api, notifier, &form).await?;
                mail::show(&form)
            }
            MailCommand::Test { recipient } => mail::send_test(api, notifier, &recipient).await,
        }
    }

    async fn run_data_command(&mut self, action: DataCommand) -> Result<String> {
        match action {
            DataCommand::Filter(filters) => {
                let rows =
                    data::apply_filters(&self.api, self.notifier.as_ref(), &filters.params())
                        .await?;
                render(&DataTableView::new(&rows))
            }
            DataCommand::Refresh(filters) => {
                let report = refresh::run(
                    &self.api,
                    self.notifier.as_ref(),
                    &self.trigger,
                    &filters.params(),
                    &self.cancel_token,
                    |line| eprintln!("  ... {line}"),
                )
                .await?;
                report.render()
            }
        }
    }

    fn set_theme(&mut self, preference: Option<ThemePreference>) -> Result<String> {
        let Some(preference) = preference else {
            return Ok(format!(
                "Theme: {} ({})",
                self.config.theme,
                self.config.theme.resolve()
            ));
        };

        self.config.theme = preference;
        self.config.save(&self.config_path)?;

        let theme = preference.resolve();
        if let Some(terminal) = &self.terminal {
            terminal.set_theme(theme);
        }
        self.notifier.notify(Toast::new(
            "Theme changed",
            format!("Using the {theme} theme"),
            Severity::Info,
        ));
        Ok(format!("Theme: {preference} ({theme})"))
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let input = self
            .input
            .get_or_insert_with(|| BufReader::new(tokio::io::stdin()).lines());
        input.next_line().await.map_err(ConsoleError::Terminal)
    }

    async fn confirm(&mut self, question: &str) -> Result<bool> {
        write_out(&format!("{question} [y/N] ")).await?;
        let answer = self.read_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    /// Read commands until `exit` or end of input. Command failures are
    /// reported and the loop carries on.
    ///
    /// # Errors
    ///
    /// Returns an error only if the terminal cannot be read or written
    pub async fn run_interactive(&mut self) -> Result<()> {
        write_out("QDII console. Type `help` for commands, `exit` to quit.\n").await?;
        self.set_interactive(true);

        loop {
            write_out(PROMPT).await?;

            let cancel_token = self.cancel_token.clone();
            let line = tokio::select! {
                () = cancel_token.cancelled() => break,
                line = self.read_line() => line?,
            };
            let Some(line) = line else { break };

            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                [] => continue,
                ["exit" | "quit"] => break,
                _ => {}
            }

            let command = match ShellLine::try_parse_from(words.iter().copied()) {
                Ok(parsed) => parsed.command,
                Err(e) => {
                    write_out(&e.render().to_string()).await?;
                    continue;
                }
            };

            let result = tokio::select! {
                () = cancel_token.cancelled() => break,
                result = self.dispatch(command) => result,
            };
            match result {
                Ok(output) if output.ends_with('\n') => write_out(&output).await?,
                Ok(output) if !output.is_empty() => write_out(&format!("{output}\n")).await?,
                Ok(_) => {}
                Err(e) => debug!("Command failed: {e}"),
            }
        }

        info!("Leaving interactive shell");
        Ok(())
    }
}

async fn write_out(text: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(text.as_bytes())
        .await
        .map_err(ConsoleError::Terminal)?;
    stdout.flush().await.map_err(ConsoleError::Terminal)
}

/// Open `editor` on a new or stored task and apply `form` on top.
async fn open_form(
    editor: &mut TaskEditor,
    api: &ApiClient,
    notifier: &dyn Notifier,
    id: Option<TaskId>,
    form: &TaskFormArgs,
) -> Result<()> {
    let opened = match id {
        Some(id) => editor.begin_edit(api, notifier, id).await,
        None => editor.open_new(),
    };
    if !opened {
        return Err(ConsoleError::Generic(format!(
            "Task {} could not be opened",
            id.map_or_else(|| "form".to_string(), |id| id.to_string())
        )));
    }
    form.apply(editor);
    Ok(())
}

fn describe_form(editor: &TaskEditor) -> String {
    let form = editor.form();
    let days: Vec<&str> = form
        .days
        .days()
        .map(|day| crate::cron::WEEKDAY_NAMES[usize::from(day)])
        .collect();
    let mut text = format!(
        "{}\n  time:        {}\n  days:        {}\n  recipients:  {}\n  premium min: {}\n  status:      {}\n",
        editor
            .task_id()
            .map_or_else(|| "New task".to_string(), |id| format!("Task #{id}")),
        form.execution_time,
        if form.every_day() {
            "every day".to_string()
        } else {
            days.join(", ")
        },
        form.recipients,
        form.premium_min,
        form.status_filter.label(),
    );
    if let EditorState::EditingWithError { error } = editor.state() {
        text.push_str(&format!("  last error:  {error}\n"));
    }
    text
}
