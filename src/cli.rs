//! Command grammar shared by the one-shot binary and the interactive shell.

use crate::config::ThemePreference;
use crate::cron::{ExecutionTime, WeekdaySet};
use crate::error::ConsoleError;
use crate::forms::{parse_premium_min, MailForm};
use crate::models::{FilterParams, StatusFilter, TaskId};
use crate::tasks::TaskEditor;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "qdii_console")]
#[command(version)]
#[command(about = "Console for the QDII premium-rate monitoring dashboard", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard server base URL, overriding the configuration file
    #[arg(long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// One line typed into the interactive shell
#[derive(Parser, Debug)]
#[command(name = "qdii>", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Manage scheduled notification tasks
    Tasks {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Show or change the SMTP settings
    Mail {
        #[command(subcommand)]
        action: MailCommand,
    },

    /// Refresh or filter the premium-rate table
    Data {
        #[command(subcommand)]
        action: DataCommand,
    },

    /// Show or set the colour theme (light, dark, system)
    Theme {
        #[arg(value_parser = parse_value::<ThemePreference>)]
        preference: Option<ThemePreference>,
    },

    /// Start an interactive shell
    Shell,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TaskCommand {
    /// List every task
    List,
    /// Show one task as an edit form would load it
    Show { id: TaskId },
    /// Create a task
    Create(TaskFormArgs),
    /// Edit a task; omitted fields keep their stored value
    Edit {
        id: TaskId,
        #[command(flatten)]
        form: TaskFormArgs,
    },
    /// Dry-run a task without saving it; in the shell, the open form is
    /// tested when no id is given
    Test {
        /// Start from a stored task instead of a blank form
        #[arg(long)]
        id: Option<TaskId>,
        #[command(flatten)]
        form: TaskFormArgs,
    },
    /// Change fields of the form left open by `create` or `edit`, or show it
    Form(TaskFormArgs),
    /// Save the open form again
    Submit,
    /// Discard the open form
    Cancel,
    /// Start a task
    Start { id: TaskId },
    /// Stop a task
    Stop { id: TaskId },
    /// Start a stopped task or stop a running one
    Toggle { id: TaskId },
    /// Show the execution log of a task
    Logs { id: TaskId },
    /// Delete a task
    Delete {
        id: TaskId,
        /// Skip the confirmation question
        #[arg(short, long)]
        yes: bool,
    },
}

/// Task form fields
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct TaskFormArgs {
    /// Execution time, HH:MM
    #[arg(long, value_parser = parse_value::<ExecutionTime>)]
    pub time: Option<ExecutionTime>,

    /// Weekdays as codes, Sunday = 0, e.g. 1,3,5
    #[arg(long, value_parser = parse_value::<WeekdaySet>, conflicts_with = "every_day")]
    pub days: Option<WeekdaySet>,

    /// Run on all seven days
    #[arg(long)]
    pub every_day: bool,

    /// Comma-separated recipient addresses
    #[arg(long)]
    pub recipients: Option<String>,

    /// Minimum T-1 premium rate
    #[arg(long)]
    pub premium_min: Option<String>,

    /// Subscription status filter (all, open, limited, closed)
    #[arg(long, value_parser = parse_value::<StatusFilter>)]
    pub status: Option<StatusFilter>,
}

impl TaskFormArgs {
    /// Copy the given fields into the open form.
    pub fn apply(&self, editor: &mut TaskEditor) {
        if let Some(time) = self.time {
            editor.set_time(time);
        }
        if self.every_day {
            editor.set_every_day(true);
        } else if let Some(days) = self.days {
            if let Some(form) = editor.form_mut() {
                form.days = days;
            }
        }
        if let Some(recipients) = &self.recipients {
            editor.set_recipients(recipients.as_str());
        }
        if let Some(premium_min) = &self.premium_min {
            editor.set_premium_min(premium_min.as_str());
        }
        if let Some(status) = self.status {
            editor.set_status_filter(status);
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MailCommand {
    /// Show the stored settings, password masked
    Show,
    /// Change settings; omitted fields keep their stored value
    Save(MailFormArgs),
    /// Send a test email
    Test { recipient: String },
}

/// SMTP form fields
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct MailFormArgs {
    #[arg(long)]
    pub smtp_server: Option<String>,

    #[arg(long)]
    pub port: Option<String>,

    /// Account name, also used as the sender address
    #[arg(long)]
    pub username: Option<String>,

    /// New password; leave out to keep the stored one
    #[arg(long)]
    pub password: Option<String>,

    #[arg(long, action = ArgAction::Set)]
    pub ssl: Option<bool>,
}

impl MailFormArgs {
    pub fn apply(&self, form: &mut MailForm) {
        if let Some(server) = &self.smtp_server {
            form.smtp_server.clone_from(server);
        }
        if let Some(port) = &self.port {
            form.smtp_port.clone_from(port);
        }
        if let Some(username) = &self.username {
            form.username.clone_from(username);
        }
        if let Some(password) = &self.password {
            form.password.clone_from(password);
        }
        if let Some(ssl) = self.ssl {
            form.use_ssl = ssl;
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DataCommand {
    /// Scrape fresh data and follow its progress
    Refresh(FilterArgs),
    /// Show the table with filters applied
    Filter(FilterArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct FilterArgs {
    /// Minimum T-1 premium rate
    #[arg(long, default_value = "0", value_parser = parse_threshold)]
    pub premium_min: f64,

    /// Subscription status filter (all, open, limited, closed)
    #[arg(long, default_value = "all", value_parser = parse_value::<StatusFilter>)]
    pub status: StatusFilter,
}

impl FilterArgs {
    #[must_use]
    pub fn params(&self) -> FilterParams {
        FilterParams {
            premium_min: self.premium_min,
            status_filter: self.status,
        }
    }
}

fn parse_value<T: FromStr<Err = ConsoleError>>(raw: &str) -> Result<T, String> {
    raw.parse().map_err(|e: ConsoleError| e.user_message())
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    parse_premium_min(raw).map_err(|e| e.user_message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_create() {
        let cli = Cli::try_parse_from([
            "qdii_console",
            "--server",
            "http://10.0.0.2:8866",
            "tasks",
            "create",
            "--time",
            "9:05",
            "--days",
            "1,3,5",
            "--recipients",
            "a@b.cn,c@d.cn",
            "--status",
            "open",
        ])
        .unwrap();

        assert_eq!(cli.server.as_deref(), Some("http://10.0.0.2:8866"));
        let Command::Tasks {
            action: TaskCommand::Create(form),
        } = cli.command
        else {
            panic!("unexpected command {:?}", cli.command);
        };
        assert_eq!(form.time.map(|t| t.to_string()).as_deref(), Some("09:05"));
        assert_eq!(form.days, Some(WeekdaySet::from_days(&[1, 3, 5]).unwrap()));
        assert_eq!(form.status, Some(StatusFilter::Open));
    }

    #[test]
    fn test_days_conflict_with_every_day() {
        let result = Cli::try_parse_from([
            "qdii_console",
            "tasks",
            "create",
            "--days",
            "1",
            "--every-day",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_values_rejected_by_parser() {
        assert!(Cli::try_parse_from(["qdii_console", "tasks", "create", "--time", "25:00"]).is_err());
        assert!(Cli::try_parse_from(["qdii_console", "data", "filter", "--premium-min", "-1"]).is_err());
        assert!(Cli::try_parse_from(["qdii_console", "theme", "sepia"]).is_err());
    }

    #[test]
    fn test_shell_line_has_no_binary_name() {
        let line = ShellLine::try_parse_from(["data", "filter", "--premium-min", "2.5"]).unwrap();
        assert_eq!(
            line.command,
            Command::Data {
                action: DataCommand::Filter(FilterArgs {
                    premium_min: 2.5,
                    status: StatusFilter::All,
                })
            }
        );
    }

    #[test]
    fn test_open_form_commands() {
        let line = ShellLine::try_parse_from(["tasks", "form", "--premium-min", "3"]).unwrap();
        assert_eq!(
            line.command,
            Command::Tasks {
                action: TaskCommand::Form(TaskFormArgs {
                    premium_min: Some("3".to_string()),
                    ..TaskFormArgs::default()
                })
            }
        );

        let line = ShellLine::try_parse_from(["tasks", "submit"]).unwrap();
        assert_eq!(
            line.command,
            Command::Tasks {
                action: TaskCommand::Submit
            }
        );
        assert!(ShellLine::try_parse_from(["tasks", "cancel", "7"]).is_err());
    }

    #[test]
    fn test_task_args_fill_editor() {
        let mut editor = TaskEditor::new();
        editor.open_new();
        TaskFormArgs {
            every_day: true,
            recipients: Some("a@b.cn".to_string()),
            premium_min: Some("1.5".to_string()),
            ..TaskFormArgs::default()
        }
        .apply(&mut editor);

        assert!(editor.form().every_day());
        assert_eq!(editor.form().recipients, "a@b.cn");
        assert_eq!(editor.form().execution_time, "09:00");
    }
}
