mod common;

use axum::{routing::get, Json, Router};
use clap::Parser;
use common::{spawn_backend, task_json, Captured};
use qdii_console::cli::ShellLine;
use qdii_console::config::{Config, ThemePreference};
use qdii_console::cooldown::Action;
use qdii_console::error::ConsoleError;
use qdii_console::notify::MemoryNotifier;
use qdii_console::shell::Console;
use qdii_console::tasks::EditorState;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn line(text: &str) -> qdii_console::cli::Command {
    ShellLine::try_parse_from(text.split_whitespace())
        .expect("valid shell line")
        .command
}

#[tokio::test]
async fn test_shell_lines_dispatch_against_one_console() {
    let router = Router::new()
        .route(
            "/api/tasks",
            get(|| async {
                Json(json!({
                    "status": "success",
                    "tasks": [task_json(3, "0 9 * * 1,2,3,4,5", json!(true))]
                }))
            }),
        )
        .route(
            "/api/tasks/:id/logs",
            get(|| async { Json(json!({"status": "success", "logs": []})) }),
        );
    let Some(base) = spawn_backend(router).await else {
        return;
    };

    let dir = tempdir().expect("Failed to create temp dir");
    let config = Config {
        server_url: base,
        ..Config::default()
    };
    let notifier = Arc::new(MemoryNotifier::new());
    let mut console = Console::with_notifier(
        config,
        dir.path().join("qdii-console.json5"),
        notifier.clone(),
        CancellationToken::new(),
    )
    .unwrap();

    let list = console.dispatch(line("tasks list")).await.unwrap();
    assert!(list.contains("#3  every Mon、Tue and 3 more 09:00  [running]"));

    let logs = console.dispatch(line("tasks logs 3")).await.unwrap();
    assert!(logs.contains("No execution logs yet"));

    let shown = console.dispatch(line("tasks show 3")).await.unwrap();
    assert!(shown.contains("days:        Mon, Tue, Wed, Thu, Fri"));
    assert!(!console.editor().is_open());

    // Validation fails locally: no day selected on a blank form.
    let created = console
        .dispatch(line("tasks create --recipients ops@example.com"))
        .await;
    assert!(created.is_err());
    assert_eq!(
        notifier.toasts().last().unwrap().message,
        "Please select at least one day"
    );
}

#[tokio::test]
async fn test_theme_command_persists_preference() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("qdii-console.json5");
    let mut console = Console::with_notifier(
        Config::default(),
        path.clone(),
        Arc::new(MemoryNotifier::new()),
        CancellationToken::new(),
    )
    .unwrap();

    let output = console.dispatch(line("theme dark")).await.unwrap();
    assert_eq!(output, "Theme: dark (dark)");
    assert_eq!(Config::load(&path).unwrap().theme, ThemePreference::Dark);

    let current = console.dispatch(line("theme")).await.unwrap();
    assert!(current.starts_with("Theme: dark"));
}

#[tokio::test]
async fn test_rejected_save_keeps_form_for_correction() {
    let saved = Captured::default();
    let router = Router::new().route(
        "/api/tasks",
        get(|| async {
            Json(json!({
                "status": "success",
                "tasks": [task_json(3, "0 9 * * 1,2,3,4,5", json!(true))]
            }))
        })
        .post({
            let saved = saved.clone();
            move |Json(body): Json<Value>| async move {
                let refused = body["recipients"]
                    .as_str()
                    .is_some_and(|recipients| recipients.contains("blocked@"));
                saved.store(body);
                if refused {
                    Json(json!({"status": "error", "message": "Recipient refused"}))
                } else {
                    Json(json!({"status": "success", "message": "Task updated"}))
                }
            }
        }),
    );
    let Some(base) = spawn_backend(router).await else {
        return;
    };

    let dir = tempdir().expect("Failed to create temp dir");
    let config = Config {
        server_url: base,
        ..Config::default()
    };
    let notifier = Arc::new(MemoryNotifier::new());
    let mut console = Console::with_notifier(
        config,
        dir.path().join("qdii-console.json5"),
        notifier.clone(),
        CancellationToken::new(),
    )
    .unwrap();
    console.set_interactive(true);

    let rejected = console
        .dispatch(line("tasks edit 3 --recipients blocked@example.com"))
        .await;
    assert!(matches!(rejected, Err(ConsoleError::Application(_))));
    assert_eq!(
        console.editor().state(),
        &EditorState::EditingWithError {
            error: "Recipient refused".to_string()
        }
    );
    assert_eq!(notifier.toasts().last().unwrap().title, "Form kept open");

    let form = console
        .dispatch(line("tasks form --recipients ops@example.com"))
        .await
        .unwrap();
    assert!(form.starts_with("Task #3\n"));
    assert!(form.contains("recipients:  ops@example.com"));
    assert!(form.contains("last error:  Recipient refused"));

    // The save cooldown from the rejected attempt has to pass first.
    tokio::time::sleep(Action::Save.window()).await;
    let list = console.dispatch(line("tasks submit")).await.unwrap();
    assert!(list.contains("#3"));
    assert!(!console.editor().is_open());

    let body = saved.take().expect("save request received");
    assert_eq!(body["id"], 3);
    assert_eq!(body["recipients"], "ops@example.com");
    assert_eq!(body["cron_expression"], "0 9 * * 1,2,3,4,5");

    let nothing_open = console.dispatch(line("tasks cancel")).await;
    assert!(matches!(nothing_open, Err(ConsoleError::Validation(_))));
}

#[tokio::test]
async fn test_one_shot_save_failure_closes_form() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut console = Console::with_notifier(
        Config::default(),
        dir.path().join("qdii-console.json5"),
        Arc::new(MemoryNotifier::new()),
        CancellationToken::new(),
    )
    .unwrap();

    let created = console
        .dispatch(line("tasks create --every-day --recipients ops@example.com --premium-min x"))
        .await;
    assert!(matches!(created, Err(ConsoleError::Validation(_))));
    assert!(!console.editor().is_open());
}
