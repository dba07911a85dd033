mod common;

use axum::{
    body::Body,
    http::header,
    routing::{get, post},
    Form, Json, Router,
};
use common::{client, spawn_backend, Hits};
use qdii_console::api::ApiClient;
use qdii_console::error::ConsoleError;
use qdii_console::models::{FilterParams, StatusFilter};
use qdii_console::notify::{MemoryNotifier, Severity};
use qdii_console::refresh::{self, RefreshTrigger, StreamOutcome, TriggerState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const PAGE: &str = r#"<html><body><table><tbody id="dataTableBody">
<tr><td>集思录</td><td>164824</td><td>印度基金</td><td>3.25</td><td>限量申购</td></tr>
</tbody></table></body></html>"#;

fn refresh_body() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Data refreshed",
        "timestamp": "2024-03-01 09:00:00",
        "output": "fetched 2 pages",
        "data": [
            {"来源": "集思录", "代码": 164824, "名称": "印度基金", "T-1溢价率": 3.25, "申购状态": "限量申购"}
        ]
    }))
}

/// Backend whose `/refresh` answers after `scrape_time`.
fn backend_with_scrape(events: &'static str, filter_hits: Hits, scrape_time: Duration) -> Router {
    Router::new()
        .route(
            "/refresh",
            post(move |Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form.get("status_filter").map(String::as_str), Some("limited"));
                tokio::time::sleep(scrape_time).await;
                refresh_body()
            }),
        )
        .route(
            "/refresh-status",
            get(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], events) }),
        )
        .route(
            "/",
            post(move || async move {
                filter_hits.record();
                ([(header::CONTENT_TYPE, "text/html")], PAGE)
            }),
        )
}

fn backend(events: &'static str, filter_hits: Hits) -> Router {
    backend_with_scrape(events, filter_hits, Duration::ZERO)
}

fn params() -> FilterParams {
    FilterParams {
        premium_min: 1.0,
        status_filter: StatusFilter::Limited,
    }
}

#[tokio::test]
async fn test_completed_refresh_reloads_table_and_cools_down() {
    let events = "data: {\"status\": \"running\", \"message\": \"fetching page 1\"}\n\n\
                  data: {\"status\": \"running\", \"message\": \"fetching page 2\"}\n\n\
                  data: {\"status\": \"completed\", \"message\": \"Refresh finished\"}\n\n";
    let filter_hits = Hits::default();
    let Some(base) = spawn_backend(backend(events, filter_hits.clone())).await else {
        return;
    };
    let (api, notifier) = client(&base);
    let trigger = RefreshTrigger::new();
    let cancel = CancellationToken::new();

    let mut progress = Vec::new();
    let report = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |line| {
        progress.push(line.to_string());
    })
    .await
    .unwrap();

    assert_eq!(
        report.outcome,
        StreamOutcome::Completed {
            message: Some("Refresh finished".to_string())
        }
    );
    assert_eq!(progress, vec!["fetching page 1", "fetching page 2"]);
    assert_eq!(filter_hits.count(), 1);
    assert_eq!(report.rows.as_ref().map(Vec::len), Some(1));
    assert_eq!(report.summary.as_ref().unwrap().rows[0].code, "164824");

    let text = report.render().unwrap();
    assert!(text.starts_with("Refresh finished\n  fetching page 1\n  fetching page 2\n"));
    assert!(text.contains("Data refreshed - 2024-03-01 09:00:00"));
    assert!(text.contains("集思录 | 164824 | 印度基金 | 3.25 | 限量申购 (limited)"));

    assert!(matches!(trigger.state(), TriggerState::CoolingDown { .. }));
    cancel.cancel();
}

#[tokio::test]
async fn test_error_event_fails_and_blocks_next_refresh() {
    let events = "data: {\"status\": \"running\", \"message\": \"fetching\"}\n\n\
                  data: {\"status\": \"error\", \"message\": \"source unavailable\"}\n\n";
    let filter_hits = Hits::default();
    let Some(base) = spawn_backend(backend(events, filter_hits.clone())).await else {
        return;
    };
    let (api, notifier) = client(&base);
    let trigger = RefreshTrigger::new();
    let cancel = CancellationToken::new();

    let report = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |_| {})
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        StreamOutcome::Failed {
            message: "source unavailable".to_string()
        }
    );
    assert!(report.rows.is_none());
    assert_eq!(filter_hits.count(), 0);
    assert!(trigger.state().label().starts_with("cooling down ("));

    let blocked = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |_| {}).await;
    assert!(matches!(blocked, Err(ConsoleError::CooldownActive(_))));

    let last = notifier.toasts().pop().unwrap();
    assert_eq!(last.severity, Severity::Warning);
    assert!(last.message.starts_with("Please wait"));
    cancel.cancel();
}

#[tokio::test]
async fn test_stream_closing_early_is_disconnect() {
    let events = "data: {\"status\": \"running\", \"message\": \"fetching\"}\n\n";
    let Some(base) = spawn_backend(backend(events, Hits::default())).await else {
        return;
    };
    let (api, notifier) = client(&base);
    let trigger = RefreshTrigger::new();
    let cancel = CancellationToken::new();

    let report = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |_| {})
        .await
        .unwrap();
    assert_eq!(report.outcome, StreamOutcome::Disconnected);
    assert_eq!(report.log.len(), 1);
    assert!(notifier
        .toasts()
        .iter()
        .any(|toast| toast.title == "Connection lost"));
    cancel.cancel();
}

#[tokio::test]
async fn test_scrape_longer_than_request_timeout_still_succeeds() {
    let events = "data: {\"status\": \"completed\", \"message\": \"done\"}\n\n";
    let filter_hits = Hits::default();
    let router = backend_with_scrape(events, filter_hits.clone(), Duration::from_secs(2));
    let Some(base) = spawn_backend(router).await else {
        return;
    };
    let notifier = Arc::new(MemoryNotifier::new());
    let api = ApiClient::new(&base, Duration::from_secs(1))
        .expect("Failed to build client")
        .with_notifier(notifier.clone());
    let trigger = RefreshTrigger::new();
    let cancel = CancellationToken::new();

    let report = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |_| {})
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        StreamOutcome::Completed {
            message: Some("done".to_string())
        }
    );
    let summary = report.summary.as_ref().expect("refresh response kept");
    assert_eq!(summary.output.as_deref(), Some("fetched 2 pages"));
    assert_eq!(filter_hits.count(), 1);
    assert!(notifier
        .toasts()
        .iter()
        .all(|toast| toast.severity != Severity::Danger));
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_silent_stream_times_out_then_blocks_for_full_cooldown() {
    let router = Router::new()
        .route("/refresh", post(|| async { refresh_body() }))
        .route(
            "/refresh-status",
            get(|| async {
                let first = tokio_stream::iter([Ok::<_, io::Error>(
                    "data: {\"status\": \"running\", \"message\": \"fetching\"}\n\n",
                )]);
                let body = Body::from_stream(first.chain(tokio_stream::pending()));
                ([(header::CONTENT_TYPE, "text/event-stream")], body)
            }),
        );
    let Some(base) = spawn_backend(router).await else {
        return;
    };
    let (api, notifier) = client(&base);
    let trigger = RefreshTrigger::new();
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let report = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |_| {})
        .await
        .unwrap();
    let waited = started.elapsed();

    assert_eq!(report.outcome, StreamOutcome::TimedOut);
    assert!(waited > Duration::from_secs(10), "gave up after {waited:?}");
    assert!(waited <= Duration::from_secs(13), "gave up after {waited:?}");
    assert_eq!(report.log.len(), 1);
    assert!(report.rows.is_none());
    assert_eq!(
        trigger.state(),
        TriggerState::CoolingDown { remaining_secs: 30 }
    );

    tokio::time::sleep(Duration::from_millis(29_500)).await;
    assert_eq!(
        trigger.state(),
        TriggerState::CoolingDown { remaining_secs: 1 }
    );
    let blocked = refresh::run(&api, notifier.as_ref(), &trigger, &params(), &cancel, |_| {}).await;
    assert!(matches!(blocked, Err(ConsoleError::CooldownActive(_))));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(trigger.state(), TriggerState::Idle);
    cancel.cancel();
}
