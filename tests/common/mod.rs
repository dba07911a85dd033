#![allow(dead_code)]

use axum::Router;
use qdii_console::api::ApiClient;
use qdii_console::notify::MemoryNotifier;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `router` on a free local port and return its base URL.
///
/// Returns `None` when the sandbox forbids binding, so the test can skip.
pub async fn spawn_backend(router: Router) -> Option<String> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            eprintln!("Skipping backend test because binding a local port failed: {err}");
            return None;
        }
        Err(err) => panic!("Failed to bind mock backend: {err}"),
    };
    let address = listener
        .local_addr()
        .expect("Failed to get local address of listener");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Mock backend failed");
    });

    Some(format!("http://{address}"))
}

/// Client for `base_url` reporting into a fresh memory notifier.
pub fn client(base_url: &str) -> (ApiClient, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let api = ApiClient::new(base_url, Duration::from_secs(5))
        .expect("Failed to build client")
        .with_notifier(notifier.clone());
    (api, notifier)
}

/// Request counter shared with a handler
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Last JSON body received by a handler
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Option<serde_json::Value>>>);

impl Captured {
    pub fn store(&self, body: serde_json::Value) {
        *self.0.lock().expect("capture lock poisoned") = Some(body);
    }

    pub fn take(&self) -> Option<serde_json::Value> {
        self.0.lock().expect("capture lock poisoned").take()
    }
}

pub fn task_json(id: i64, cron: &str, active: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "cron_expression": cron,
        "recipients": "ops@example.com, desk@example.cn",
        "conditions": "{\"premium_min\": 2.5, \"status_filter\": \"limited\"}",
        "is_active": active,
    })
}
