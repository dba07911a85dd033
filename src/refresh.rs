//! Refresh progress subscription.
//!
//! A refresh POSTs the filters to `/refresh` while following
//! `/refresh-status`, a `text/event-stream` of `{status, message}` events.
//! The subscription ends on the first terminal event, on stream end, or when
//! the watchdog sees no event for longer than [`SILENCE_LIMIT`]. The trigger
//! then counts down before another refresh may start.

use crate::api::{ApiClient, RefreshOutcome};
use crate::cooldown::Action;
use crate::data;
use crate::error::{ConsoleError, Result};
use crate::models::{DataRow, FilterParams, RefreshEvent, RefreshEventStatus};
use crate::notify::{Notifier, Severity, Toast};
use crate::views::{render, DataTableView, RefreshStatusView, RefreshSummaryView};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the watchdog looks at the time of the last event
pub const WATCHDOG_TICK: Duration = Duration::from_secs(2);

/// Silence after which the subscription is abandoned
pub const SILENCE_LIMIT: Duration = Duration::from_secs(10);

/// Lines kept in the rolling progress log
pub const LOG_CAPACITY: usize = 10;

/// Delay between a completed refresh and the table reload
pub const RELOAD_DELAY: Duration = Duration::from_millis(1500);

/// Most recent progress messages, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressLog {
    lines: VecDeque<String>,
}

impl ProgressLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > LOG_CAPACITY {
            self.lines.pop_front();
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// How a progress subscription ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { message: Option<String> },
    Failed { message: String },
    TimedOut,
    Disconnected,
}

impl StreamOutcome {
    #[must_use]
    pub fn headline(&self) -> String {
        match self {
            StreamOutcome::Completed { message } => message
                .clone()
                .unwrap_or_else(|| "Refresh completed".to_string()),
            StreamOutcome::Failed { message } => format!("Refresh failed: {message}"),
            StreamOutcome::TimedOut => "Refresh progress timed out".to_string(),
            StreamOutcome::Disconnected => "Lost connection to refresh progress".to_string(),
        }
    }

    fn toast(&self) -> Toast {
        match self {
            StreamOutcome::Completed { .. } => {
                Toast::new("Refresh completed", self.headline(), Severity::Success)
            }
            StreamOutcome::Failed { message } => {
                Toast::new("Refresh failed", message.clone(), Severity::Danger)
            }
            StreamOutcome::TimedOut => Toast::new(
                "Refresh timed out",
                format!(
                    "No progress received for {} seconds",
                    SILENCE_LIMIT.as_secs()
                ),
                Severity::Warning,
            ),
            StreamOutcome::Disconnected => Toast::new(
                "Connection lost",
                "The refresh progress stream closed unexpectedly",
                Severity::Danger,
            ),
        }
    }
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Yields the joined `data:` payload of every complete event. Comments and
/// other fields are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the payloads of the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(payload) = event_data(&String::from_utf8_lossy(&block)) {
                payloads.push(payload);
            }
        }
        payloads
    }
}

fn event_data(block: &str) -> Option<String> {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

/// Follow an event stream until it ends, fails, goes quiet or reports a
/// terminal status. Every `running` message is appended to `log` and passed
/// to `on_progress`.
pub async fn follow<S, B, E>(
    stream: S,
    log: &mut ProgressLog,
    mut on_progress: impl FnMut(&str),
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = SseDecoder::new();
    let mut watchdog = tokio::time::interval(WATCHDOG_TICK);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_event = Instant::now();

    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for payload in decoder.push(bytes.as_ref()) {
                        last_event = Instant::now();
                        let event: RefreshEvent = match serde_json::from_str(&payload) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!("Ignoring undecodable refresh event {payload:?}: {e}");
                                continue;
                            }
                        };
                        debug!("Refresh event: {event:?}");

                        match event.status {
                            RefreshEventStatus::Running => {
                                if let Some(message) = event.message {
                                    on_progress(&message);
                                    log.push(message);
                                }
                            }
                            RefreshEventStatus::Completed => {
                                return StreamOutcome::Completed { message: event.message };
                            }
                            RefreshEventStatus::Error => {
                                return StreamOutcome::Failed {
                                    message: event
                                        .message
                                        .unwrap_or_else(|| "Unknown error".to_string()),
                                };
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("Refresh progress stream failed: {e}");
                    return StreamOutcome::Disconnected;
                }
                None => {
                    debug!("Refresh progress stream ended");
                    return StreamOutcome::Disconnected;
                }
            },
            _ = watchdog.tick() => {
                if last_event.elapsed() > SILENCE_LIMIT {
                    warn!("No refresh event for {:?}, giving up", last_event.elapsed());
                    return StreamOutcome::TimedOut;
                }
            }
        }
    }
}

/// State of the refresh trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Running,
    CoolingDown { remaining_secs: u64 },
}

impl TriggerState {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            TriggerState::Idle => "Refresh data".to_string(),
            TriggerState::Running => "Refreshing...".to_string(),
            TriggerState::CoolingDown { remaining_secs } => {
                format!("cooling down ({remaining_secs}s)")
            }
        }
    }
}

/// The refresh button: one refresh at a time, then a countdown.
///
/// State changes are published on a watch channel so a UI can follow the
/// label.
pub struct RefreshTrigger {
    state: Arc<watch::Sender<TriggerState>>,
    cooldown: Duration,
}

impl Default for RefreshTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cooldown(Action::Refresh.window())
    }

    #[must_use]
    pub fn with_cooldown(cooldown: Duration) -> Self {
        let (state, _) = watch::channel(TriggerState::Idle);
        Self {
            state: Arc::new(state),
            cooldown,
        }
    }

    #[must_use]
    pub fn state(&self) -> TriggerState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TriggerState> {
        self.state.subscribe()
    }

    /// Move to `Running` if idle; otherwise return the state that blocks it.
    ///
    /// # Errors
    ///
    /// Returns the current state when a refresh is running or cooling down
    pub fn try_start(&self) -> std::result::Result<(), TriggerState> {
        let current = self.state();
        if current != TriggerState::Idle {
            return Err(current);
        }
        self.state.send_replace(TriggerState::Running);
        Ok(())
    }

    /// Enter `CoolingDown` and count down once per second back to `Idle`.
    ///
    /// The countdown stops early, leaving the state as is, when `cancel`
    /// fires.
    pub fn start_cooldown(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut remaining = self.cooldown.as_secs();
        let state = self.state.clone();
        state.send_replace(if remaining == 0 {
            TriggerState::Idle
        } else {
            TriggerState::CoolingDown {
                remaining_secs: remaining,
            }
        });

        tokio::spawn(async move {
            while remaining > 0 {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Refresh countdown cancelled with {remaining}s left");
                        return;
                    }
                    () = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
                remaining -= 1;
                state.send_replace(if remaining == 0 {
                    TriggerState::Idle
                } else {
                    TriggerState::CoolingDown {
                        remaining_secs: remaining,
                    }
                });
            }
            debug!("Refresh trigger is idle again");
        })
    }
}

/// Everything a finished refresh produced
#[derive(Debug)]
pub struct RefreshReport {
    pub outcome: StreamOutcome,
    pub log: ProgressLog,
    /// Response of `POST /refresh`, when it succeeded
    pub summary: Option<RefreshOutcome>,
    /// Table reloaded after a completed refresh
    pub rows: Option<Vec<DataRow>>,
}

impl RefreshReport {
    /// Render the final status, the refresh summary and the freshest table.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to render
    pub fn render(&self) -> Result<String> {
        let headline = self.outcome.headline();
        let mut text = render(&RefreshStatusView {
            headline: &headline,
            lines: self.log.lines().collect(),
        })?;

        if let Some(summary) = &self.summary {
            text.push('\n');
            text.push_str(&render(&RefreshSummaryView::new(summary))?);
        }

        let rows = self
            .rows
            .as_deref()
            .or_else(|| self.summary.as_ref().map(|summary| summary.rows.as_slice()));
        if let Some(rows) = rows {
            text.push('\n');
            text.push_str(&render(&DataTableView::new(rows))?);
        }

        Ok(text)
    }
}

/// Run one refresh end to end.
///
/// Refused with a warning toast while the trigger is busy or the refresh
/// cooldown is armed. Otherwise the POST and the progress subscription run
/// together; every outcome ends in the trigger countdown, and a completed
/// refresh reloads the table after [`RELOAD_DELAY`].
///
/// # Errors
///
/// Returns [`ConsoleError::CooldownActive`] when refused
pub async fn run(
    api: &ApiClient,
    notifier: &dyn Notifier,
    trigger: &RefreshTrigger,
    params: &FilterParams,
    cancel: &CancellationToken,
    on_progress: impl FnMut(&str),
) -> Result<RefreshReport> {
    let blocked = match api.cooldowns().remaining(Action::Refresh) {
        Some(left) => Some(TriggerState::CoolingDown {
            remaining_secs: left.as_secs() + u64::from(left.subsec_nanos() > 0),
        }),
        None => trigger.try_start().err(),
    };
    if let Some(state) = blocked {
        let message = match state {
            TriggerState::CoolingDown { remaining_secs } => {
                format!("Please wait {remaining_secs} seconds before refreshing again")
            }
            _ => "A refresh is already running".to_string(),
        };
        notifier.notify(Toast::new("Refresh unavailable", message, Severity::Warning));
        return Err(ConsoleError::CooldownActive(Action::Refresh));
    }

    info!("Starting data refresh");
    let mut log = ProgressLog::new();
    let (summary, outcome) = tokio::join!(
        data::refresh(api, notifier, params),
        subscribe(api, &mut log, on_progress)
    );
    info!("Refresh ended: {outcome:?}");

    notifier.notify(outcome.toast());
    trigger.start_cooldown(cancel.clone());

    let rows = if matches!(outcome, StreamOutcome::Completed { .. }) {
        tokio::time::sleep(RELOAD_DELAY).await;
        data::apply_filters(api, notifier, params).await.ok()
    } else {
        None
    };

    Ok(RefreshReport {
        outcome,
        log,
        summary: summary.ok(),
        rows,
    })
}

async fn subscribe(
    api: &ApiClient,
    log: &mut ProgressLog,
    on_progress: impl FnMut(&str),
) -> StreamOutcome {
    match api.open_refresh_stream().await {
        Ok(response) => follow(response.bytes_stream(), log, on_progress).await,
        Err(e) => {
            warn!("Could not subscribe to refresh progress: {e}");
            StreamOutcome::Disconnected
        }
    }
}
