//! Client-side cooldowns for mutating actions.
//!
//! Each guarded action may start at most once per window. The window starts
//! when the action is armed and ends on its own; responses never shorten it.
//! The server stays the authority, this only stops accidental double submits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Refresh,
    Save,
    Test,
    Delete,
}

impl Action {
    /// Length of the cooldown window for this action.
    #[must_use]
    pub fn window(self) -> Duration {
        match self {
            Action::Refresh => Duration::from_secs(30),
            Action::Save => Duration::from_secs(2),
            Action::Test => Duration::from_secs(3),
            Action::Delete => Duration::from_secs(1),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Refresh => f.write_str("refresh"),
            Action::Save => f.write_str("save"),
            Action::Test => f.write_str("test"),
            Action::Delete => f.write_str("delete"),
        }
    }
}

/// Expiry instants of the actions currently cooling down.
#[derive(Debug, Default)]
pub struct CooldownMap {
    until: Mutex<HashMap<Action, Instant>>,
}

impl CooldownMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the cooldown for `action` unless it is already active.
    ///
    /// Returns `true` when the caller may proceed, `false` when the action is
    /// still cooling down.
    pub fn try_begin(&self, action: Action) -> bool {
        let now = Instant::now();
        let mut guard = match self.until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(until) = guard.get(&action) {
            if *until > now {
                tracing::debug!("Action {action} rejected, cooling down");
                return false;
            }
        }

        guard.insert(action, now + action.window());
        true
    }

    /// Whether `action` is currently cooling down.
    #[must_use]
    pub fn is_active(&self, action: Action) -> bool {
        self.remaining(action).is_some()
    }

    /// Time left in the window of `action`, if any.
    #[must_use]
    pub fn remaining(&self, action: Action) -> Option<Duration> {
        let now = Instant::now();
        let guard = match self.until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .get(&action)
            .filter(|until| **until > now)
            .map(|until| *until - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_match_actions() {
        assert_eq!(Action::Refresh.window(), Duration::from_secs(30));
        assert_eq!(Action::Save.window(), Duration::from_secs(2));
        assert_eq!(Action::Test.window(), Duration::from_secs(3));
        assert_eq!(Action::Delete.window(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_window_is_rejected() {
        let map = CooldownMap::new();
        assert!(map.try_begin(Action::Save));
        assert!(!map.try_begin(Action::Save));
        assert!(map.is_active(Action::Save));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_expires_on_its_own() {
        let map = CooldownMap::new();
        assert!(map.try_begin(Action::Test));

        tokio::time::advance(Duration::from_millis(2_900)).await;
        assert!(!map.try_begin(Action::Test));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(!map.is_active(Action::Test));
        assert!(map.try_begin(Action::Test));
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_are_independent() {
        let map = CooldownMap::new();
        assert!(map.try_begin(Action::Delete));
        assert!(map.try_begin(Action::Save));
        assert!(map.try_begin(Action::Refresh));
        assert!(!map.is_active(Action::Test));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let map = CooldownMap::new();
        assert!(map.remaining(Action::Refresh).is_none());
        assert!(map.try_begin(Action::Refresh));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(map.remaining(Action::Refresh), Some(Duration::from_secs(20)));
    }
}
