//! Notification channel between views and the surrounding shell.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::NotificationConfig;
use crate::types::{LogMessage, NotificationId};

/// Notification severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity, source: Option<&str>);
}

impl<F> Notifier for F
where
    F: Fn(&str, Severity, Option<&str>) + Send + Sync,
{
    fn notify(&self, message: &str, severity: Severity, source: Option<&str>) {
        self(message, severity, source)
    }
}

/// Notifier that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str, _severity: Severity, _source: Option<&str>) {}
}

/// A retained notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: LogMessage,
    pub severity: Severity,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ring buffer of recent notifications with auto-expiry for display.
pub struct NotificationCenter<C: Clock> {
    clock: C,
    config: NotificationConfig,
    inner: Mutex<CenterInner>,
}

struct CenterInner {
    entries: VecDeque<Notification>,
    next_id: NotificationId,
}

impl<C: Clock> NotificationCenter<C> {
    pub fn new(clock: C, config: NotificationConfig) -> Self {
        Self {
            clock,
            config,
            inner: Mutex::new(CenterInner {
                entries: VecDeque::new(),
                next_id: 1,
            }),
        }
    }

    /// Record a notification and return its id.
    pub fn push(&self, message: &str, severity: Severity, source: Option<&str>) -> NotificationId {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("notification center poisoned");
        let id = inner.next_id;
        inner.next_id = inner.next_id.saturating_add(1);
        inner.entries.push_front(Notification {
            id,
            message: message.to_string(),
            severity,
            source: source.map(str::to_string),
            created_at: now,
        });
        let retention = self.config.retention.max(1);
        inner.entries.truncate(retention);
        id
    }

    /// Most-recent unexpired notifications, newest first, capped at the visible limit.
    pub fn visible(&self) -> Vec<Notification> {
        let cutoff = self.expiry_cutoff();
        let inner = self.inner.lock().expect("notification center poisoned");
        inner
            .entries
            .iter()
            .filter(|entry| entry.created_at > cutoff)
            .take(self.config.visible_limit)
            .cloned()
            .collect()
    }

    /// Every retained notification, newest first.
    pub fn history(&self) -> Vec<Notification> {
        let inner = self.inner.lock().expect("notification center poisoned");
        inner.entries.iter().cloned().collect()
    }

    /// Dismiss a notification; unknown ids are ignored.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let mut inner = self.inner.lock().expect("notification center poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.id != id);
        inner.entries.len() != before
    }

    /// Drop notifications older than the auto-dismiss window; returns how many were removed.
    pub fn expire(&self) -> usize {
        let cutoff = self.expiry_cutoff();
        let mut inner = self.inner.lock().expect("notification center poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.created_at > cutoff);
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("notification center poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expiry_cutoff(&self) -> DateTime<Utc> {
        let window = Duration::from_std(self.config.auto_dismiss).unwrap_or(Duration::zero());
        self.clock.now() - window
    }
}

impl<C: Clock> Notifier for NotificationCenter<C> {
    fn notify(&self, message: &str, severity: Severity, source: Option<&str>) {
        self.push(message, severity, source);
    }
}
