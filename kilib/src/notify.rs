//! Progress and result notifications.
//!
//! Long operations report through a [`Listener`] instead of returning
//! everything at the end. Every notification is also emitted as a `tracing`
//! event, so a caller that passes [`Silent`] still gets logs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoticeKind {
    /// Free-form progress message.
    Log,
    /// Pass/fail line of a check or repair.
    CheckResult,
    DuplicateLibrary { name: String },
    LibraryError { level: Level, name: String },
    RowUpdated { level: Level, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub kind: NoticeKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(severity: Severity, kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            path: None,
            timestamp: Utc::now(),
        }
    }

    pub fn log(severity: Severity, message: impl Into<String>) -> Self {
        Self::new(severity, NoticeKind::Log, message)
    }

    pub fn passed(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, NoticeKind::CheckResult, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, NoticeKind::CheckResult, message)
    }

    /// Warning for a file that could not be read or written. The operation
    /// skips that file and carries on.
    pub fn file_access(action: &str, path: &Path, error: &std::io::Error) -> Self {
        Self::log(
            Severity::Warning,
            format!("Cannot {} '{}': {}", action, path.display(), error),
        )
        .with_path(path)
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    pub fn is_result(&self) -> bool {
        self.kind == NoticeKind::CheckResult
    }
}

pub trait Listener {
    fn notify(&mut self, notification: Notification);
}

impl Listener for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

impl<F: FnMut(Notification)> Listener for F {
    fn notify(&mut self, notification: Notification) {
        self(notification)
    }
}

/// Drops notifications; the tracing events still fire.
pub struct Silent;

impl Listener for Silent {
    fn notify(&mut self, _notification: Notification) {}
}

pub(crate) fn emit(listener: &mut dyn Listener, notification: Notification) {
    let message = notification.message.as_str();
    match notification.severity {
        Severity::Debug => tracing::debug!(kind = ?notification.kind, "{}", message),
        Severity::Info => tracing::info!(kind = ?notification.kind, "{}", message),
        Severity::Warning => tracing::warn!(kind = ?notification.kind, "{}", message),
        Severity::Error => tracing::error!(kind = ?notification.kind, "{}", message),
    }
    listener.notify(notification);
}
