//! Named health reports consumed by an external health aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
    Info,
}

/// One named slot in a component's health output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub name: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl HealthReport {
    pub fn info(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Info,
            details: Some(details.into()),
            updated_at: Some(Utc::now()),
        }
    }
}

/// Implemented by long-lived components that expose health reports.
pub trait HealthReporter: Send + Sync {
    fn name(&self) -> &str;

    fn health(&self) -> Vec<HealthReport>;
}

#[derive(Clone, Debug)]
struct TrackedError {
    message: String,
    at: DateTime<Utc>,
}

/// Remembers the most recent error of a component.
///
/// Tracking `None` clears the slot so a recovered component reports healthy
/// again.
#[derive(Default)]
pub struct ErrorTracker {
    last: Mutex<Option<TrackedError>>,
}

impl fmt::Debug for ErrorTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTracker")
            .field("last", &self.snapshot().map(|err| err.message))
            .finish()
    }
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_error<E: fmt::Display>(&self, err: Option<&E>) {
        let next = err.map(|err| TrackedError {
            message: err.to_string(),
            at: Utc::now(),
        });
        let mut guard = self.last.lock().unwrap_or_else(|p| p.into_inner());
        *guard = next;
    }

    pub fn last_error(&self) -> Option<String> {
        self.snapshot().map(|err| err.message)
    }

    /// Renders the tracked state as a report with the given slot name.
    pub fn report(&self, name: &str) -> HealthReport {
        match self.snapshot() {
            Some(err) => HealthReport {
                name: name.to_string(),
                status: HealthStatus::Error,
                details: Some(err.message),
                updated_at: Some(err.at),
            },
            None => HealthReport {
                name: name.to_string(),
                status: HealthStatus::Ok,
                details: None,
                updated_at: None,
            },
        }
    }

    fn snapshot(&self) -> Option<TrackedError> {
        self.last
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
