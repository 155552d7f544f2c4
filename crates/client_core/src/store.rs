//! Reducers for the read-only lists: active documents and the audit trail.
//!
//! Each state follows pending → fulfilled | rejected. The controller-free
//! shape keeps them testable without a server.

use chrono::{DateTime, Utc};
use shared::{
    domain::{ActiveRfiSummary, AuditEvent},
    error::ApiError,
};

const TIME_BUCKETS: [(&str, i64); 6] = [
    ("year", 31_536_000),
    ("month", 2_592_000),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RfiListState {
    pub loading: bool,
    pub error: Option<ApiError>,
    pub items: Vec<ActiveRfiSummary>,
}

impl RfiListState {
    pub fn pending(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn fulfilled(&mut self, items: Vec<ActiveRfiSummary>) {
        self.loading = false;
        self.error = None;
        self.items = items;
    }

    /// Keeps the previous list so a transient failure does not blank the
    /// view.
    pub fn rejected(&mut self, error: ApiError) {
        self.loading = false;
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditTrailState {
    pub loading: bool,
    pub error: Option<ApiError>,
    pub events: Vec<AuditEvent>,
}

impl AuditTrailState {
    pub fn pending(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn fulfilled(&mut self, mut events: Vec<AuditEvent>) {
        sort_newest_first(&mut events);
        self.loading = false;
        self.error = None;
        self.events = events;
    }

    pub fn rejected(&mut self, error: ApiError) {
        self.loading = false;
        self.error = Some(error);
        self.events.clear();
    }
}

pub fn sort_newest_first(events: &mut [AuditEvent]) {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Coarse relative time, e.g. `3 hours ago`. Future timestamps read as
/// `just now`.
pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - timestamp).num_seconds();
    TIME_BUCKETS
        .iter()
        .find_map(|(label, size)| {
            let count = seconds / size;
            (count >= 1).then(|| {
                let plural = if count > 1 { "s" } else { "" };
                format!("{count} {label}{plural} ago")
            })
        })
        .unwrap_or_else(|| "just now".to_string())
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
