use super::*;
use chrono::{Duration, TimeZone};
use serde_json::json;
use shared::error::ErrorCode;

fn events() -> Vec<AuditEvent> {
    serde_json::from_value(json!([
        {"id": "a", "timestamp": "2025-07-10T08:00:00", "actor": "AI", "action": "Generated draft", "question": "Q1", "type": "AI"},
        {"id": "b", "timestamp": "2025-07-11T09:30:00Z", "actor": "Alice", "action": "Edited", "question": "Q1", "type": "EDIT"},
        {"id": "c", "timestamp": "2025-07-10T12:00:00Z", "actor": "Bob", "action": "Completed", "question": "", "type": "COMPLETE"}
    ]))
    .expect("events")
}

#[test]
fn audit_trail_is_sorted_newest_first() {
    let mut state = AuditTrailState::default();
    state.pending();
    assert!(state.loading);

    state.fulfilled(events());
    let ids: Vec<&str> = state.events.iter().map(|event| event.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert!(!state.loading);
}

#[test]
fn audit_trail_rejection_clears_events() {
    let mut state = AuditTrailState::default();
    state.fulfilled(events());
    state.pending();
    state.rejected(ApiError::new(ErrorCode::Transport, "Network error: No response from server"));
    assert!(state.events.is_empty());
    assert_eq!(
        state.error.map(|error| error.code),
        Some(ErrorCode::Transport)
    );
}

#[test]
fn active_list_keeps_items_on_failure() {
    let items: Vec<ActiveRfiSummary> = serde_json::from_value(json!([
        {"id": 5, "title": "Acme", "status": "IN_PROGRESS", "progress": 30}
    ]))
    .expect("items");

    let mut state = RfiListState::default();
    state.pending();
    state.fulfilled(items);
    state.pending();
    state.rejected(ApiError::new(ErrorCode::Status, "Internal server error (500)"));

    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id.as_str(), "5");
    assert!(state.error.is_some());
    assert!(!state.loading);
}

#[test]
fn time_ago_uses_the_largest_whole_unit() {
    let now = Utc.with_ymd_and_hms(2025, 7, 11, 12, 0, 0).single().expect("now");
    assert_eq!(time_ago(now, now), "just now");
    assert_eq!(time_ago(now + Duration::seconds(30), now), "just now");
    assert_eq!(time_ago(now - Duration::seconds(1), now), "1 second ago");
    assert_eq!(time_ago(now - Duration::seconds(59), now), "59 seconds ago");
    assert_eq!(time_ago(now - Duration::minutes(2), now), "2 minutes ago");
    assert_eq!(time_ago(now - Duration::hours(1), now), "1 hour ago");
    assert_eq!(time_ago(now - Duration::days(3), now), "3 days ago");
    assert_eq!(time_ago(now - Duration::days(45), now), "1 month ago");
    assert_eq!(time_ago(now - Duration::days(800), now), "2 years ago");
}
