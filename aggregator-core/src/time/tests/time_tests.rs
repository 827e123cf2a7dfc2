use super::*;

#[test]
fn test_tracker_starts_with_open_boundary() {
    let tracker = StreamTimeTracker::new(Duration::from_secs(5));
    // Nothing observed yet: everything is acceptable.
    assert_eq!(tracker.lateness_boundary(), EVENT_TIME_MIN);
    assert_eq!(tracker.stream_time(), EVENT_TIME_MIN);
}

#[test]
fn test_observe_advances_max_seen() {
    let mut tracker = StreamTimeTracker::new(Duration::from_secs(5));
    tracker.observe(10_000).unwrap();
    tracker.observe(40_000).unwrap();
    assert_eq!(tracker.max_seen(), 40_000);
    assert_eq!(tracker.stream_time(), 35_000);
}

#[test]
fn test_out_of_order_within_grace_is_accepted() {
    let mut tracker = StreamTimeTracker::new(Duration::from_secs(5));
    tracker.observe(40_000).unwrap();
    // 3s behind max, grace is 5s: still fine.
    tracker.observe(37_000).unwrap();
    // An older record must not move the clock backwards.
    assert_eq!(tracker.max_seen(), 40_000);
}

#[test]
fn test_late_beyond_grace_is_rejected() {
    let mut tracker = StreamTimeTracker::new(Duration::from_secs(5));
    tracker.observe(40_000).unwrap();
    let err = tracker.observe(34_000).unwrap_err();
    match err {
        AggregateError::InvalidTimestamp {
            timestamp,
            boundary,
        } => {
            assert_eq!(timestamp, 34_000);
            assert_eq!(boundary, 35_000);
        }
        other => panic!("expected InvalidTimestamp, got {other:?}"),
    }
    // The rejected record must not have advanced anything.
    assert_eq!(tracker.max_seen(), 40_000);
}

#[test]
fn test_timestamp_exactly_at_boundary_is_accepted() {
    let mut tracker = StreamTimeTracker::new(Duration::from_secs(5));
    tracker.observe(40_000).unwrap();
    // Exactly grace behind max: not "more than grace period behind".
    tracker.observe(35_000).unwrap();
}

#[test]
fn test_zero_grace_rejects_any_regression() {
    let mut tracker = StreamTimeTracker::new(Duration::ZERO);
    tracker.observe(1_000).unwrap();
    assert!(tracker.observe(999).is_err());
    assert_eq!(tracker.stream_time(), 1_000);
}
