use super::*;

/// Maps a record's event-time timestamp to the windows it belongs to.
///
/// Assignment is a pure function of the assigner's configuration and the
/// timestamp. The overlap policy is fixed per deployment by the assigner
/// choice, never per record:
///
/// - [`TumblingWindows`] — fixed-size, non-overlapping; exactly one window
/// - [`HoppingWindows`]  — fixed-size, advancing by less than the size;
///   every window whose interval contains the timestamp
///
/// Lateness is not the assigner's concern: the pipeline rejects records
/// behind the grace boundary before assignment (see `time::StreamTimeTracker`).
pub trait WindowAssigner: Send + Sync {
    /// Return the windows that contain `timestamp`.
    fn assign(&self, timestamp: EventTime) -> Vec<WindowId>;
}

// ── Tumbling ──────────────────────────────────────────────────────────────────

/// Fixed-size, non-overlapping windows aligned to multiples of `size`.
#[derive(Debug, Clone)]
pub struct TumblingWindows {
    size_ms: i64,
    offset_ms: i64,
}

impl TumblingWindows {
    /// Create tumbling windows of the given `size`.
    pub fn of(size: Duration) -> Self {
        Self {
            size_ms: size.as_millis() as i64,
            offset_ms: 0,
        }
    }

    /// Create tumbling windows with a non-zero alignment `offset`.
    pub fn of_with_offset(size: Duration, offset: Duration) -> Self {
        Self {
            size_ms: size.as_millis() as i64,
            offset_ms: offset.as_millis() as i64,
        }
    }
}

impl WindowAssigner for TumblingWindows {
    fn assign(&self, timestamp: EventTime) -> Vec<WindowId> {
        let start = timestamp - (timestamp - self.offset_ms).rem_euclid(self.size_ms);
        vec![WindowId::new(start, start + self.size_ms)]
    }
}

// ── Hopping ───────────────────────────────────────────────────────────────────

/// Fixed-size windows advancing every `advance`, `advance < size` produces
/// overlaps: each timestamp belongs to `ceil(size / advance)` windows.
#[derive(Debug, Clone)]
pub struct HoppingWindows {
    size_ms: i64,
    advance_ms: i64,
    offset_ms: i64,
}

impl HoppingWindows {
    /// Create hopping windows of the given `size` advancing every `advance`.
    pub fn of(size: Duration, advance: Duration) -> Self {
        Self {
            size_ms: size.as_millis() as i64,
            advance_ms: advance.as_millis() as i64,
            offset_ms: 0,
        }
    }
}

impl WindowAssigner for HoppingWindows {
    fn assign(&self, timestamp: EventTime) -> Vec<WindowId> {
        // Walk back from the last window start by `advance` until no window
        // covers the timestamp.
        let last_start = timestamp - (timestamp - self.offset_ms).rem_euclid(self.advance_ms);
        let mut windows = Vec::new();
        let mut start = last_start;
        while start > timestamp - self.size_ms {
            windows.push(WindowId::new(start, start + self.size_ms));
            start -= self.advance_ms;
        }
        windows
    }
}
