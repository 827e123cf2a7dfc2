use super::*;

/// Tracks one partition's notion of event time.
///
/// Stream time is `max observed timestamp - grace period`. The grace period
/// bounds how far out of order records may arrive: anything with a timestamp
/// behind the current stream time is late beyond tolerance and rejected.
///
/// One tracker exists per partition and is owned by that partition's
/// pipeline; partitions never share clocks.
#[derive(Debug, Clone)]
pub struct StreamTimeTracker {
    grace_ms: i64,
    max_seen: EventTime,
}

impl StreamTimeTracker {
    /// Create a tracker with the given grace period.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace_ms: grace.as_millis() as i64,
            max_seen: EVENT_TIME_MIN,
        }
    }

    /// Validate a record timestamp and advance the max observed timestamp.
    ///
    /// Returns [`AggregateError::InvalidTimestamp`] when the timestamp is
    /// behind the lateness boundary; the tracker is left unchanged in that
    /// case so one late record cannot move the clock.
    pub fn observe(&mut self, timestamp: EventTime) -> Result<()> {
        let boundary = self.lateness_boundary();
        if timestamp < boundary {
            return Err(AggregateError::InvalidTimestamp {
                timestamp,
                boundary,
            });
        }
        if timestamp > self.max_seen {
            self.max_seen = timestamp;
        }
        Ok(())
    }

    /// The oldest timestamp still accepted. `EVENT_TIME_MIN` until the first
    /// record is observed.
    pub fn lateness_boundary(&self) -> EventTime {
        if self.max_seen == EVENT_TIME_MIN {
            return EVENT_TIME_MIN;
        }
        self.max_seen.saturating_sub(self.grace_ms)
    }

    /// Current stream time: max observed timestamp minus the grace period.
    ///
    /// Windows whose end is at or before this point can no longer receive
    /// records and are safe to flush.
    pub fn stream_time(&self) -> EventTime {
        self.lateness_boundary()
    }

    /// The highest record timestamp observed so far.
    pub fn max_seen(&self) -> EventTime {
        self.max_seen
    }
}
