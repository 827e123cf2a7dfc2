//! Punctuation: scheduled flushes of completed windows.
//!
//! The punctuator runs on a cadence distinct from record arrival, either a
//! wall-clock interval or every N processed records (or both). On each
//! firing it advances the partition's stream time, scans the store for
//! windows that can no longer receive records, and emits them.
//!
//! ## Crash sequencing
//!
//! Per expired entry the order is: emit to the sink (ack), then persist
//! `emitted = true`, then tombstone. A crash before the sink ack replays
//! the entry as `emitted = false` and re-emits it. Delivery is
//! at-least-once; duplicates are possible unless the sink deduplicates.
//! Accepted records can never reach an emitted window again: a window only
//! expires once the lateness boundary has passed its end.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::aggregate::Aggregator;
use crate::codec::RecordCodec;
use crate::error::Result;
use crate::sink::OutputSink;
use crate::state::StateStore;
use crate::time::StreamTimeTracker;

/// Flush scheduler for one partition.
pub struct Punctuator {
    interval: Option<Duration>,
    every_n_records: Option<u64>,
    records_since_flush: u64,
    last_flush: Instant,
}

impl Punctuator {
    pub fn new(interval: Option<Duration>, every_n_records: Option<u64>) -> Self {
        Self {
            interval,
            every_n_records,
            records_since_flush: 0,
            last_flush: Instant::now(),
        }
    }

    /// Note one processed record. Returns true when the record-count cadence
    /// says a flush is due.
    pub fn on_record(&mut self) -> bool {
        self.records_since_flush += 1;
        match self.every_n_records {
            Some(n) => self.records_since_flush >= n,
            None => false,
        }
    }

    /// True when the wall-clock cadence says a flush is due.
    pub fn is_due(&self) -> bool {
        match self.interval {
            Some(interval) => self.last_flush.elapsed() >= interval,
            None => false,
        }
    }

    /// Emit every window that has expired by the partition's stream time.
    ///
    /// Returns the number of emissions acknowledged by the sink.
    pub fn flush<T, ACC, OUT>(
        &mut self,
        store: &mut dyn StateStore,
        tracker: &StreamTimeTracker,
        aggregator: &Aggregator<T, ACC, OUT>,
        out_codec: &dyn RecordCodec<OUT>,
        sink: &mut dyn OutputSink,
    ) -> Result<usize>
    where
        ACC: Serialize + DeserializeOwned,
    {
        self.records_since_flush = 0;
        self.last_flush = Instant::now();

        let stream_time = tracker.stream_time();
        let mut emitted = 0usize;
        for key in store.scan_expired(stream_time) {
            let Some(mut state) = store.get(&key)? else {
                continue;
            };
            if !state.emitted {
                let result = aggregator.result_for(&key, &state)?;
                let bytes = out_codec.encode(&result)?;
                sink.emit(&key.business_key, &bytes)?;
                tracing::debug!(
                    window = %key.window,
                    "emitted aggregate for key {:?}",
                    String::from_utf8_lossy(&key.business_key)
                );
                state.emitted = true;
                store.put(key.clone(), state)?;
                emitted += 1;
            }
            store.delete(&key)?;
        }
        Ok(emitted)
    }
}
