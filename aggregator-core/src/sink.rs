//! Output and dead-letter boundaries.
//!
//! The output sink is an abstract durable log: `emit` returning `Ok` means
//! the emission is acknowledged. Delivery is at-least-once end to end; a
//! sink that deduplicates by key and window upgrades observed results to
//! effectively-once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{AggregateError, Result};
use crate::types::Record;

/// Durable log accepting emitted aggregates.
pub trait OutputSink: Send {
    /// Hand one (key, value) emission to the sink. Blocks under
    /// backpressure; returns once the emission is acknowledged as durable.
    fn emit(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Destination for records that failed validation or decoding, isolating
/// bad input from the main pipeline. Offering must never fail.
pub trait DeadLetterSink: Send {
    fn offer(&mut self, record: &Record, reason: &AggregateError);

    /// Number of records dead-lettered so far.
    fn count(&self) -> u64;
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// In-memory sink recording every acknowledged emission.
///
/// With [`with_dedup`](MemorySink::with_dedup) the sink drops repeated
/// (key, value) pairs, modelling a downstream that deduplicates by
/// aggregate key and window (the window identity rides in the value).
#[derive(Clone, Default)]
pub struct MemorySink {
    emissions: Arc<Mutex<Vec<(Vec<u8>, Vec<u8>)>>>,
    seen: Arc<Mutex<HashSet<(Vec<u8>, Vec<u8>)>>>,
    dedup: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(mut self) -> Self {
        self.dedup = true;
        self
    }

    /// Snapshot of all acknowledged emissions, in emission order.
    pub fn emissions(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.emissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let pair = (key.to_vec(), value.to_vec());
        if self.dedup
            && !self
                .seen
                .lock()
                .map_err(|_| AggregateError::StoreIo("sink lock poisoned".into()))?
                .insert(pair.clone())
        {
            return Ok(());
        }
        self.emissions
            .lock()
            .map_err(|_| AggregateError::StoreIo("sink lock poisoned".into()))?
            .push(pair);
        Ok(())
    }
}

// ── ChannelSink ───────────────────────────────────────────────────────────────

/// Sink backed by a bounded channel.
///
/// The channel capacity caps in-flight emissions: when the consumer falls
/// behind, `emit` blocks the punctuator until space frees up.
#[derive(Clone)]
pub struct ChannelSink {
    sender: Sender<(Vec<u8>, Vec<u8>)>,
}

/// Create a channel sink with the given in-flight capacity, returning the
/// consuming end alongside it.
pub fn channel_sink(capacity: usize) -> (ChannelSink, Receiver<(Vec<u8>, Vec<u8>)>) {
    let (sender, receiver) = bounded(capacity);
    (ChannelSink { sender }, receiver)
}

impl OutputSink for ChannelSink {
    fn emit(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.sender
            .send((key.to_vec(), value.to_vec()))
            .map_err(|_| AggregateError::StoreIo("output sink disconnected".into()))
    }
}

// ── MemoryDeadLetter ──────────────────────────────────────────────────────────

/// In-memory dead-letter sink keeping the failed records and a running count.
#[derive(Clone, Default)]
pub struct MemoryDeadLetter {
    records: Arc<Mutex<Vec<(Record, String)>>>,
    total: Arc<AtomicU64>,
}

impl MemoryDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of dead-lettered records with their failure reasons.
    pub fn records(&self) -> Vec<(Record, String)> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl DeadLetterSink for MemoryDeadLetter {
    fn offer(&mut self, record: &Record, reason: &AggregateError) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut records) = self.records.lock() {
            records.push((record.clone(), reason.to_string()));
        }
    }

    fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
