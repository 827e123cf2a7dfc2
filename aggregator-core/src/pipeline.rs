//! Per-partition processing pipeline and its builder.
//!
//! One [`PartitionPipeline`] exists per owned partition and is driven by a
//! synchronous poll loop: the worker calls [`PartitionProcessor::process`]
//! once per record, in offset order. There is no framework callback layer
//! and no global registry; the builder wires codec, window assigner, fold,
//! state store, and punctuator together explicitly and hands back one
//! composed pipeline object per partition.
//!
//! Record-level failures (malformed payload, missing key, late arrival) are
//! dead-lettered and never stall the partition. Partition-level failures
//! propagate out of `process`/`flush` for the coordinator to handle.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::aggregate::{Aggregator, FoldFunction};
use crate::codec::RecordCodec;
use crate::config::{AggregatorConfig, StoreBackend};
use crate::error::{AggregateError, Result};
use crate::punctuate::Punctuator;
use crate::sink::{DeadLetterSink, MemoryDeadLetter, MemorySink, OutputSink};
use crate::state::{FsChangelog, MemoryChangelog, PartitionStateStore, StateStore};
use crate::time::StreamTimeTracker;
use crate::types::{PartitionId, Record};
use crate::window::WindowAssigner;

/// Extracts the aggregation key from a decoded record. `None` dead-letters
/// the record.
pub type KeySelector<T> = dyn Fn(&T) -> Option<Vec<u8>> + Send + Sync;

/// Builds the output sink for one partition.
pub type SinkFactory = dyn Fn(PartitionId) -> Box<dyn OutputSink> + Send + Sync;

/// Builds the dead-letter sink for one partition.
pub type DeadLetterFactory = dyn Fn(PartitionId) -> Box<dyn DeadLetterSink> + Send + Sync;

/// The synchronous per-record interface a partition worker drives.
pub trait PartitionProcessor: Send {
    fn partition(&self) -> PartitionId;

    /// Process one record completely: decode, validate lateness, assign
    /// windows, fold into the store. Returns `Ok` for dead-lettered records;
    /// an `Err` is partition-fatal.
    fn process(&mut self, record: Record) -> Result<()>;

    /// Flush if the wall-clock cadence is due. Returns emissions made.
    fn maybe_flush(&mut self) -> Result<usize>;

    /// Flush unconditionally. Returns emissions made.
    fn flush(&mut self) -> Result<usize>;

    /// Records dead-lettered so far.
    fn dead_letter_count(&self) -> u64;
}

// ── PartitionPipeline ─────────────────────────────────────────────────────────

/// The composed processing unit for one partition.
pub struct PartitionPipeline<T, ACC, OUT> {
    partition: PartitionId,
    codec: Arc<dyn RecordCodec<T>>,
    out_codec: Arc<dyn RecordCodec<OUT>>,
    key_selector: Arc<KeySelector<T>>,
    assigner: Box<dyn WindowAssigner>,
    tracker: StreamTimeTracker,
    aggregator: Aggregator<T, ACC, OUT>,
    store: Box<dyn StateStore>,
    punctuator: Punctuator,
    sink: Box<dyn OutputSink>,
    dead_letter: Box<dyn DeadLetterSink>,
}

impl<T, ACC, OUT> PartitionProcessor for PartitionPipeline<T, ACC, OUT>
where
    T: Send,
    ACC: Serialize + DeserializeOwned + Send,
    OUT: Send,
{
    fn partition(&self) -> PartitionId {
        self.partition
    }

    fn process(&mut self, record: Record) -> Result<()> {
        let event = match self.codec.decode(&record.value) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(
                    partition = self.partition,
                    offset = record.offset,
                    "dead-lettering undecodable record: {err}"
                );
                self.dead_letter.offer(&record, &err);
                return Ok(());
            }
        };

        let Some(business_key) = (self.key_selector)(&event) else {
            let err = AggregateError::Codec("record has no aggregation key".into());
            tracing::warn!(
                partition = self.partition,
                offset = record.offset,
                "dead-lettering keyless record"
            );
            self.dead_letter.offer(&record, &err);
            return Ok(());
        };

        if let Err(err) = self.tracker.observe(record.timestamp) {
            tracing::warn!(
                partition = self.partition,
                offset = record.offset,
                "dead-lettering late record: {err}"
            );
            self.dead_letter.offer(&record, &err);
            return Ok(());
        }

        let windows = self.assigner.assign(record.timestamp);
        self.aggregator
            .apply(self.store.as_mut(), &record, &event, &business_key, &windows)?;

        if self.punctuator.on_record() {
            self.flush()?;
        }
        Ok(())
    }

    fn maybe_flush(&mut self) -> Result<usize> {
        if self.punctuator.is_due() {
            return self.flush();
        }
        Ok(0)
    }

    fn flush(&mut self) -> Result<usize> {
        self.punctuator.flush(
            self.store.as_mut(),
            &self.tracker,
            &self.aggregator,
            self.out_codec.as_ref(),
            self.sink.as_mut(),
        )
    }

    fn dead_letter_count(&self) -> u64 {
        self.dead_letter.count()
    }
}

// ── PipelineBuilder ───────────────────────────────────────────────────────────

/// Explicit wiring for partition pipelines.
///
/// The builder is constructed once per deployment and produces one pipeline
/// per partition. Building is the restore step: the partition's changelog is
/// replayed into a fresh store before the pipeline accepts a single record.
pub struct PipelineBuilder<T, ACC, OUT> {
    config: AggregatorConfig,
    codec: Arc<dyn RecordCodec<T>>,
    out_codec: Arc<dyn RecordCodec<OUT>>,
    key_selector: Arc<KeySelector<T>>,
    fold: Arc<dyn FoldFunction<T, ACC, OUT>>,
    sink_factory: Arc<SinkFactory>,
    dead_letter_factory: Arc<DeadLetterFactory>,
}

impl<T, ACC, OUT> PipelineBuilder<T, ACC, OUT>
where
    T: Send + 'static,
    ACC: Serialize + DeserializeOwned + Send + 'static,
    OUT: Send + 'static,
{
    pub fn new(
        config: AggregatorConfig,
        codec: Arc<dyn RecordCodec<T>>,
        out_codec: Arc<dyn RecordCodec<OUT>>,
        key_selector: Arc<KeySelector<T>>,
        fold: Arc<dyn FoldFunction<T, ACC, OUT>>,
    ) -> Self {
        Self {
            config,
            codec,
            out_codec,
            key_selector,
            fold,
            sink_factory: Arc::new(|_| Box::new(MemorySink::new())),
            dead_letter_factory: Arc::new(|_| Box::new(MemoryDeadLetter::new())),
        }
    }

    pub fn with_sink_factory(mut self, factory: Arc<SinkFactory>) -> Self {
        self.sink_factory = factory;
        self
    }

    pub fn with_dead_letter_factory(mut self, factory: Arc<DeadLetterFactory>) -> Self {
        self.dead_letter_factory = factory;
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Build the pipeline for `partition`, replaying its changelog into a
    /// fresh store. Fails with a partition-fatal error when replay fails.
    pub fn build(&self, partition: PartitionId) -> Result<PartitionPipeline<T, ACC, OUT>> {
        let store: Box<dyn StateStore> = match &self.config.store_backend {
            StoreBackend::Memory => {
                Box::new(PartitionStateStore::recover(MemoryChangelog::new())?)
            }
            StoreBackend::Filesystem { dir } => {
                let changelog = FsChangelog::open(dir, partition)?;
                Box::new(PartitionStateStore::recover(changelog)?)
            }
        };

        Ok(PartitionPipeline {
            partition,
            codec: Arc::clone(&self.codec),
            out_codec: Arc::clone(&self.out_codec),
            key_selector: Arc::clone(&self.key_selector),
            assigner: self.config.window.assigner(),
            tracker: StreamTimeTracker::new(self.config.grace),
            aggregator: Aggregator::new(Arc::clone(&self.fold)),
            store,
            punctuator: Punctuator::new(
                self.config.flush_interval,
                self.config.flush_every_n_records,
            ),
            sink: (self.sink_factory)(partition),
            dead_letter: (self.dead_letter_factory)(partition),
        })
    }
}

impl<T, ACC, OUT> Clone for PipelineBuilder<T, ACC, OUT> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            codec: Arc::clone(&self.codec),
            out_codec: Arc::clone(&self.out_codec),
            key_selector: Arc::clone(&self.key_selector),
            fold: Arc::clone(&self.fold),
            sink_factory: Arc::clone(&self.sink_factory),
            dead_letter_factory: Arc::clone(&self.dead_letter_factory),
        }
    }
}
