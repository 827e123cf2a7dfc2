//! # Aggregator Core
//!
//! A partitioned streaming aggregation engine: records are consumed from an
//! ordered, partitioned input log, folded into windowed per-key aggregates
//! held in a changelog-backed local store, and emitted to an output log once
//! their window can no longer change.
//!
//! - [`types`] — Core data types: [`Record`](types::Record),
//!   [`WindowId`](types::WindowId), [`AggregateKey`](types::AggregateKey),
//!   [`AggregateState`](types::AggregateState),
//!   [`ChangelogEntry`](types::ChangelogEntry).
//! - [`window`] — Window assignment: [`TumblingWindows`](window::TumblingWindows),
//!   [`HoppingWindows`](window::HoppingWindows).
//! - [`time`] — Per-partition stream time and lateness:
//!   [`StreamTimeTracker`](time::StreamTimeTracker).
//! - [`state`] — Changelog-backed keyed state:
//!   [`PartitionStateStore`](state::PartitionStateStore),
//!   [`MemoryChangelog`](state::MemoryChangelog),
//!   [`FsChangelog`](state::FsChangelog).
//! - [`aggregate`] — The user fold contract and its application:
//!   [`FoldFunction`](aggregate::FoldFunction), [`Aggregator`](aggregate::Aggregator).
//! - [`punctuate`] — Scheduled flushes: [`Punctuator`](punctuate::Punctuator).
//! - [`pipeline`] — Explicit wiring: [`PipelineBuilder`](pipeline::PipelineBuilder),
//!   [`PartitionPipeline`](pipeline::PartitionPipeline).
//! - [`partition`] — Ownership and recovery:
//!   [`PartitionCoordinator`](partition::PartitionCoordinator).
//! - [`source`] / [`sink`] — The abstract log boundaries and in-memory
//!   implementations.
//!
//! Delivery is at-least-once end to end: a crash between emission and
//! deletion re-emits on recovery. A deduplicating sink upgrades observed
//! results to effectively-once.

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod punctuate;
pub mod sink;
pub mod source;
pub mod state;
pub mod time;
pub mod types;
pub mod window;
