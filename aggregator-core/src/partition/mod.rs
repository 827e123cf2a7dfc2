//! Partition ownership and recovery.
//!
//! The [`PartitionCoordinator`] owns an explicit map from partition id to
//! worker handle and ownership epoch; nothing is looked up through globals.
//! Each owned partition runs one worker thread with a single-threaded event
//! loop, its own state store, and no shared mutable state with any other
//! partition.
//!
//! ## Per-partition state machine
//!
//! ```text
//! Unassigned -> Restoring : assignment; full changelog replay into a fresh store
//! Restoring  -> Active    : replay complete; live records accepted
//! Active     -> Revoked   : rebalance; stop intake, flush in-flight work, release
//! Revoked    -> Unassigned: resources released; reassignment starts over
//! ```
//!
//! Replay failure is fatal for that partition only: it is surfaced as a
//! [`PartitionEvent::Failed`] notification and the process keeps serving its
//! other partitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::AggregateError;
use crate::pipeline::PartitionProcessor;
use crate::source::LogSource;
use crate::types::{Epoch, PartitionId};

mod coordinator;
mod worker;

pub use coordinator::*;
pub use worker::*;

/// Lifecycle phase of one partition, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPhase {
    Unassigned,
    Restoring,
    Active,
    Revoked,
}

/// Notification from a partition worker to the coordinator.
#[derive(Debug)]
pub enum PartitionEvent {
    /// Changelog replay finished; the partition is live.
    Restored {
        partition: PartitionId,
        epoch: Epoch,
    },
    /// A partition-fatal error stopped the worker.
    Failed {
        partition: PartitionId,
        epoch: Epoch,
        error: AggregateError,
    },
    /// The worker finished a revocation drain and released its resources.
    Revoked {
        partition: PartitionId,
        epoch: Epoch,
    },
}

/// Creates the per-partition source and processor. Called once per
/// assignment; a reassignment calls it again, so no state survives
/// revocation in memory.
pub type WorkerFactory = Arc<
    dyn Fn(
            PartitionId,
        )
            -> crate::error::Result<(Box<dyn LogSource>, Box<dyn PartitionProcessor>)>
        + Send
        + Sync,
>;

#[cfg(test)]
#[path = "tests/partition_tests.rs"]
mod tests;
