//! # State management
//!
//! Durable keyed state for one partition's running aggregates.
//!
//! - [`StateStore`] — the store contract: keyed get/put/delete plus an
//!   expiry scan driven by the punctuator.
//! - [`PartitionStateStore`] — the store implementation: an in-memory index
//!   in front of an append-only [`Changelog`].
//! - [`Changelog`] — the durable mutation log used exclusively for recovery,
//!   with [`MemoryChangelog`] and [`FsChangelog`] backends.
//!
//! ## Crash-safety contract
//!
//! Every mutation appends a [`ChangelogEntry`](crate::types::ChangelogEntry)
//! first and only then updates the queryable index. On restart the store is
//! empty until the changelog has been fully replayed; replay compacts by key
//! (latest entry wins, tombstones remove).
//!
//! Access is single-writer: the owning partition's processing unit. Stores
//! for different partitions are fully independent and share no locks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{AggregateError, Result};
use crate::types::{AggregateKey, AggregateState, ChangelogEntry, ChangelogOp, EventTime};

mod changelog;
mod store;

pub use changelog::*;
pub use store::*;

/// Keyed store for one partition's aggregate state.
pub trait StateStore: Send {
    /// Look up the state for one (key, window) entry.
    fn get(&self, key: &AggregateKey) -> Result<Option<AggregateState>>;

    /// Write the state for one entry. Appends to the changelog before the
    /// index is touched.
    fn put(&mut self, key: AggregateKey, state: AggregateState) -> Result<()>;

    /// Remove one entry, appending a tombstone to the changelog first.
    fn delete(&mut self, key: &AggregateKey) -> Result<()>;

    /// Keys whose window ended at or before `now`, in ascending window-end
    /// order. Cost is proportional to the number of expired windows, not to
    /// the total number of keys ever seen.
    fn scan_expired(&self, now: EventTime) -> Vec<AggregateKey>;

    /// Number of (key, window) entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;

#[cfg(test)]
#[path = "tests/changelog_tests.rs"]
mod changelog_tests;
