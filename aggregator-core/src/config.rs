//! Engine configuration.
//!
//! Windowing, lateness, flush cadence, and backend choice for one
//! deployment. All partitions of a pipeline share one configuration; the
//! overlap policy is fixed here, never per record.

use std::path::PathBuf;
use std::time::Duration;

use crate::window::{HoppingWindows, TumblingWindows, WindowAssigner};

/// Window shape for a deployment.
#[derive(Debug, Clone)]
pub enum WindowConfig {
    /// Fixed-size, non-overlapping.
    Tumbling { size: Duration },
    /// Fixed-size, advancing by `advance < size`, overlapping.
    Hopping { size: Duration, advance: Duration },
}

impl WindowConfig {
    /// Build the assigner this configuration describes.
    pub fn assigner(&self) -> Box<dyn WindowAssigner> {
        match self {
            WindowConfig::Tumbling { size } => Box::new(TumblingWindows::of(*size)),
            WindowConfig::Hopping { size, advance } => {
                Box::new(HoppingWindows::of(*size, *advance))
            }
        }
    }
}

/// Where a partition's changelog lives.
#[derive(Debug, Clone, Default)]
pub enum StoreBackend {
    /// In-memory changelog; state does not survive process restart.
    #[default]
    Memory,
    /// One append-only changelog file per partition under `dir`.
    Filesystem { dir: PathBuf },
}

/// Configuration for the aggregation engine.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub window: WindowConfig,
    /// Maximum allowed lateness relative to the partition's max observed
    /// timestamp.
    pub grace: Duration,
    /// Wall-clock flush cadence. `None` disables time-driven flushes.
    pub flush_interval: Option<Duration>,
    /// Flush after every N processed records. `None` disables count-driven
    /// flushes.
    pub flush_every_n_records: Option<u64>,
    /// Cap on in-flight emissions before the punctuator blocks.
    pub emission_inflight_cap: usize,
    /// Max records fetched per source poll.
    pub poll_batch_size: usize,
    pub store_backend: StoreBackend,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::Tumbling {
                size: Duration::from_secs(60),
            },
            grace: Duration::from_secs(5),
            flush_interval: Some(Duration::from_secs(1)),
            flush_every_n_records: None,
            emission_inflight_cap: 1024,
            poll_batch_size: 256,
            store_backend: StoreBackend::Memory,
        }
    }
}

impl AggregatorConfig {
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_flush_every_n_records(mut self, n: Option<u64>) -> Self {
        self.flush_every_n_records = n;
        self
    }

    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store_backend = backend;
        self
    }
}
