//! Error taxonomy for the aggregation engine.
//!
//! Two severities exist and the distinction drives recovery:
//!
//! - **Record-level** ([`AggregateError::InvalidTimestamp`],
//!   [`AggregateError::Codec`]): isolated to the offending record, routed to
//!   the dead-letter sink, never stall a partition.
//! - **Partition-level** ([`AggregateError::StoreIo`],
//!   [`AggregateError::Replay`]): stop the owning partition's processing and
//!   surface to the coordinator for reassignment. Other partitions keep
//!   running.

use crate::types::EventTime;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregateError>;

#[derive(Debug, Error)]
pub enum AggregateError {
    /// Record timestamp is more than the grace period behind the partition's
    /// max observed timestamp.
    #[error("timestamp {timestamp} is behind the lateness boundary {boundary}")]
    InvalidTimestamp {
        timestamp: EventTime,
        boundary: EventTime,
    },

    /// Malformed record payload at the codec boundary.
    #[error("codec: {0}")]
    Codec(String),

    /// Durable write to the state store or its changelog failed.
    #[error("state store i/o: {0}")]
    StoreIo(String),

    /// The changelog was corrupt or unreadable during restore.
    #[error("changelog replay: {0}")]
    Replay(String),

    /// The partition was revoked while work was in flight.
    #[error("partition revoked")]
    Revoked,
}

impl AggregateError {
    /// True for errors that must stop the owning partition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AggregateError::StoreIo(_) | AggregateError::Replay(_) | AggregateError::Revoked
        )
    }
}

impl From<std::io::Error> for AggregateError {
    fn from(err: std::io::Error) -> Self {
        AggregateError::StoreIo(err.to_string())
    }
}
