use std::time::Duration;

use crate::error::{AggregateError, Result};
use crate::types::{EventTime, EVENT_TIME_MIN};

mod tracker;

pub use tracker::*;

#[cfg(test)]
#[path = "tests/time_tests.rs"]
mod tests;
