use std::time::Duration;

use crate::types::{EventTime, WindowId};

mod assigners;

pub use assigners::*;

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
