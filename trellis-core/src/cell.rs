//! Value Cells
//!
//! A [`ValueCell`] is the storage slot behind every property and signal. It
//! remembers the current value, the value before it, and when each was
//! written.
//!
//! Timestamps come from a single process-wide clock so that cells owned by
//! different components can be compared. A timestamp of `0` means "never
//! written".

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::Value;

/// The process-wide timestamp clock.
static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Advance the clock and return the new timestamp. Never returns 0.
pub(crate) fn next_timestamp() -> u64 {
    CLOCK.fetch_add(1, Ordering::Relaxed) + 1
}

/// A named slot holding the current and previous value of a member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCell {
    name: String,
    value: Option<Value>,
    timestamp: u64,
    last_value: Option<Value>,
    last_timestamp: u64,
}

impl ValueCell {
    /// Create an empty (unset) cell.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            timestamp: 0,
            last_value: None,
            last_timestamp: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current value, or `None` if the cell was never written.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Clock value of the last write, or 0 if never written.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The value before the last write.
    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }

    /// Clock value of the write before the last one.
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// Whether the cell has ever been written.
    pub fn is_set(&self) -> bool {
        self.timestamp != 0
    }

    /// Store a new value stamped with `timestamp`.
    ///
    /// The previous value and timestamp move into the `last_*` slots.
    pub(crate) fn write(&mut self, value: Value, timestamp: u64) {
        self.last_value = self.value.replace(value);
        self.last_timestamp = std::mem::replace(&mut self.timestamp, timestamp);
    }
}
