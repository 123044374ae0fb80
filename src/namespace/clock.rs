/*!
 * Logical clock used for namespace timestamps
 */

use serde::{Deserialize, Serialize};

/// Timestamp value produced by [`LogicalClock`]
pub type Timestamp = u64;

/// Monotonic counter standing in for wall-clock time.
///
/// Created with the store at zero, ticked once per successful
/// timestamp-relevant operation, and fast-forwarded (never rewound)
/// when a persisted tree is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalClock {
    now: Timestamp,
}

impl LogicalClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value without advancing
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Advance by one and return the new value
    pub fn tick(&mut self) -> Timestamp {
        self.now = self.now.saturating_add(1);
        self.now
    }

    /// Move forward to `at` if it is ahead of the current value
    pub fn advance_to(&mut self, at: Timestamp) {
        self.now = self.now.max(at);
    }
}
