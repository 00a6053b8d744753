//! Sample types.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// A single observation of the monitored metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Collection time of the value.
    pub timestamp: Timestamp,
    /// Observed value.
    pub value: f64,
}

impl Sample {
    /// Create a new sample.
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Whether the value can be fed to a detector.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}
