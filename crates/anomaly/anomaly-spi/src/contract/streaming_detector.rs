//! Streaming detector trait definition.

use crate::error::Result;
use crate::model::{Timestamp, Verdict};

/// One-sample-at-a-time anomaly detector for a single source.
///
/// Calls must be serialized: each verdict depends on the exact state left
/// by the previous tick.
pub trait StreamingDetector: Send {
    /// Feed one sample and get its verdict.
    ///
    /// Non-finite values are rejected with `InvalidSample` and leave the
    /// detector untouched.
    fn ingest(&mut self, value: f64, timestamp: Timestamp) -> Result<Verdict>;

    /// Current contents of the sample window, oldest first.
    fn window(&self) -> Vec<f64>;

    /// Drop all buffered history, keeping the configuration.
    fn reset(&mut self);
}
