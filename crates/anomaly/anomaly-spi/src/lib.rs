//! Anomaly Detection Service Provider Interface
//!
//! Defines traits and types for streaming upward-anomaly detection.

pub mod contract;
pub mod error;
pub mod model;

// Re-export all public items at crate root for convenience
pub use contract::{SampleSource, StreamingDetector};
pub use error::{AnomalyError, Result};
pub use model::{Alert, AlertSeverity, Assessment, Sample, Timestamp, Verdict};
