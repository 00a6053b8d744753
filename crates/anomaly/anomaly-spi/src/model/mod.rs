//! Data models for anomaly detection.
//!
//! This module contains data structures used throughout the anomaly detection system.

mod alert;
mod sample;
mod verdict;

pub use alert::{Alert, AlertSeverity};
pub use sample::{Sample, Timestamp};
pub use verdict::{Assessment, Verdict};
