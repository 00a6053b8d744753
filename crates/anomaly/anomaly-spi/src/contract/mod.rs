//! Contract definitions for anomaly detection.
//!
//! This module contains trait definitions that providers must implement.

mod sample_source;
mod streaming_detector;

pub use sample_source::SampleSource;
pub use streaming_detector::StreamingDetector;
