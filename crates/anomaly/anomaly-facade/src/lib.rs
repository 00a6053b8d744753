//! Anomaly Detection Facade
//!
//! Unified re-exports for streaming upward-anomaly detection.
//!
//! This facade provides a single entry point to all anomaly detection functionality:
//! - `Verdict`, `Alert`, `SampleSource` and errors from SPI
//! - `DetectorConfig` and `Settings` from API
//! - `DetectorState`, `Monitor`, `Cadence` and the pipeline stages from Core

// Re-export everything from SPI
pub use anomaly_spi::*;

// Re-export everything from API
pub use anomaly_api::*;

// Re-export everything from Core
pub use anomaly_core::*;
