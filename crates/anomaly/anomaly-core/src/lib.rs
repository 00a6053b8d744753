//! Anomaly Detection Core
//!
//! Streaming AR forecasting, adaptive thresholds, debouncing, monitoring
//! and alerting.

mod alerting;
mod cadence;
mod debounce;
mod detector;
mod forecaster;
mod monitoring;
mod residual;
mod threshold;
mod window;

pub use alerting::*;
pub use cadence::*;
pub use debounce::*;
pub use detector::{create, ingest, reset, DetectorState};
pub use forecaster::*;
pub use monitoring::*;
pub use residual::*;
pub use threshold::*;
pub use window::*;
