//! Alert types for anomaly detection.

use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// An alert raised for an anomaly verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub source: String,
    pub timestamp: Timestamp,
    pub value: f64,
    pub forecast: f64,
    pub residual_up: f64,
    pub bound: f64,
    /// Residual divided by the bound.
    pub score: f64,
    pub severity: AlertSeverity,
    pub message: String,
}
