//! Per-tick detection verdicts.

use serde::{Deserialize, Serialize};

/// Numbers behind an assessed tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// One-step-ahead forecast made before the sample was seen.
    pub forecast: f64,
    /// `max(0, actual - forecast)`.
    pub residual_up: f64,
    /// Adaptive bound the residual was compared against.
    pub bound: f64,
}

impl Assessment {
    /// Residual relative to the bound; a bound of zero yields the raw residual.
    pub fn score(&self) -> f64 {
        if self.bound > 0.0 {
            self.residual_up / self.bound
        } else {
            self.residual_up
        }
    }

    /// Whether the residual exceeds the bound.
    pub fn exceeds_bound(&self) -> bool {
        self.residual_up > self.bound
    }
}

/// Outcome of ingesting one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Not enough history to fit the forecasting model.
    InsufficientData,
    /// Residual within the adaptive bound.
    Normal(Assessment),
    /// Upward anomaly reported to the caller.
    Anomaly(Assessment),
    /// Inside a debounce cooldown; the tick is not reported even if it
    /// exceeds the bound.
    Suppressed(Assessment),
}

impl Verdict {
    /// Whether this tick is a reported anomaly.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Verdict::Anomaly(_))
    }

    /// Whether this tick fell inside a debounce cooldown.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Verdict::Suppressed(_))
    }

    /// Whether the detector was still warming up.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Verdict::InsufficientData)
    }

    /// Assessment numbers, absent during warm-up.
    pub fn assessment(&self) -> Option<&Assessment> {
        match self {
            Verdict::InsufficientData => None,
            Verdict::Normal(a) | Verdict::Anomaly(a) | Verdict::Suppressed(a) => Some(a),
        }
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::InsufficientData => "insufficient_data",
            Verdict::Normal(_) => "normal",
            Verdict::Anomaly(_) => "anomaly",
            Verdict::Suppressed(_) => "suppressed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(residual_up: f64, bound: f64) -> Assessment {
        Assessment {
            forecast: 10.0,
            residual_up,
            bound,
        }
    }

    #[test]
    fn test_score_relative_to_bound() {
        assert!((assessment(10.0, 4.0).score() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_score_with_zero_bound() {
        assert!((assessment(3.0, 0.0).score() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_exceeds_bound_is_strict() {
        assert!(!assessment(4.0, 4.0).exceeds_bound());
        assert!(assessment(4.1, 4.0).exceeds_bound());
    }

    #[test]
    fn test_verdict_predicates() {
        let a = assessment(1.0, 2.0);
        assert!(Verdict::Anomaly(a).is_anomaly());
        assert!(Verdict::Suppressed(a).is_suppressed());
        assert!(Verdict::InsufficientData.is_insufficient_data());
        assert!(Verdict::InsufficientData.assessment().is_none());
        assert_eq!(Verdict::Normal(a).assessment(), Some(&a));
    }

    #[test]
    fn test_verdict_json_shape() {
        let json = serde_json::to_value(Verdict::Anomaly(assessment(40.0, 2.5))).unwrap();
        assert_eq!(json["kind"], "anomaly");
        assert_eq!(json["residual_up"], 40.0);

        let json = serde_json::to_value(Verdict::InsufficientData).unwrap();
        assert_eq!(json["kind"], "insufficient_data");
    }
}
