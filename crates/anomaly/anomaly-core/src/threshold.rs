//! Adaptive one-sided threshold.

use serde::{Deserialize, Serialize};

use crate::residual::ResidualTracker;

/// The three candidate bounds, reported separately for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundTerms {
    /// `k_upper * ew_scale`
    pub scale: f64,
    /// `min_rel_increase * max(forecast, 1)`
    pub relative: f64,
    /// Empirical `q`-quantile of past positive residuals.
    pub quantile: f64,
}

impl BoundTerms {
    /// The effective bound: the largest of the three terms.
    pub fn bound(&self) -> f64 {
        self.scale.max(self.relative).max(self.quantile)
    }
}

/// Result of comparing a residual against the adaptive bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub terms: BoundTerms,
    pub bound: f64,
    /// `residual_up > bound`, before debouncing.
    pub raw_flag: bool,
}

/// Combines the scale, relative and quantile bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEvaluator {
    pub k_upper: f64,
    pub min_rel_increase: f64,
    pub q: f64,
}

impl ThresholdEvaluator {
    pub fn new(k_upper: f64, min_rel_increase: f64, q: f64) -> Self {
        Self {
            k_upper,
            min_rel_increase,
            q,
        }
    }

    /// Bound terms from `tracker` as it stands.
    ///
    /// Must be called before the current tick's residual is folded into the
    /// tracker, so a sample never inflates its own threshold.
    pub fn terms(&self, forecast: f64, tracker: &ResidualTracker) -> BoundTerms {
        BoundTerms {
            scale: (self.k_upper * tracker.ew_scale()).min(f64::MAX),
            relative: (self.min_rel_increase * forecast.max(1.0)).min(f64::MAX),
            quantile: tracker.quantile(self.q),
        }
    }

    pub fn evaluate(&self, residual_up: f64, forecast: f64, tracker: &ResidualTracker) -> Evaluation {
        let terms = self.terms(forecast, tracker);
        let bound = terms.bound();
        Evaluation {
            terms,
            bound,
            raw_flag: residual_up > bound,
        }
    }
}
