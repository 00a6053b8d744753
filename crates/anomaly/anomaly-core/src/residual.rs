//! Adaptive residual scale and positive-residual quantiles.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One-sided residual: only upward deviations count.
///
/// Saturates at `f64::MAX` when the difference of two finite values overflows.
pub fn residual_up(actual: f64, forecast: f64) -> f64 {
    (actual - forecast).max(0.0).min(f64::MAX)
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// Values are sorted ascending and interpolated at rank `q * (n - 1)`.
/// Returns 0 for an empty slice; `q` is clamped to `[0, 1]`.
pub fn empirical_quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Tracks how large an upward residual normally is.
///
/// Keeps an EWMA of squared one-sided residuals (a variance proxy) and a
/// FIFO-bounded history of the strictly positive ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualTracker {
    alpha: f64,
    ew_var: Option<f64>,
    history: VecDeque<f64>,
    capacity: usize,
}

impl ResidualTracker {
    pub fn new(alpha: f64, capacity: usize) -> Self {
        Self {
            alpha,
            ew_var: None,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Fold one tick's one-sided residual in.
    ///
    /// The variance saturates at `f64::MAX` so it stays finite for any
    /// finite residual.
    pub fn update(&mut self, residual_up: f64) {
        let squared = (residual_up * residual_up).min(f64::MAX);
        let blended = match self.ew_var {
            None => squared,
            Some(prev) => self.alpha * squared + (1.0 - self.alpha) * prev,
        };
        self.ew_var = Some(blended.min(f64::MAX));

        if residual_up > 0.0 {
            self.history.push_back(residual_up);
            while self.history.len() > self.capacity {
                self.history.pop_front();
            }
        }
    }

    /// EWMA variance, `None` before the first update.
    pub fn ew_var(&self) -> Option<f64> {
        self.ew_var
    }

    /// Square root of the EWMA variance, 0 before the first update.
    pub fn ew_scale(&self) -> f64 {
        self.ew_var.map_or(0.0, f64::sqrt)
    }

    /// Empirical quantile of the positive-residual history.
    pub fn quantile(&self, q: f64) -> f64 {
        empirical_quantile(&self.history(), q)
    }

    pub fn history(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Change the smoothing factor, keeping accumulated state.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    pub fn clear(&mut self) {
        self.ew_var = None;
        self.history.clear();
    }
}
