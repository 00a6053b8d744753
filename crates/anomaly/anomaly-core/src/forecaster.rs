//! One-step-ahead autoregressive forecasting.
//!
//! An AR(p) model with intercept is refit by ordinary least squares on the
//! whole window before every prediction:
//!
//! > x[i] = c + a1 * x[i-1] + ... + ap * x[i-p]
//!
//! Windows are small, so a full refit per tick stays cheap and no online
//! update is needed. The regression runs on centred, rescaled values and the
//! normal equations are solved by Gaussian elimination with partial
//! pivoting, so the singularity test depends neither on the units of the
//! metric nor on a constant offset.
//!
//! ## Degenerate windows
//!
//! - `len <= p`: cold start, the forecast is the window mean.
//! - Fewer regression rows than unknowns, a constant window, or any other
//!   rank-deficient design: the forecast is the last observed value.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative pivot size below which the normal equations are treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-9;

/// Fitted AR coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArModel {
    pub intercept: f64,
    /// `coefficients[j]` multiplies the value `j + 1` steps back.
    pub coefficients: Vec<f64>,
}

impl ArModel {
    pub fn order(&self) -> usize {
        self.coefficients.len()
    }

    /// Predict the value following `history` (oldest first).
    ///
    /// `history` must hold at least `order()` values.
    pub fn predict(&self, history: &[f64]) -> f64 {
        let n = history.len();
        self.coefficients
            .iter()
            .enumerate()
            .fold(self.intercept, |acc, (j, c)| acc + c * history[n - 1 - j])
    }
}

/// How a forecast was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Too few samples to fit; mean of the window.
    ColdStart,
    /// Least-squares AR fit.
    Autoregressive,
    /// Degenerate fit; last observed value.
    Naive,
}

/// A one-step-ahead prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub value: f64,
    pub method: ForecastMethod,
    /// Model behind an `Autoregressive` forecast.
    pub model: Option<ArModel>,
}

/// AR(p) forecaster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArForecaster {
    order: usize,
    non_negative: bool,
}

impl ArForecaster {
    /// `non_negative` clamps forecasts at zero for count-like metrics.
    pub fn new(order: usize, non_negative: bool) -> Self {
        Self {
            order,
            non_negative,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Whether `len` samples are enough to attempt a fit.
    pub fn is_warm(&self, len: usize) -> bool {
        len > self.order
    }

    /// Fit AR coefficients to `data` (oldest first).
    ///
    /// The window is normalized by its largest magnitude, then centred on
    /// its level and divided by its largest deviation, so a small signal
    /// riding on a large offset keeps a well-conditioned design. The lags
    /// and the target are centred by their regression-row means, which
    /// takes the intercept out of the linear system; it is recovered from
    /// the means once the slopes are known.
    ///
    /// Returns `None` when the design is rank-deficient.
    pub fn fit(&self, data: &[f64]) -> Option<ArModel> {
        let p = self.order;
        if data.len() <= p || data.len() - p < p + 1 {
            return None;
        }

        let magnitude = data.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        if magnitude == 0.0 || !magnitude.is_finite() {
            return None;
        }
        let unit: Vec<f64> = data.iter().map(|x| x / magnitude).collect();
        let n = unit.len() as f64;
        let level = unit.iter().fold(0.0_f64, |acc, x| acc + x / n);
        let spread = unit.iter().fold(0.0_f64, |m, x| m.max((x - level).abs()));
        if spread == 0.0 {
            return None;
        }
        let z: Vec<f64> = unit.iter().map(|x| (x - level) / spread).collect();

        // means[0] is the target, means[j + 1] the lag j + 1 steps back.
        let rows = (z.len() - p) as f64;
        let mut means = vec![0.0; p + 1];
        for i in p..z.len() {
            means[0] += z[i];
            for j in 0..p {
                means[j + 1] += z[i - 1 - j];
            }
        }
        for m in means.iter_mut() {
            *m /= rows;
        }

        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        let mut lags = vec![0.0; p];
        for i in p..z.len() {
            let target = z[i] - means[0];
            for j in 0..p {
                lags[j] = z[i - 1 - j] - means[j + 1];
            }
            for r in 0..p {
                xty[r] += lags[r] * target;
                for c in 0..p {
                    xtx[r][c] += lags[r] * lags[c];
                }
            }
        }

        let coefficients = solve_linear_system(xtx, xty)?;
        let centred_intercept = coefficients
            .iter()
            .enumerate()
            .fold(means[0], |acc, (j, c)| acc - c * means[j + 1]);
        let gain = coefficients.iter().fold(0.0_f64, |acc, c| acc + c);
        let model = ArModel {
            intercept: magnitude * (level * (1.0 - gain) + spread * centred_intercept),
            coefficients,
        };
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return None;
        }
        Some(model)
    }

    /// Predict the value following `history` (oldest first).
    ///
    /// Returns `None` for an empty history.
    pub fn forecast(&self, history: &[f64]) -> Option<Forecast> {
        let last = *history.last()?;

        let forecast = if !self.is_warm(history.len()) {
            let n = history.len() as f64;
            let mean = history
                .iter()
                .fold(0.0_f64, |acc, x| acc + x / n)
                .clamp(-f64::MAX, f64::MAX);
            Forecast {
                value: mean,
                method: ForecastMethod::ColdStart,
                model: None,
            }
        } else {
            match self.fit(history) {
                Some(model) => {
                    let value = model.predict(history);
                    if value.is_finite() {
                        Forecast {
                            value,
                            method: ForecastMethod::Autoregressive,
                            model: Some(model),
                        }
                    } else {
                        debug!("non-finite AR prediction, using last value");
                        naive(last)
                    }
                }
                None => {
                    debug!(len = history.len(), order = self.order, "degenerate AR fit, using last value");
                    naive(last)
                }
            }
        };

        Some(self.clamp(forecast))
    }

    fn clamp(&self, mut forecast: Forecast) -> Forecast {
        if self.non_negative && forecast.value < 0.0 {
            forecast.value = 0.0;
        }
        forecast
    }
}

fn naive(last: f64) -> Forecast {
    Forecast {
        value: last,
        method: ForecastMethod::Naive,
        model: None,
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot vanishes relative to the largest entry of `a`.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let magnitude = a
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    if magnitude == 0.0 {
        return None;
    }
    let tolerance = SINGULAR_TOLERANCE * magnitude;

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
