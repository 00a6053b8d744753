//! Anomaly Detection API
//!
//! Configuration types and builders for streaming upward-anomaly detection.

use serde::{Deserialize, Serialize};

mod lenient;
mod settings;

// Re-export SPI types
pub use anomaly_spi::{
    Alert, AlertSeverity, AnomalyError, Assessment, Result, Sample, Timestamp, Verdict,
};
pub use settings::{Settings, SourceSettings, DEFAULT_POLLING_FREQUENCY_SECS};

// ============================================================================
// Detector Configuration
// ============================================================================

/// Per-source detector configuration.
///
/// Every field has a default so partial settings files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples kept for model fitting and for the quantile history (default: 64).
    #[serde(deserialize_with = "lenient::whole_usize")]
    pub window_size: usize,
    /// Multiplier on the EWMA residual scale (default: 3.0).
    pub k_upper: f64,
    /// Minimum relative increase over the forecast, e.g. 0.25 == +25% (default: 0.25).
    pub min_rel_increase: f64,
    /// Empirical quantile over positive residuals (default: 0.995).
    pub q: f64,
    /// EWMA smoothing factor in (0, 1] (default: 0.2).
    pub ew_alpha: f64,
    /// Ticks suppressed after a reported anomaly (default: 1).
    #[serde(deserialize_with = "lenient::whole_usize")]
    pub debounce: usize,
    /// Autoregressive lag order (default: 2).
    #[serde(deserialize_with = "lenient::whole_usize")]
    pub ar_order: usize,
    /// Clamp negative forecasts to zero for count-like metrics (default: false).
    pub non_negative_forecast: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 64,
            k_upper: 3.0,
            min_rel_increase: 0.25,
            q: 0.995,
            ew_alpha: 0.2,
            debounce: 1,
            ar_order: 2,
            non_negative_forecast: false,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_k_upper(mut self, k_upper: f64) -> Self {
        self.k_upper = k_upper;
        self
    }

    pub fn with_min_rel_increase(mut self, min_rel_increase: f64) -> Self {
        self.min_rel_increase = min_rel_increase;
        self
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    pub fn with_ew_alpha(mut self, ew_alpha: f64) -> Self {
        self.ew_alpha = ew_alpha;
        self
    }

    pub fn with_debounce(mut self, debounce: usize) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_ar_order(mut self, ar_order: usize) -> Self {
        self.ar_order = ar_order;
        self
    }

    pub fn with_non_negative_forecast(mut self, non_negative_forecast: bool) -> Self {
        self.non_negative_forecast = non_negative_forecast;
        self
    }

    /// Check every parameter, reporting the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.ar_order == 0 {
            return Err(AnomalyError::invalid_config("ar_order", "must be positive"));
        }
        if self.window_size == 0 {
            return Err(AnomalyError::invalid_config("window_size", "must be positive"));
        }
        if self.window_size < self.ar_order + 1 {
            return Err(AnomalyError::invalid_config(
                "window_size",
                format!(
                    "must be at least ar_order + 1 ({}), got {}",
                    self.ar_order + 1,
                    self.window_size
                ),
            ));
        }
        if !self.k_upper.is_finite() || self.k_upper < 0.0 {
            return Err(AnomalyError::invalid_config(
                "k_upper",
                "must be a non-negative finite number",
            ));
        }
        if !self.min_rel_increase.is_finite() || self.min_rel_increase < 0.0 {
            return Err(AnomalyError::invalid_config(
                "min_rel_increase",
                "must be a non-negative finite number",
            ));
        }
        if !(0.0..=1.0).contains(&self.q) {
            return Err(AnomalyError::invalid_config("q", "must be in [0, 1]"));
        }
        if !(self.ew_alpha > 0.0 && self.ew_alpha <= 1.0) {
            return Err(AnomalyError::invalid_config("ew_alpha", "must be in (0, 1]"));
        }
        Ok(())
    }

    /// Whether switching to `other` changes the shape of the sample window,
    /// which invalidates all buffered history.
    pub fn reshapes_window(&self, other: &DetectorConfig) -> bool {
        self.window_size != other.window_size || self.ar_order != other.ar_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_name(config: DetectorConfig) -> String {
        match config.validate() {
            Err(AnomalyError::InvalidConfiguration { name, .. }) => name,
            other => panic!("Expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = DetectorConfig::new()
            .with_window_size(5)
            .with_ar_order(1)
            .with_k_upper(3.0)
            .with_min_rel_increase(0.25)
            .with_q(0.9)
            .with_ew_alpha(0.5)
            .with_debounce(1)
            .with_non_negative_forecast(true);

        assert_eq!(config.window_size, 5);
        assert_eq!(config.ar_order, 1);
        assert!((config.q - 0.9).abs() < 1e-12);
        assert!((config.ew_alpha - 0.5).abs() < 1e-12);
        assert!(config.non_negative_forecast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_must_fit_ar_order() {
        let config = DetectorConfig::new().with_window_size(2).with_ar_order(2);
        assert_eq!(invalid_name(config), "window_size");

        let config = DetectorConfig::new().with_window_size(3).with_ar_order(2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert_eq!(invalid_name(DetectorConfig::new().with_ar_order(0)), "ar_order");
        assert_eq!(
            invalid_name(DetectorConfig::new().with_window_size(0).with_ar_order(1)),
            "window_size"
        );
    }

    #[test]
    fn test_quantile_range() {
        assert!(DetectorConfig::new().with_q(0.0).validate().is_ok());
        assert!(DetectorConfig::new().with_q(1.0).validate().is_ok());
        assert_eq!(invalid_name(DetectorConfig::new().with_q(1.01)), "q");
        assert_eq!(invalid_name(DetectorConfig::new().with_q(-0.1)), "q");
        assert_eq!(invalid_name(DetectorConfig::new().with_q(f64::NAN)), "q");
    }

    #[test]
    fn test_alpha_range() {
        assert!(DetectorConfig::new().with_ew_alpha(1.0).validate().is_ok());
        assert_eq!(invalid_name(DetectorConfig::new().with_ew_alpha(0.0)), "ew_alpha");
        assert_eq!(invalid_name(DetectorConfig::new().with_ew_alpha(1.5)), "ew_alpha");
        assert_eq!(invalid_name(DetectorConfig::new().with_ew_alpha(f64::NAN)), "ew_alpha");
    }

    #[test]
    fn test_negative_multipliers_rejected() {
        assert_eq!(invalid_name(DetectorConfig::new().with_k_upper(-1.0)), "k_upper");
        assert_eq!(
            invalid_name(DetectorConfig::new().with_min_rel_increase(-0.1)),
            "min_rel_increase"
        );
        assert_eq!(
            invalid_name(DetectorConfig::new().with_k_upper(f64::INFINITY)),
            "k_upper"
        );
    }

    #[test]
    fn test_zero_multipliers_allowed() {
        let config = DetectorConfig::new()
            .with_k_upper(0.0)
            .with_min_rel_increase(0.0)
            .with_debounce(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reshapes_window() {
        let base = DetectorConfig::default();
        assert!(!base.reshapes_window(&base.clone().with_k_upper(5.0)));
        assert!(!base.reshapes_window(&base.clone().with_debounce(4)));
        assert!(base.reshapes_window(&base.clone().with_window_size(32)));
        assert!(base.reshapes_window(&base.clone().with_ar_order(1)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"window_size": 16, "k_upper": 4.0}"#).unwrap();
        assert_eq!(config.window_size, 16);
        assert!((config.k_upper - 4.0).abs() < 1e-12);
        assert_eq!(config.ar_order, 2);
        assert!((config.q - 0.995).abs() < 1e-12);
    }

    #[test]
    fn test_whole_float_sizes_deserialize() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"window_size": 16.0, "debounce": 0.0, "ar_order": 3}"#)
                .unwrap();
        assert_eq!(config.window_size, 16);
        assert_eq!(config.debounce, 0);
        assert_eq!(config.ar_order, 3);
        assert!(serde_json::from_str::<DetectorConfig>(r#"{"window_size": -1}"#).is_err());
    }
}
