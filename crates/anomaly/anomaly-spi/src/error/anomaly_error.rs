//! Anomaly detection error types.

use thiserror::Error;

/// Anomaly detection errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnomalyError {
    /// A sample was not a finite real number. The tick is dropped and the
    /// detector state is left untouched.
    #[error("Invalid sample: {value} is not a finite number")]
    InvalidSample { value: f64 },

    /// Detector configuration rejected at create/reset time.
    #[error("Invalid configuration: {name} - {reason}")]
    InvalidConfiguration { name: String, reason: String },

    /// The sample source failed to produce a value.
    #[error("Source '{source_name}' failed: {message}")]
    Source { source_name: String, message: String },

    /// Settings file could not be read, parsed or written.
    #[error("Settings error: {0}")]
    Settings(String),
}

impl AnomalyError {
    /// Shorthand for an [`AnomalyError::InvalidConfiguration`].
    pub fn invalid_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`AnomalyError::Source`].
    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Result type for anomaly detection operations.
pub type Result<T> = std::result::Result<T, AnomalyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sample_display() {
        let error = AnomalyError::InvalidSample { value: f64::NAN };
        assert_eq!(error.to_string(), "Invalid sample: NaN is not a finite number");
    }

    #[test]
    fn test_invalid_sample_infinity_display() {
        let error = AnomalyError::InvalidSample {
            value: f64::NEG_INFINITY,
        };
        assert_eq!(error.to_string(), "Invalid sample: -inf is not a finite number");
    }

    #[test]
    fn test_invalid_configuration_display() {
        let error = AnomalyError::invalid_config("q", "must be in [0, 1]");
        assert_eq!(error.to_string(), "Invalid configuration: q - must be in [0, 1]");
    }

    #[test]
    fn test_source_display() {
        let error = AnomalyError::source("orders", "connection refused");
        assert_eq!(error.to_string(), "Source 'orders' failed: connection refused");
    }

    #[test]
    fn test_settings_display() {
        let error = AnomalyError::Settings("expected value at line 1".to_string());
        assert_eq!(error.to_string(), "Settings error: expected value at line 1");
    }

    #[test]
    fn test_invalid_configuration_fields() {
        match AnomalyError::invalid_config("window_size", "must be >= ar_order + 1") {
            AnomalyError::InvalidConfiguration { name, reason } => {
                assert_eq!(name, "window_size");
                assert_eq!(reason, "must be >= ar_order + 1");
            }
            other => panic!("Expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_result_error_propagation() {
        fn inner() -> Result<f64> {
            Err(AnomalyError::InvalidSample { value: f64::INFINITY })
        }

        fn outer() -> Result<f64> {
            let v = inner()?;
            Ok(v * 2.0)
        }

        assert!(matches!(outer(), Err(AnomalyError::InvalidSample { .. })));
    }

    #[test]
    fn test_error_implements_std_error() {
        let error: Box<dyn std::error::Error> =
            Box::new(AnomalyError::Settings("test".to_string()));
        assert!(!error.to_string().is_empty());
    }

    #[test]
    fn test_all_error_variants_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnomalyError>();
    }
}
