//! Alert construction for anomaly verdicts.
//!
//! Alerts are plain values; delivering them is up to the host.

use anomaly_spi::{Alert, AlertSeverity, Assessment, Sample, Verdict};

/// Residual-to-bound ratio at which an alert becomes critical.
pub const CRITICAL_SCORE: f64 = 2.0;

fn severity_for(score: f64) -> AlertSeverity {
    if score >= CRITICAL_SCORE {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}

fn default_message(source: &str, value: f64, assessment: &Assessment) -> String {
    format!(
        "[{}] upward anomaly: value={:.4}, forecast={:.4}, residual={:.4}, bound={:.4}",
        source, value, assessment.forecast, assessment.residual_up, assessment.bound
    )
}

/// Create an alert from an assessed sample.
pub fn create_alert(source: &str, sample: Sample, assessment: &Assessment) -> Alert {
    AlertBuilder::new(source, sample, *assessment).build()
}

/// Alert for `verdict` if it reports an anomaly.
pub fn alert_for(source: &str, sample: Sample, verdict: &Verdict) -> Option<Alert> {
    match verdict {
        Verdict::Anomaly(assessment) => Some(create_alert(source, sample, assessment)),
        _ => None,
    }
}

/// Alert builder for custom alert creation.
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    source: String,
    sample: Sample,
    assessment: Assessment,
    severity: Option<AlertSeverity>,
    message: Option<String>,
}

impl AlertBuilder {
    /// Create a new alert builder.
    pub fn new(source: impl Into<String>, sample: Sample, assessment: Assessment) -> Self {
        Self {
            source: source.into(),
            sample,
            assessment,
            severity: None,
            message: None,
        }
    }

    /// Set custom severity.
    pub fn severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set custom message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Build the alert.
    pub fn build(self) -> Alert {
        let score = self.assessment.score();
        let severity = self.severity.unwrap_or_else(|| severity_for(score));
        let message = self
            .message
            .unwrap_or_else(|| default_message(&self.source, self.sample.value, &self.assessment));

        Alert {
            source: self.source,
            timestamp: self.sample.timestamp,
            value: self.sample.value,
            forecast: self.assessment.forecast,
            residual_up: self.assessment.residual_up,
            bound: self.assessment.bound,
            score,
            severity,
            message,
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
    fn test_severity_from_score() {
        let sample = Sample::new(1_000, 50.0);
        let critical = create_alert("jobs", sample, &assessment(40.0, 2.5));
        assert_eq!(critical.severity, AlertSeverity::Critical);
        assert!((critical.score - 16.0).abs() < 1e-12);

        let warning = create_alert("jobs", sample, &assessment(3.0, 2.5));
        assert_eq!(warning.severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_alert_carries_sample_and_assessment() {
        let alert = create_alert("jobs", Sample::new(42, 50.0), &assessment(40.0, 2.5));
        assert_eq!(alert.source, "jobs");
        assert_eq!(alert.timestamp, 42);
        assert_eq!(alert.value, 50.0);
        assert_eq!(alert.forecast, 10.0);
        assert!(alert.message.contains("[jobs]"));
        assert!(alert.message.contains("value=50.0000"));
    }

    #[test]
    fn test_only_anomalies_raise_alerts() {
        let sample = Sample::new(0, 1.0);
        let a = assessment(40.0, 2.5);
        assert!(alert_for("s", sample, &Verdict::Anomaly(a)).is_some());
        assert!(alert_for("s", sample, &Verdict::Suppressed(a)).is_none());
        assert!(alert_for("s", sample, &Verdict::Normal(a)).is_none());
        assert!(alert_for("s", sample, &Verdict::InsufficientData).is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let alert = AlertBuilder::new("s", Sample::new(0, 1.0), assessment(40.0, 2.5))
            .severity(AlertSeverity::Warning)
            .message("custom")
            .build();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.message, "custom");
    }
}
