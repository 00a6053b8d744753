//! Polling monitor that ties a sample source to a detector.

use std::time::{SystemTime, UNIX_EPOCH};

use anomaly_api::DetectorConfig;
use anomaly_spi::{Alert, AnomalyError, Result, Sample, SampleSource, Timestamp, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alerting::alert_for;
use crate::detector::DetectorState;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Outcome of one monitor tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub source: String,
    pub sample: Sample,
    pub verdict: Verdict,
    /// Present only for [`Verdict::Anomaly`].
    pub alert: Option<Alert>,
}

/// Sample source backed by a closure.
pub struct FnSource<F> {
    name: String,
    fetch: F,
}

impl<F> FnSource<F>
where
    F: FnMut() -> Result<f64> + Send,
{
    pub fn new(name: impl Into<String>, fetch: F) -> Self {
        Self {
            name: name.into(),
            fetch,
        }
    }
}

impl<F> SampleSource for FnSource<F>
where
    F: FnMut() -> Result<f64> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<f64> {
        (self.fetch)()
    }
}

type Clock = Box<dyn FnMut() -> Timestamp + Send>;

/// Polls one source and feeds every reading to its own detector.
pub struct Monitor<S: SampleSource> {
    source: S,
    state: DetectorState,
    clock: Clock,
}

impl<S: SampleSource> Monitor<S> {
    /// Create a monitor with a fresh detector, stamping samples with wall-clock time.
    pub fn new(source: S, config: DetectorConfig) -> Result<Self> {
        Ok(Self {
            source,
            state: DetectorState::create(config)?,
            clock: Box::new(now_millis),
        })
    }

    /// Resume from a previously saved detector state.
    pub fn with_state(source: S, state: DetectorState) -> Result<Self> {
        state.check_invariants()?;
        Ok(Self {
            source,
            state,
            clock: Box::new(now_millis),
        })
    }

    /// Replace the timestamp clock.
    pub fn with_clock(mut self, clock: impl FnMut() -> Timestamp + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Fetch one value from the source and ingest it.
    ///
    /// Fetch failures come back as [`AnomalyError::Source`] and never reach
    /// the detector.
    pub fn poll(&mut self) -> Result<TickEvent> {
        let value = match self.source.fetch() {
            Ok(value) => value,
            Err(err) => {
                warn!(source = self.source.name(), error = %err, "fetch failed");
                return Err(match err {
                    AnomalyError::Source { .. } => err,
                    other => AnomalyError::source(self.source.name(), other.to_string()),
                });
            }
        };
        let timestamp = (self.clock)();
        self.ingest(Sample::new(timestamp, value))
    }

    /// Ingest a sample obtained elsewhere.
    pub fn ingest(&mut self, sample: Sample) -> Result<TickEvent> {
        let verdict = match self.state.ingest(sample.value, sample.timestamp) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(source = self.source.name(), error = %err, "sample rejected");
                return Err(err);
            }
        };

        let alert = alert_for(self.source.name(), sample, &verdict);
        if let Some(alert) = &alert {
            info!(
                source = self.source.name(),
                value = alert.value,
                forecast = alert.forecast,
                bound = alert.bound,
                severity = ?alert.severity,
                "anomaly detected"
            );
        }

        Ok(TickEvent {
            source: self.source.name().to_string(),
            sample,
            verdict,
            alert,
        })
    }

    /// Apply a new configuration to the running detector.
    pub fn reconfigure(&mut self, config: DetectorConfig) -> Result<()> {
        self.state.reconfigure(config)
    }

    /// End the session; the next poll starts from an empty window.
    pub fn stop(&mut self) {
        self.state.reset();
    }

    /// Consume the monitor, returning the source and the detector state.
    pub fn into_parts(self) -> (S, DetectorState) {
        (self.source, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn config() -> DetectorConfig {
        DetectorConfig::new()
            .with_window_size(5)
            .with_ar_order(1)
            .with_k_upper(3.0)
            .with_min_rel_increase(0.25)
            .with_q(0.9)
            .with_ew_alpha(0.5)
            .with_debounce(1)
    }

    fn scripted(values: Vec<Result<f64>>) -> FnSource<impl FnMut() -> Result<f64> + Send> {
        let mut queue: VecDeque<Result<f64>> = values.into();
        FnSource::new("jobs", move || {
            queue
                .pop_front()
                .unwrap_or_else(|| Err(AnomalyError::source("jobs", "exhausted")))
        })
    }

    fn ticking_clock() -> impl FnMut() -> Timestamp + Send {
        let mut now = 0;
        move || {
            now += 1_000;
            now
        }
    }

    #[test]
    fn test_poll_raises_alert_on_spike() {
        let values = [10.0, 10.0, 10.0, 10.0, 50.0, 51.0];
        let source = scripted(values.iter().map(|&v| Ok(v)).collect());
        let mut monitor = Monitor::new(source, config())
            .unwrap()
            .with_clock(ticking_clock());

        let events: Vec<TickEvent> = (0..values.len()).map(|_| monitor.poll().unwrap()).collect();

        assert!(events[..4].iter().all(|e| e.alert.is_none()));
        let alert = events[4].alert.as_ref().unwrap();
        assert_eq!(alert.source, "jobs");
        assert_eq!(alert.timestamp, 5_000);
        assert_eq!(alert.value, 50.0);
        assert!(events[5].verdict.is_suppressed());
        assert!(events[5].alert.is_none());
    }

    #[test]
    fn test_fetch_error_leaves_state_untouched() {
        let source = scripted(vec![
            Ok(1.0),
            Err(AnomalyError::source("jobs", "connection refused")),
            Ok(2.0),
        ]);
        let mut monitor = Monitor::new(source, config()).unwrap();

        monitor.poll().unwrap();
        let before = monitor.state().clone();
        let err = monitor.poll().unwrap_err();
        assert!(matches!(err, AnomalyError::Source { .. }));
        assert_eq!(monitor.state(), &before);

        monitor.poll().unwrap();
        assert_eq!(monitor.state().ticks(), 2);
    }

    #[test]
    fn test_non_source_errors_are_wrapped() {
        let source = FnSource::new("jobs", || Err(AnomalyError::Settings("bad".into())));
        let mut monitor = Monitor::new(source, config()).unwrap();
        match monitor.poll() {
            Err(AnomalyError::Source { source_name, message }) => {
                assert_eq!(source_name, "jobs");
                assert!(message.contains("bad"));
            }
            other => panic!("expected source error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_sample_is_rejected() {
        let source = scripted(vec![Ok(1.0), Ok(f64::NAN)]);
        let mut monitor = Monitor::new(source, config()).unwrap();
        monitor.poll().unwrap();
        assert!(matches!(
            monitor.poll(),
            Err(AnomalyError::InvalidSample { .. })
        ));
        assert_eq!(monitor.state().ticks(), 1);
    }

    #[test]
    fn test_stop_resets_detector() {
        let source = scripted(vec![Ok(1.0), Ok(2.0), Ok(3.0)]);
        let mut monitor = Monitor::new(source, config()).unwrap();
        for _ in 0..3 {
            monitor.poll().unwrap();
        }
        monitor.stop();
        assert!(monitor.state().window().is_empty());
        assert_eq!(monitor.state(), &DetectorState::create(config()).unwrap());
    }

    #[test]
    fn test_with_state_resumes() {
        let mut first = Monitor::new(scripted(vec![Ok(1.0), Ok(2.0)]), config()).unwrap();
        first.poll().unwrap();
        first.poll().unwrap();
        let (_, state) = first.into_parts();

        let resumed = Monitor::with_state(scripted(vec![]), state.clone()).unwrap();
        assert_eq!(resumed.state(), &state);
    }
}
