//! Per-source detector state and the ingest pipeline.
//!
//! Each tick runs, in this order:
//!
//! 1. validate the sample,
//! 2. forecast from the window *before* the sample is added,
//! 3. push the sample,
//! 4. compute the one-sided residual,
//! 5. evaluate the bound from the residual tracker as it stood before this tick,
//! 6. fold the residual into the tracker,
//! 7. pass the raw flag through the debounce gate.
//!
//! Steps 2 and 5 must see pre-tick state: the forecast is one step ahead, not
//! in-sample, and a sample must not widen its own threshold.

use anomaly_api::DetectorConfig;
use anomaly_spi::{
    AnomalyError, Assessment, Result, StreamingDetector, Timestamp, Verdict,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::debounce::{DebounceGate, GateDecision, GateState};
use crate::forecaster::{ArForecaster, ArModel, ForecastMethod};
use crate::residual::{residual_up, ResidualTracker};
use crate::threshold::ThresholdEvaluator;
use crate::window::SampleWindow;

/// Everything a detector knows about one source.
///
/// Serializable so a host can persist and restore a source without touching
/// any other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    config: DetectorConfig,
    window: SampleWindow,
    forecaster: ArForecaster,
    ar_model: Option<ArModel>,
    residuals: ResidualTracker,
    evaluator: ThresholdEvaluator,
    gate: DebounceGate,
    last_forecast: Option<f64>,
    last_timestamp: Option<Timestamp>,
    ticks: u64,
}

impl DetectorState {
    /// Validate `config` and build an empty state.
    pub fn create(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            window: SampleWindow::new(config.window_size),
            forecaster: ArForecaster::new(config.ar_order, config.non_negative_forecast),
            ar_model: None,
            residuals: ResidualTracker::new(config.ew_alpha, config.window_size),
            evaluator: ThresholdEvaluator::new(config.k_upper, config.min_rel_increase, config.q),
            gate: DebounceGate::new(config.debounce),
            last_forecast: None,
            last_timestamp: None,
            ticks: 0,
            config,
        })
    }

    /// Feed one sample.
    pub fn ingest(&mut self, value: f64, timestamp: Timestamp) -> Result<Verdict> {
        if !value.is_finite() {
            return Err(AnomalyError::InvalidSample { value });
        }

        let history = self.window.snapshot();
        let forecast = self.forecaster.forecast(&history);

        self.window.push(value)?;
        self.ticks += 1;
        self.last_timestamp = Some(timestamp);
        self.last_forecast = forecast.as_ref().map(|f| f.value);
        self.ar_model = forecast.as_ref().and_then(|f| f.model.clone());

        let forecast = match forecast {
            Some(f) if f.method != ForecastMethod::ColdStart => f,
            _ => {
                trace!(tick = self.ticks, len = history.len(), "warming up");
                return Ok(Verdict::InsufficientData);
            }
        };

        let residual = residual_up(value, forecast.value);
        let evaluation = self.evaluator.evaluate(residual, forecast.value, &self.residuals);
        self.residuals.update(residual);

        let assessment = Assessment {
            forecast: forecast.value,
            residual_up: residual,
            bound: evaluation.bound,
        };
        let verdict = match self.gate.filter(evaluation.raw_flag) {
            GateDecision::Pass => Verdict::Normal(assessment),
            GateDecision::Emit => Verdict::Anomaly(assessment),
            GateDecision::Suppress => Verdict::Suppressed(assessment),
        };

        trace!(
            tick = self.ticks,
            value,
            forecast = forecast.value,
            method = ?forecast.method,
            residual_up = residual,
            bound = evaluation.bound,
            verdict = verdict.label(),
            "tick"
        );
        Ok(verdict)
    }

    /// Drop all buffered history, keeping the configuration.
    pub fn reset(&mut self) {
        debug!(ticks = self.ticks, "detector reset");
        self.window.clear();
        self.ar_model = None;
        self.residuals.clear();
        self.gate.clear();
        self.last_forecast = None;
        self.last_timestamp = None;
        self.ticks = 0;
    }

    /// Switch to a new configuration.
    ///
    /// Changing `window_size` or `ar_order` invalidates the buffers and
    /// resets the state; other parameters take effect from the next tick.
    pub fn reconfigure(&mut self, config: DetectorConfig) -> Result<()> {
        config.validate()?;
        if self.config.reshapes_window(&config) {
            *self = Self::create(config)?;
            debug!("detector rebuilt for new window shape");
            return Ok(());
        }
        self.forecaster = ArForecaster::new(config.ar_order, config.non_negative_forecast);
        self.residuals.set_alpha(config.ew_alpha);
        self.evaluator = ThresholdEvaluator::new(config.k_upper, config.min_rel_increase, config.q);
        self.gate.set_debounce(config.debounce);
        self.config = config;
        Ok(())
    }

    /// Check the structural invariants, e.g. after deserializing a snapshot.
    pub fn check_invariants(&self) -> Result<()> {
        self.config.validate()?;
        let corrupt = |reason: &str| AnomalyError::invalid_config("state", reason);
        if self.window.capacity() != self.config.window_size
            || self.window.len() > self.config.window_size
        {
            return Err(corrupt("window does not match window_size"));
        }
        if self.forecaster.order() != self.config.ar_order {
            return Err(corrupt("forecaster order does not match ar_order"));
        }
        if self.residuals.history_len() > self.config.window_size {
            return Err(corrupt("residual history exceeds window_size"));
        }
        if self.residuals.history().iter().any(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(corrupt("residual history holds non-positive values"));
        }
        if self.window.iter().any(|v| !v.is_finite()) {
            return Err(corrupt("window holds non-finite values"));
        }
        if let Some(var) = self.residuals.ew_var() {
            if !(var.is_finite() && var >= 0.0) {
                return Err(corrupt("residual variance is negative or non-finite"));
            }
        }
        if self.last_forecast.is_some_and(|f| !f.is_finite()) {
            return Err(corrupt("last forecast is non-finite"));
        }
        if self.gate.remaining() > self.config.debounce {
            return Err(corrupt("debounce countdown exceeds debounce"));
        }
        Ok(())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Coefficients from the last successful fit.
    pub fn ar_model(&self) -> Option<&ArModel> {
        self.ar_model.as_ref()
    }

    pub fn ew_scale(&self) -> f64 {
        self.residuals.ew_scale()
    }

    pub fn positive_residual_history(&self) -> Vec<f64> {
        self.residuals.history()
    }

    /// Empirical quantile of the positive-residual history.
    pub fn quantile(&self, q: f64) -> f64 {
        self.residuals.quantile(q)
    }

    pub fn debounce_remaining(&self) -> usize {
        self.gate.remaining()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Raw flags swallowed by the debounce gate since creation or reset.
    pub fn suppressed_flags(&self) -> u64 {
        self.gate.swallowed()
    }

    pub fn last_forecast(&self) -> Option<f64> {
        self.last_forecast
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }

    /// Samples accepted since creation or reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl StreamingDetector for DetectorState {
    fn ingest(&mut self, value: f64, timestamp: Timestamp) -> Result<Verdict> {
        DetectorState::ingest(self, value, timestamp)
    }

    fn window(&self) -> Vec<f64> {
        self.window.snapshot()
    }

    fn reset(&mut self) {
        DetectorState::reset(self)
    }
}

/// Build a fresh detector state from `config`.
pub fn create(config: DetectorConfig) -> Result<DetectorState> {
    DetectorState::create(config)
}

/// Pure form of [`DetectorState::ingest`]: `(state, value) -> (state', verdict)`.
pub fn ingest(
    state: &DetectorState,
    value: f64,
    timestamp: Timestamp,
) -> Result<(DetectorState, Verdict)> {
    let mut next = state.clone();
    let verdict = next.ingest(value, timestamp)?;
    Ok((next, verdict))
}

/// Fresh state with the same configuration as `state`.
pub fn reset(state: &DetectorState) -> DetectorState {
    let mut next = state.clone();
    next.reset();
    next
}
