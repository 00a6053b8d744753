//! Cooldown after a reported anomaly.

use serde::{Deserialize, Serialize};

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Armed,
    Suppressed { remaining: usize },
}

/// What the gate decided for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateDecision {
    /// Armed and no raw flag.
    Pass,
    /// Armed and flagged: report the anomaly.
    Emit,
    /// Inside the cooldown.
    Suppress,
}

/// Suppresses reports for `debounce` ticks after each emitted anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebounceGate {
    debounce: usize,
    remaining: usize,
    swallowed: u64,
}

impl DebounceGate {
    pub fn new(debounce: usize) -> Self {
        Self {
            debounce,
            remaining: 0,
            swallowed: 0,
        }
    }

    pub fn filter(&mut self, raw_flag: bool) -> GateDecision {
        if self.remaining > 0 {
            self.remaining -= 1;
            if raw_flag {
                self.swallowed += 1;
            }
            return GateDecision::Suppress;
        }
        if raw_flag {
            self.remaining = self.debounce;
            return GateDecision::Emit;
        }
        GateDecision::Pass
    }

    pub fn state(&self) -> GateState {
        if self.remaining > 0 {
            GateState::Suppressed {
                remaining: self.remaining,
            }
        } else {
            GateState::Armed
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn debounce(&self) -> usize {
        self.debounce
    }

    /// Raw flags that fell inside a cooldown.
    pub fn swallowed(&self) -> u64 {
        self.swallowed
    }

    /// Change the cooldown length; a running countdown is capped at the new length.
    pub fn set_debounce(&mut self, debounce: usize) {
        self.debounce = debounce;
        self.remaining = self.remaining.min(debounce);
    }

    pub fn clear(&mut self) {
        self.remaining = 0;
        self.swallowed = 0;
    }
}
