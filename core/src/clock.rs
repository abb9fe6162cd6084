//! Simulation clock: owns the tick counter, pause, and the save timestamp
//! offline catch-up is measured from.

use crate::{
    error::{SimError, SimResult},
    snapshot::SnapshotState,
    types::{RunId, Tick},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub run_id:        RunId,
    pub current_tick:  Tick,
    pub paused:        bool,
    /// Wall-clock millis of the last successful save.
    pub last_saved_ms: Option<i64>,
}

impl SimClock {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            current_tick:  0,
            paused:        false,
            last_saved_ms: None,
        }
    }

    /// Advance one tick. Returns the new tick number.
    pub fn advance(&mut self) -> SimResult<Tick> {
        if self.paused {
            return Err(SimError::invalid("tick on a paused clock"));
        }
        self.current_tick += 1;
        Ok(self.current_tick)
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    /// Milliseconds since the last save, or `None` if never saved.
    pub fn elapsed_since_save(&self, now_ms: i64) -> Option<u64> {
        self.last_saved_ms.map(|saved| now_ms.saturating_sub(saved).max(0) as u64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClockState {
    pub current_tick:  Option<Tick>,
    pub paused:        Option<bool>,
    pub last_saved_ms: Option<i64>,
}

impl SnapshotState for SimClock {
    type State = ClockState;

    fn snapshot(&self) -> ClockState {
        ClockState {
            current_tick:  Some(self.current_tick),
            paused:        Some(self.paused),
            last_saved_ms: self.last_saved_ms,
        }
    }

    fn restore(&mut self, state: ClockState) {
        if let Some(tick) = state.current_tick {
            self.current_tick = tick;
        }
        if let Some(paused) = state.paused {
            self.paused = paused;
        }
        if state.last_saved_ms.is_some() {
            self.last_saved_ms = state.last_saved_ms;
        }
    }
}
