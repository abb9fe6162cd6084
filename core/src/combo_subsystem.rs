//! Combo subsystem: time-decaying manual-click multiplier.
//!
//! Inactive (level 1) ⇄ Active(level). Each click inside the window
//! extends the streak; the level is a saturating step of the streak
//! length. The combo owns a monotonic millisecond clock advanced by
//! `update()`; `click()` reads it.

use crate::snapshot::SnapshotState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_COMBO_LEVEL: u32 = 8;

/// f(1)=1, f(2)=2, f(3)=4, f(≥4)=8.
pub fn level_for(clicks: u32) -> u32 {
    match clicks {
        0 | 1 => 1,
        2 => 2,
        3 => 4,
        _ => MAX_COMBO_LEVEL,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComboState {
    level:              u32,
    consecutive_clicks: u32,
    active:             bool,
    window_start_ms:    f64,
    window_ms:          f64,
    now_ms:             f64,

    // ── Tracking ───────────────────────────────
    total_clicks:       u64,
    max_level:          u32,
    /// level -> how many times it was entered
    level_reached:      BTreeMap<u32, u64>,
    max_level_since_ms: Option<f64>,
    longest_at_max_ms:  f64,
}

impl ComboState {
    pub fn new(window_ms: f64) -> Self {
        Self {
            level:              1,
            consecutive_clicks: 0,
            active:             false,
            window_start_ms:    0.0,
            window_ms,
            now_ms:             0.0,
            total_clicks:       0,
            max_level:          1,
            level_reached:      BTreeMap::new(),
            max_level_since_ms: None,
            longest_at_max_ms:  0.0,
        }
    }

    pub fn level(&self) -> u32 { self.level }
    pub fn consecutive_clicks(&self) -> u32 { self.consecutive_clicks }
    pub fn is_active(&self) -> bool { self.active }
    pub fn total_clicks(&self) -> u64 { self.total_clicks }
    pub fn max_level(&self) -> u32 { self.max_level }
    pub fn times_reached(&self, level: u32) -> u64 {
        self.level_reached.get(&level).copied().unwrap_or(0)
    }

    /// Longest unbroken stretch spent at the top level, including a
    /// stretch still in progress.
    pub fn longest_at_max_ms(&self) -> f64 {
        let running = self.max_level_since_ms.map(|since| self.now_ms - since).unwrap_or(0.0);
        self.longest_at_max_ms.max(running)
    }

    /// Milliseconds left before the streak lapses; 0 when inactive.
    pub fn remaining_ms(&self) -> f64 {
        if !self.active {
            return 0.0;
        }
        (self.window_start_ms + self.window_ms - self.now_ms).max(0.0)
    }

    /// Register a click. Returns the multiplier for this collection.
    pub fn click(&mut self) -> u32 {
        if self.active && self.now_ms - self.window_start_ms > self.window_ms {
            self.lapse();
        }
        self.consecutive_clicks = self.consecutive_clicks.saturating_add(1);
        self.window_start_ms = self.now_ms;
        self.active = true;
        self.total_clicks += 1;
        self.set_level(level_for(self.consecutive_clicks));
        self.level
    }

    /// Advance the combo clock; lapse the streak once the window is spent.
    pub fn update(&mut self, dt_ms: f64) {
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.now_ms += dt_ms;
        }
        if self.active && self.now_ms - self.window_start_ms >= self.window_ms {
            self.lapse();
        }
    }

    fn lapse(&mut self) {
        let expired_at = (self.window_start_ms + self.window_ms).min(self.now_ms);
        self.close_max_stretch(expired_at);
        self.active = false;
        self.consecutive_clicks = 0;
        self.level = 1;
    }

    fn set_level(&mut self, level: u32) {
        if level == self.level {
            return;
        }
        if self.level == MAX_COMBO_LEVEL {
            self.close_max_stretch(self.now_ms);
        }
        self.level = level;
        *self.level_reached.entry(level).or_insert(0) += 1;
        self.max_level = self.max_level.max(level);
        if level == MAX_COMBO_LEVEL {
            self.max_level_since_ms = Some(self.now_ms);
        }
    }

    fn close_max_stretch(&mut self, end_ms: f64) {
        if let Some(since) = self.max_level_since_ms.take() {
            self.longest_at_max_ms = self.longest_at_max_ms.max(end_ms - since);
        }
    }
}

// ── Snapshot ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComboSnapshot {
    pub level:              Option<u32>,
    pub consecutive_clicks: Option<u32>,
    pub active:             Option<bool>,
    pub window_start_ms:    Option<f64>,
    pub now_ms:             Option<f64>,
    pub total_clicks:       Option<u64>,
    pub max_level:          Option<u32>,
    pub level_reached:      Option<BTreeMap<u32, u64>>,
    pub max_level_since_ms: Option<f64>,
    pub longest_at_max_ms:  Option<f64>,
}

impl SnapshotState for ComboState {
    type State = ComboSnapshot;

    fn snapshot(&self) -> ComboSnapshot {
        ComboSnapshot {
            level:              Some(self.level),
            consecutive_clicks: Some(self.consecutive_clicks),
            active:             Some(self.active),
            window_start_ms:    Some(self.window_start_ms),
            now_ms:             Some(self.now_ms),
            total_clicks:       Some(self.total_clicks),
            max_level:          Some(self.max_level),
            level_reached:      Some(self.level_reached.clone()),
            max_level_since_ms: self.max_level_since_ms,
            longest_at_max_ms:  Some(self.longest_at_max_ms),
        }
    }

    fn restore(&mut self, state: ComboSnapshot) {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        if let Some(clicks) = state.consecutive_clicks {
            self.consecutive_clicks = clicks;
            self.level = level_for(clicks);
        }
        if let Some(level) = state.level.filter(|l| [1, 2, 4, MAX_COMBO_LEVEL].contains(l)) {
            self.level = level;
        }
        if let Some(active) = state.active {
            self.active = active;
        }
        if let Some(v) = finite(state.window_start_ms) {
            self.window_start_ms = v;
        }
        if let Some(v) = finite(state.now_ms) {
            self.now_ms = v;
        }
        if let Some(v) = state.total_clicks {
            self.total_clicks = v;
        }
        if let Some(v) = state.max_level {
            self.max_level = self.max_level.max(v);
        }
        if let Some(v) = state.level_reached {
            self.level_reached = v;
        }
        self.max_level_since_ms = finite(state.max_level_since_ms)
            .filter(|_| self.level == MAX_COMBO_LEVEL);
        if let Some(v) = finite(state.longest_at_max_ms) {
            self.longest_at_max_ms = v;
        }
        if !self.active {
            self.level = 1;
            self.consecutive_clicks = 0;
        }
    }
}
