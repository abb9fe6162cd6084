//! Resource ledger: sole owner of resource amounts and rates.
//!
//! RULE: Nothing outside this module writes a Resource field.
//! Rates are written only by the bonus recalculation; amounts only
//! through add / spend / accrue.

use crate::{
    error::{SimError, SimResult},
    snapshot::SnapshotState,
    types::{CostMap, ResourceId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    amount:         f64,
    per_second:     f64,
    lifetime_total: f64,
    /// Present only for resources that track a running maximum.
    running_max:    Option<f64>,
}

impl Resource {
    pub fn new(initial: f64, track_max: bool) -> Self {
        let initial = if initial.is_finite() { initial.max(0.0) } else { 0.0 };
        Self {
            amount:         initial,
            per_second:     0.0,
            lifetime_total: 0.0,
            running_max:    track_max.then_some(initial),
        }
    }

    pub fn amount(&self) -> f64         { self.amount }
    pub fn per_second(&self) -> f64     { self.per_second }
    pub fn lifetime_total(&self) -> f64 { self.lifetime_total }
    pub fn running_max(&self) -> Option<f64> { self.running_max }

    /// Highest balance seen this run, or the current balance when no maximum is tracked.
    pub fn peak(&self) -> f64 {
        self.running_max.unwrap_or(self.amount)
    }

    fn credit(&mut self, delta: f64) {
        self.amount += delta;
        if delta > 0.0 {
            self.lifetime_total += delta;
        }
        if let Some(max) = self.running_max.as_mut() {
            if self.amount > *max {
                *max = self.amount;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLedger {
    resources: BTreeMap<ResourceId, Resource>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Re-registering an id replaces it.
    pub fn register(&mut self, id: impl Into<ResourceId>, initial: f64, track_max: bool) {
        self.resources.insert(id.into(), Resource::new(initial, track_max));
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// Current balance; 0 for unknown resources.
    pub fn amount(&self, id: &str) -> f64 {
        self.resources.get(id).map(|r| r.amount).unwrap_or(0.0)
    }

    pub fn per_second(&self, id: &str) -> f64 {
        self.resources.get(id).map(|r| r.per_second).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &Resource)> {
        self.resources.iter()
    }

    /// `amount += delta`. Returns false (and changes nothing) for unknown
    /// ids or when the result would be negative or non-finite.
    pub fn add(&mut self, id: &str, delta: f64) -> bool {
        let Some(res) = self.resources.get_mut(id) else {
            log::warn!("ledger: add to unknown resource '{id}'");
            return false;
        };
        let next = res.amount + delta;
        if !next.is_finite() || next < 0.0 {
            log::error!("ledger: rejected add {delta} to '{id}' (would become {next})");
            return false;
        }
        res.credit(delta);
        true
    }

    /// True iff every listed resource exists and covers its cost.
    pub fn can_afford(&self, cost: &CostMap) -> bool {
        cost.iter().all(|(id, &needed)| {
            self.resources
                .get(id)
                .map(|r| needed.is_finite() && r.amount >= needed)
                .unwrap_or(false)
        })
    }

    /// All-or-nothing debit. Returns false with no change if unaffordable.
    pub fn spend(&mut self, cost: &CostMap) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for (id, &needed) in cost {
            if let Some(res) = self.resources.get_mut(id) {
                // Clamp guards the last ulp when a balance exactly equals the cost.
                res.amount = (res.amount - needed).max(0.0);
            }
        }
        true
    }

    /// Describe which entries of `cost` are short. Used for error messages.
    pub fn shortfall(&self, cost: &CostMap) -> String {
        cost.iter()
            .filter(|(id, &needed)| self.amount(id) < needed || !self.contains(id))
            .map(|(id, needed)| format!("{id} {:.2}/{needed:.2}", self.amount(id)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ── Rates (bonus recalculation only) ───────────────────────

    pub(crate) fn zero_rates(&mut self) {
        for res in self.resources.values_mut() {
            res.per_second = 0.0;
        }
    }

    pub(crate) fn add_rate(&mut self, id: &str, delta: f64) {
        if let Some(res) = self.resources.get_mut(id) {
            res.per_second += delta;
        }
    }

    pub(crate) fn scale_rate(&mut self, id: &str, factor: f64) {
        if let Some(res) = self.resources.get_mut(id) {
            res.per_second *= factor;
        }
    }

    pub(crate) fn scale_all_rates(&mut self, factor: f64) {
        for res in self.resources.values_mut() {
            res.per_second *= factor;
        }
    }

    /// Credit `per_second * dt` to every resource with a positive rate.
    ///
    /// Every resulting amount is validated before anything is written;
    /// a non-finite rate or result rejects the whole accrual.
    /// Returns the amount credited per resource.
    pub fn accrue(&mut self, dt: f64) -> SimResult<CostMap> {
        let mut gains = CostMap::new();
        for (id, res) in &self.resources {
            if !res.per_second.is_finite() {
                return Err(SimError::InvariantViolation(format!(
                    "rate for '{id}' is {}",
                    res.per_second
                )));
            }
            if res.per_second <= 0.0 {
                continue;
            }
            let gain = res.per_second * dt;
            let next = res.amount + gain;
            if !gain.is_finite() || !next.is_finite() || next < 0.0 {
                return Err(SimError::InvariantViolation(format!(
                    "accrual of {gain} to '{id}' would produce {next}"
                )));
            }
            gains.insert(id.clone(), gain);
        }
        for (id, gain) in &gains {
            if let Some(res) = self.resources.get_mut(id) {
                res.credit(*gain);
            }
        }
        Ok(gains)
    }
}

// ── Snapshot ───────────────────────────────────────────────────

/// Persisted form of one resource. Rates are derived and never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceState {
    pub amount:         Option<f64>,
    pub lifetime_total: Option<f64>,
    pub running_max:    Option<f64>,
}

impl SnapshotState for ResourceLedger {
    type State = BTreeMap<ResourceId, ResourceState>;

    fn snapshot(&self) -> Self::State {
        self.resources
            .iter()
            .map(|(id, r)| {
                (id.clone(), ResourceState {
                    amount:         Some(r.amount),
                    lifetime_total: Some(r.lifetime_total),
                    running_max:    r.running_max,
                })
            })
            .collect()
    }

    fn restore(&mut self, state: Self::State) {
        for (id, saved) in state {
            let Some(res) = self.resources.get_mut(&id) else {
                log::debug!("snapshot: ignoring unknown resource '{id}'");
                continue;
            };
            if let Some(v) = saved.amount.filter(|v| v.is_finite() && *v >= 0.0) {
                res.amount = v;
            }
            if let Some(v) = saved.lifetime_total.filter(|v| v.is_finite() && *v >= 0.0) {
                res.lifetime_total = v;
            }
            if let Some(max) = res.running_max.as_mut() {
                if let Some(v) = saved.running_max.filter(|v| v.is_finite()) {
                    *max = v;
                }
                *max = max.max(res.amount);
            }
        }
    }
}
