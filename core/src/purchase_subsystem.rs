//! Purchase subsystem: building ownership and the bulk purchase solver.
//!
//! RULE: `count` only ever grows within a run. It is rebuilt from
//! definitions on deployment and nowhere else.

use crate::{
    cost_model::{bulk_cost_with_reduction, unit_cost},
    definitions::{BuildingDef, Definitions},
    error::{SimError, SimResult},
    ledger::ResourceLedger,
    snapshot::SnapshotState,
    types::{CostMap, EntityId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildingState {
    pub count:    u64,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingRoster {
    order:     Vec<EntityId>,
    buildings: BTreeMap<EntityId, BuildingState>,
}

impl BuildingRoster {
    pub fn from_definitions(defs: &Definitions) -> Self {
        Self {
            order: defs.buildings.iter().map(|b| b.id.clone()).collect(),
            buildings: defs.buildings.iter()
                .map(|b| (b.id.clone(), BuildingState { count: 0, unlocked: b.unlock.is_always() }))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&BuildingState> {
        self.buildings.get(id)
    }

    pub fn count(&self, id: &str) -> u64 {
        self.buildings.get(id).map(|b| b.count).unwrap_or(0)
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.buildings.get(id).map(|b| b.unlocked).unwrap_or(false)
    }

    /// One-way. Returns true only when the flag actually flipped.
    pub fn unlock(&mut self, id: &str) -> bool {
        match self.buildings.get_mut(id) {
            Some(b) if !b.unlocked => {
                b.unlocked = true;
                true
            }
            _ => false,
        }
    }

    /// Owned count per building, in id order.
    pub fn counts(&self) -> BTreeMap<EntityId, u64> {
        self.buildings.iter().map(|(id, b)| (id.clone(), b.count)).collect()
    }

    pub fn total_owned(&self) -> u64 {
        self.buildings.values().map(|b| b.count).sum()
    }

    /// Buildings in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &BuildingState)> {
        self.order.iter().filter_map(|id| self.buildings.get_key_value(id))
    }
}

/// How many units a purchase asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "count", rename_all = "snake_case")]
pub enum PurchaseAmount {
    Count(u64),
    Max,
    /// Whatever the engine's purchase multiplier currently is.
    Configured,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseReceipt {
    pub building:  EntityId,
    pub requested: u64,
    pub quantity:  u64,
    pub cost:      CostMap,
    pub new_count: u64,
}

/// Largest `qty ∈ [0, cap]` whose bulk cost the ledger covers.
///
/// Binary search over a monotone predicate: every unit costs ≥ 0, so
/// `bulk_cost(qty)` never decreases as `qty` grows.
pub fn max_affordable(
    def: &BuildingDef,
    owned: u64,
    ledger: &ResourceLedger,
    reduction: f64,
    cap: u64,
) -> u64 {
    let affordable = |qty: u64| ledger.can_afford(&bulk_cost_with_reduction(def, owned, qty, reduction));
    let (mut lo, mut hi) = (0u64, cap);
    while lo < hi {
        let mid = lo + (hi - lo) / 2 + 1;
        if affordable(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Resolve the amount, fall back to what is affordable, debit atomically
/// and add the units. The caller recalculates rates afterwards.
pub fn purchase(
    roster: &mut BuildingRoster,
    def: &BuildingDef,
    ledger: &mut ResourceLedger,
    amount: PurchaseAmount,
    configured: u64,
    reduction: f64,
    cap: u64,
) -> SimResult<PurchaseReceipt> {
    let state = roster.buildings.get(&def.id)
        .ok_or_else(|| SimError::invalid(format!("unknown building '{}'", def.id)))?;
    if !state.unlocked {
        return Err(SimError::invalid(format!("building '{}' is locked", def.id)));
    }
    let owned = state.count;

    let requested = match amount {
        PurchaseAmount::Count(0) => return Err(SimError::invalid("purchase of zero units")),
        PurchaseAmount::Count(n) => n,
        PurchaseAmount::Max => cap,
        PurchaseAmount::Configured => configured.max(1),
    };

    let mut quantity = requested;
    let mut cost = bulk_cost_with_reduction(def, owned, quantity, reduction);
    if !ledger.can_afford(&cost) {
        quantity = max_affordable(def, owned, ledger, reduction, requested.min(cap));
        if quantity == 0 {
            let next = unit_cost(&def.base_cost, def.cost_growth, owned, reduction);
            return Err(SimError::insufficient(format!(
                "{}: {}", def.id, ledger.shortfall(&next)
            )));
        }
        cost = bulk_cost_with_reduction(def, owned, quantity, reduction);
    }

    if !ledger.spend(&cost) {
        return Err(SimError::insufficient(format!("{}: {}", def.id, ledger.shortfall(&cost))));
    }

    let entry = roster.buildings.entry(def.id.clone()).or_default();
    entry.count += quantity;

    Ok(PurchaseReceipt {
        building: def.id.clone(),
        requested,
        quantity,
        cost,
        new_count: entry.count,
    })
}

// ── Snapshot ───────────────────────────────────────────────────

pub type BuildingsState = BTreeMap<EntityId, BuildingState>;

impl SnapshotState for BuildingRoster {
    type State = BuildingsState;

    fn snapshot(&self) -> BuildingsState {
        self.buildings.clone()
    }

    /// Unknown ids are dropped. A saved unlock sticks; a saved lock
    /// never re-locks.
    fn restore(&mut self, state: BuildingsState) {
        for (id, saved) in state {
            match self.buildings.get_mut(&id) {
                Some(b) => {
                    b.count = saved.count;
                    b.unlocked |= saved.unlocked;
                }
                None => log::debug!("snapshot: ignoring unknown building '{id}'"),
            }
        }
    }
}
