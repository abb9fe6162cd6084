//! Research subsystem: the research DAG and its multiplier cache.
//!
//! RULE: `researched` is private. The only ways to flip it are
//! `research()` and `restore()`, and both drop the cached multipliers.
//! The cache is therefore either empty or equal to a full recompute.

use crate::{
    definitions::{Definitions, ResearchDef, ResearchEffect},
    error::{SimError, SimResult},
    ledger::ResourceLedger,
    snapshot::SnapshotState,
    types::{CostMap, EntityId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate of every researched node's effect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResearchMultipliers {
    pub global:             f64,
    pub training_speed:     f64,
    pub model_performance:  f64,
    pub efficiency:         f64,
    pub data_production:    f64,
    pub compute_efficiency: f64,
    pub research_speed:     f64,
    pub safety_bonus:       f64,
}

impl Default for ResearchMultipliers {
    fn default() -> Self {
        Self {
            global:             1.0,
            training_speed:     1.0,
            model_performance:  1.0,
            efficiency:         1.0,
            data_production:    1.0,
            compute_efficiency: 1.0,
            research_speed:     1.0,
            safety_bonus:       1.0,
        }
    }
}

impl ResearchMultipliers {
    /// One pass over the effects; multipliers compound.
    pub fn aggregate<'a>(effects: impl IntoIterator<Item = &'a ResearchEffect>) -> Self {
        let mut m = Self::default();
        for effect in effects {
            match effect {
                ResearchEffect::GlobalMultiplier(v)  => m.global             *= v,
                ResearchEffect::TrainingSpeed(v)     => m.training_speed     *= v,
                ResearchEffect::ModelPerformance(v)  => m.model_performance  *= v,
                ResearchEffect::Efficiency(v)        => m.efficiency         *= v,
                ResearchEffect::DataProduction(v)    => m.data_production    *= v,
                ResearchEffect::ComputeEfficiency(v) => m.compute_efficiency *= v,
                ResearchEffect::ResearchSpeed(v)     => m.research_speed     *= v,
                ResearchEffect::SafetyBonus(v)       => m.safety_bonus       *= v,
                ResearchEffect::UnlockEntities(_)    => {}
            }
        }
        m
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchNode {
    def:        ResearchDef,
    researched: bool,
    unlocked:   bool,
}

impl ResearchNode {
    pub fn def(&self) -> &ResearchDef { &self.def }
    pub fn is_researched(&self) -> bool { self.researched }
    pub fn is_unlocked(&self) -> bool { self.unlocked }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchTree {
    /// Definition order, for deterministic iteration.
    order: Vec<EntityId>,
    nodes: BTreeMap<EntityId, ResearchNode>,
    cache: Option<ResearchMultipliers>,
}

impl ResearchTree {
    pub fn from_definitions(defs: &Definitions) -> Self {
        let order = defs.research.iter().map(|r| r.id.clone()).collect();
        let nodes = defs.research.iter()
            .map(|r| {
                let unlocked = r.unlock.is_always();
                (r.id.clone(), ResearchNode { def: r.clone(), researched: false, unlocked })
            })
            .collect();
        Self { order, nodes, cache: None }
    }

    pub fn node(&self, id: &str) -> Option<&ResearchNode> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResearchNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn is_researched(&self, id: &str) -> bool {
        self.nodes.get(id).map(|n| n.researched).unwrap_or(false)
    }

    pub fn researched_ids(&self) -> BTreeSet<EntityId> {
        self.nodes.values()
            .filter(|n| n.researched)
            .map(|n| n.def.id.clone())
            .collect()
    }

    pub fn researched_count(&self) -> usize {
        self.nodes.values().filter(|n| n.researched).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn prerequisites_met(&self, id: &str) -> bool {
        self.nodes.get(id)
            .map(|n| n.def.prerequisites.iter().all(|p| self.is_researched(p)))
            .unwrap_or(false)
    }

    /// Unlocked and every prerequisite researched.
    pub fn is_available(&self, id: &str) -> bool {
        self.nodes.get(id).map(|n| n.unlocked && !n.researched).unwrap_or(false)
            && self.prerequisites_met(id)
    }

    /// One-way. Returns true only when the flag actually flipped.
    pub fn unlock(&mut self, id: &str) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if !node.unlocked => {
                node.unlocked = true;
                true
            }
            _ => false,
        }
    }

    /// Research cost after the permanent research-upgrade divisor.
    pub fn cost_of(&self, id: &str, research_upgrade: f64) -> Option<CostMap> {
        let node = self.nodes.get(id)?;
        let divisor = if research_upgrade.is_finite() && research_upgrade > 0.0 { research_upgrade } else { 1.0 };
        Some(node.def.cost.iter()
            .map(|(r, v)| (r.clone(), (v / divisor).ceil()))
            .collect())
    }

    /// Pay for and complete a research node. Invalidates the cache.
    pub fn research(
        &mut self,
        id: &str,
        ledger: &mut ResourceLedger,
        research_upgrade: f64,
    ) -> SimResult<ResearchDef> {
        let node = self.nodes.get(id)
            .ok_or_else(|| SimError::invalid(format!("unknown research '{id}'")))?;
        if node.researched {
            return Err(SimError::invalid(format!("research '{id}' already completed")));
        }
        if !node.unlocked {
            return Err(SimError::invalid(format!("research '{id}' is locked")));
        }
        if !self.prerequisites_met(id) {
            return Err(SimError::invalid(format!("research '{id}' has unmet prerequisites")));
        }
        let cost = self.cost_of(id, research_upgrade).unwrap_or_default();
        if !ledger.spend(&cost) {
            return Err(SimError::insufficient(ledger.shortfall(&cost)));
        }

        let node = self.nodes.get_mut(id)
            .ok_or_else(|| SimError::invalid(format!("unknown research '{id}'")))?;
        node.researched = true;
        let def = node.def.clone();
        self.cache = None;
        Ok(def)
    }

    /// Cached aggregate, recomputed on demand after invalidation.
    pub fn multipliers(&mut self) -> ResearchMultipliers {
        if let Some(cached) = self.cache {
            return cached;
        }
        let fresh = self.compute_multipliers();
        self.cache = Some(fresh);
        fresh
    }

    /// Full recompute, bypassing the cache.
    pub fn compute_multipliers(&self) -> ResearchMultipliers {
        ResearchMultipliers::aggregate(
            self.iter().filter(|n| n.researched).map(|n| &n.def.effect),
        )
    }

    pub fn cached_multipliers(&self) -> Option<ResearchMultipliers> {
        self.cache
    }

    /// category -> (completed, total)
    pub fn category_progress(&self) -> BTreeMap<String, (usize, usize)> {
        let mut out: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for node in self.nodes.values() {
            let entry = out.entry(node.def.category.clone()).or_insert((0, 0));
            entry.1 += 1;
            if node.researched {
                entry.0 += 1;
            }
        }
        out
    }
}

// ── Snapshot ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchState {
    pub researched: Vec<EntityId>,
    pub unlocked:   Vec<EntityId>,
}

impl SnapshotState for ResearchTree {
    type State = ResearchState;

    fn snapshot(&self) -> ResearchState {
        ResearchState {
            researched: self.iter().filter(|n| n.researched).map(|n| n.def.id.clone()).collect(),
            unlocked:   self.iter().filter(|n| n.unlocked).map(|n| n.def.id.clone()).collect(),
        }
    }

    fn restore(&mut self, state: ResearchState) {
        for id in state.unlocked {
            self.unlock(&id);
        }
        for id in state.researched {
            match self.nodes.get_mut(&id) {
                Some(node) => {
                    node.researched = true;
                    node.unlocked = true;
                }
                None => log::debug!("snapshot: ignoring unknown research '{id}'"),
            }
        }
        self.cache = None;
    }
}
