//! Bonus composition: folds every multiplier source into per-resource rates.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Zero every resource rate
//!   2. Research multipliers          (cached on the research tree)
//!   3. Permanent-upgrade multipliers (by category; unknown = 1)
//!   4. Building base production × count × efficiency
//!   5. Resource-specific achievement × matching research multiplier
//!   6. Building-sourced flat global bonus
//!   7. Overall global multiplier
//!   8. Every rate × global
//!   9. Active training output × model performance × global
//!
//! Step 9 runs after step 8 on purpose: active-training output picks up the
//! global multiplier through its own path and must not be scaled twice.
//!
//! RULE: Call recalculate() after every structural change (purchase,
//! research, achievement unlock, training start/stop, upgrade, deployment,
//! import) and before the next accrual.

use crate::{
    definitions::{Definitions, ModelDef},
    ledger::ResourceLedger,
    research_subsystem::{ResearchMultipliers, ResearchTree},
    types::{EntityId, COMPUTE, DATA, RESEARCH_POINTS},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Achievement rewards ────────────────────────────────────────

/// What an achievement reward boosts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    DataGeneration,
    ComputePower,
    ResearchPoints,
    GlobalMultiplier,
    AllProduction,
    AllResources,
    ModelPerformance,
    TrainingSpeed,
    ClickPower,
    /// Additive fraction taken off every building unit price.
    BuildingCostReduction,
}

/// A structured reward: `magnitude` 0.10 means +10%.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    pub kind:      BonusKind,
    pub magnitude: f64,
}

impl Reward {
    pub fn new(kind: BonusKind, magnitude: f64) -> Self {
        Self { kind, magnitude }
    }
}

/// Achievement-sourced factors, folded in as achievements unlock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BonusAccumulator {
    pub data_generation:         f64,
    pub compute_power:           f64,
    pub research_points:         f64,
    pub global_multiplier:       f64,
    pub all_production:          f64,
    pub all_resources:           f64,
    pub model_performance:       f64,
    pub training_speed:          f64,
    pub click_power:             f64,
    pub building_cost_reduction: f64,
}

impl Default for BonusAccumulator {
    fn default() -> Self {
        Self {
            data_generation:         1.0,
            compute_power:           1.0,
            research_points:         1.0,
            global_multiplier:       1.0,
            all_production:          1.0,
            all_resources:           1.0,
            model_performance:       1.0,
            training_speed:          1.0,
            click_power:             1.0,
            building_cost_reduction: 0.0,
        }
    }
}

impl BonusAccumulator {
    /// Fold one reward in. Multipliers compound; cost reduction adds and
    /// is clamped to `max_reduction`.
    pub fn apply(&mut self, reward: &Reward, max_reduction: f64) {
        if !reward.magnitude.is_finite() {
            log::warn!("bonus: ignoring non-finite reward {:?}", reward.kind);
            return;
        }
        let factor = 1.0 + reward.magnitude;
        match reward.kind {
            BonusKind::DataGeneration   => self.data_generation   *= factor,
            BonusKind::ComputePower     => self.compute_power     *= factor,
            BonusKind::ResearchPoints   => self.research_points   *= factor,
            BonusKind::GlobalMultiplier => self.global_multiplier *= factor,
            BonusKind::AllProduction    => self.all_production    *= factor,
            BonusKind::AllResources     => self.all_resources     *= factor,
            BonusKind::ModelPerformance => self.model_performance *= factor,
            BonusKind::TrainingSpeed    => self.training_speed    *= factor,
            BonusKind::ClickPower       => self.click_power       *= factor,
            BonusKind::BuildingCostReduction => {
                self.building_cost_reduction =
                    (self.building_cost_reduction + reward.magnitude).clamp(0.0, max_reduction);
            }
        }
    }

    /// Rebuild from scratch. Equal to folding the same rewards incrementally.
    pub fn from_rewards<'a>(rewards: impl IntoIterator<Item = &'a Reward>, max_reduction: f64) -> Self {
        let mut acc = Self::default();
        for reward in rewards {
            acc.apply(reward, max_reduction);
        }
        acc
    }
}

// ── Permanent upgrades ─────────────────────────────────────────

pub const UPGRADE_TRAINING:   &str = "training";
pub const UPGRADE_EFFICIENCY: &str = "efficiency";
pub const UPGRADE_RESEARCH:   &str = "research";
pub const UPGRADE_PRESTIGE:   &str = "prestige";

/// Permanent-upgrade factors by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeMultipliers {
    by_category: BTreeMap<String, f64>,
}

impl UpgradeMultipliers {
    /// Each owned level contributes `1 + effect_per_level`, compounding.
    pub fn aggregate(defs: &Definitions, purchased: &BTreeMap<EntityId, u32>) -> Self {
        let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
        for (id, &level) in purchased {
            let Some(def) = defs.upgrade(id) else {
                log::debug!("bonus: purchased upgrade '{id}' has no definition");
                continue;
            };
            let factor = (1.0 + def.effect_per_level).powi(level.min(def.max_level) as i32);
            *by_category.entry(def.category.clone()).or_insert(1.0) *= factor;
        }
        Self { by_category }
    }

    /// Neutral 1.0 for categories nothing has been bought in (or unknown ones).
    pub fn category(&self, name: &str) -> f64 {
        self.by_category.get(name).copied().unwrap_or(1.0)
    }

    pub fn training(&self) -> f64   { self.category(UPGRADE_TRAINING) }
    pub fn efficiency(&self) -> f64 { self.category(UPGRADE_EFFICIENCY) }
    pub fn research(&self) -> f64   { self.category(UPGRADE_RESEARCH) }
    pub fn prestige(&self) -> f64   { self.category(UPGRADE_PRESTIGE) }
}

// ── Composition ────────────────────────────────────────────────

/// The factors the last recalculation used. Read-only, for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateBreakdown {
    pub research:        ResearchMultipliers,
    pub upgrades:        UpgradeMultipliers,
    pub building_global: f64,
    pub global:          f64,
    pub training_speed:  f64,
}

impl Default for RateBreakdown {
    fn default() -> Self {
        Self {
            research:        ResearchMultipliers::default(),
            upgrades:        UpgradeMultipliers::default(),
            building_global: 1.0,
            global:          1.0,
            training_speed:  1.0,
        }
    }
}

/// Everything a recalculation reads besides the ledger and research tree.
pub struct CompositionInputs<'a> {
    pub defs:            &'a Definitions,
    pub building_counts: &'a BTreeMap<EntityId, u64>,
    pub upgrades:        &'a BTreeMap<EntityId, u32>,
    pub achievements:    &'a BonusAccumulator,
    pub active_training: Option<&'a ModelDef>,
}

/// Rebuild every resource rate in the documented order.
pub fn recalculate(
    ledger: &mut ResourceLedger,
    research: &mut ResearchTree,
    inputs: &CompositionInputs<'_>,
) -> RateBreakdown {
    // 1.
    ledger.zero_rates();

    // 2.
    let rm = research.multipliers();

    // 3.
    let um = UpgradeMultipliers::aggregate(inputs.defs, inputs.upgrades);

    // 4.
    let efficiency = rm.efficiency * um.efficiency();
    for building in &inputs.defs.buildings {
        let count = inputs.building_counts.get(&building.id).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        for (resource, base) in &building.production {
            ledger.add_rate(resource, base * count as f64 * efficiency);
        }
    }

    // 5.
    let ach = inputs.achievements;
    ledger.scale_rate(DATA, ach.data_generation * rm.data_production);
    ledger.scale_rate(COMPUTE, ach.compute_power * rm.compute_efficiency);
    ledger.scale_rate(RESEARCH_POINTS, ach.research_points * rm.research_speed);

    // 6.
    let building_global = 1.0
        + inputs.defs.buildings.iter()
            .filter_map(|b| {
                let count = inputs.building_counts.get(&b.id).copied().unwrap_or(0);
                b.global_bonus.map(|bonus| bonus * count as f64)
            })
            .sum::<f64>();

    // 7.
    let global = rm.global
        * rm.safety_bonus
        * um.prestige()
        * ach.global_multiplier
        * ach.all_production
        * ach.all_resources
        * building_global;

    // 8.
    ledger.scale_all_rates(global);

    // 9.
    if let Some(model) = inputs.active_training {
        let scale = ach.model_performance * rm.model_performance * global;
        for (resource, rate) in &model.production_while_active {
            ledger.add_rate(resource, rate * scale);
        }
    }

    let training_speed = rm.training_speed * um.training() * ach.training_speed;

    log::debug!(
        "bonus: recalculated global={global:.4} building_global={building_global:.4} efficiency={efficiency:.4} training_speed={training_speed:.4}"
    );

    RateBreakdown {
        research: rm,
        upgrades: um,
        building_global,
        global,
        training_speed,
    }
}
