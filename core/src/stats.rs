//! Progress counters and the read-only stats snapshot that
//! achievement predicates are evaluated against.

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Counters scoped to a single run. Reset on deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunStats {
    pub clicks:              u64,
    pub buildings_purchased: u64,
    pub models_trained:      u64,
    pub research_completed:  u64,
    pub data_generated:      f64,
    pub playtime_secs:       f64,
    pub offline_secs:        f64,
}

/// Counters that survive every deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifetimeStats {
    pub clicks:              u64,
    pub buildings_purchased: u64,
    pub models_trained:      u64,
    pub research_completed:  u64,
    pub data_generated:      f64,
    pub playtime_secs:       f64,
    pub offline_secs:        f64,
    pub highest_combo_level: u32,
}

impl RunStats {
    pub fn record_click(&mut self, lifetime: &mut LifetimeStats) {
        self.clicks += 1;
        lifetime.clicks += 1;
    }

    pub fn record_buildings(&mut self, lifetime: &mut LifetimeStats, qty: u64) {
        self.buildings_purchased += qty;
        lifetime.buildings_purchased += qty;
    }

    pub fn record_model_trained(&mut self, lifetime: &mut LifetimeStats) {
        self.models_trained += 1;
        lifetime.models_trained += 1;
    }

    pub fn record_research(&mut self, lifetime: &mut LifetimeStats) {
        self.research_completed += 1;
        lifetime.research_completed += 1;
    }

    pub fn record_data(&mut self, lifetime: &mut LifetimeStats, amount: f64) {
        if amount > 0.0 {
            self.data_generated += amount;
            lifetime.data_generated += amount;
        }
    }

    pub fn record_playtime(&mut self, lifetime: &mut LifetimeStats, secs: f64) {
        self.playtime_secs += secs;
        lifetime.playtime_secs += secs;
    }

    pub fn record_offline(&mut self, lifetime: &mut LifetimeStats, secs: f64) {
        self.offline_secs += secs;
        lifetime.offline_secs += secs;
    }
}

/// Scalar statistics an achievement can threshold on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    TotalClicks,
    MaxComboLevel,
    /// Buildings currently owned this run.
    BuildingsOwned,
    /// Buildings bought across all runs.
    BuildingsPurchased,
    ModelsTrained,
    ResearchCompleted,
    DataGenerated,
    Deployments,
    PlaytimeSecs,
}

/// Everything achievement predicates may look at, captured at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total_clicks:        u64,
    pub max_combo_level:     u32,
    pub buildings_owned:     u64,
    pub buildings_purchased: u64,
    pub models_trained:      u64,
    pub research_completed:  u64,
    pub data_generated:      f64,
    pub deployments:         u64,
    pub playtime_secs:       f64,
    pub building_counts:     BTreeMap<EntityId, u64>,
    pub researched:          BTreeSet<EntityId>,
    /// category -> (completed, total)
    pub research_categories: BTreeMap<String, (usize, usize)>,
    pub research_total:      usize,
}

impl StatsSnapshot {
    pub fn stat(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::TotalClicks        => self.total_clicks as f64,
            StatKind::MaxComboLevel      => self.max_combo_level as f64,
            StatKind::BuildingsOwned     => self.buildings_owned as f64,
            StatKind::BuildingsPurchased => self.buildings_purchased as f64,
            StatKind::ModelsTrained      => self.models_trained as f64,
            StatKind::ResearchCompleted  => self.research_completed as f64,
            StatKind::DataGenerated      => self.data_generated,
            StatKind::Deployments        => self.deployments as f64,
            StatKind::PlaytimeSecs       => self.playtime_secs,
        }
    }

    pub fn building_count(&self, id: &str) -> u64 {
        self.building_counts.get(id).copied().unwrap_or(0)
    }
}
