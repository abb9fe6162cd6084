//! Static content definitions: buildings, models, research, achievements
//! and permanent upgrades.
//!
//! The simulation depends only on the shapes here, never on specific ids
//! beyond the four standard resources. Fresh run state is always rebuilt
//! from these tables by value, so a deployment reset is just
//! "construct again from definitions".

use crate::{
    achievement_subsystem::Requirement,
    bonus_subsystem::{BonusKind, Reward},
    cost_model::Priced,
    stats::StatKind,
    types::{CostMap, EntityId, ResourceId, COMPUTE, DATA, FUNDING, RESEARCH_POINTS},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDef {
    pub id:        ResourceId,
    pub label:     String,
    #[serde(default)]
    pub initial:   f64,
    /// Track a running maximum (used by unlock thresholds).
    #[serde(default)]
    pub track_max: bool,
}

/// When an entity becomes available. Checked every tick; one-way.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnlockCondition {
    #[default]
    Always,
    ResourceReached { resource: ResourceId, amount: f64 },
    BuildingCount { building: EntityId, count: u64 },
    Researched { research: EntityId },
}

impl UnlockCondition {
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildingDef {
    pub id:           EntityId,
    pub label:        String,
    pub base_cost:    CostMap,
    pub cost_growth:  f64,
    pub production:   CostMap,
    /// Flat global bonus contributed per owned unit.
    #[serde(default)]
    pub global_bonus: Option<f64>,
    #[serde(default)]
    pub unlock:       UnlockCondition,
}

impl Priced for BuildingDef {
    fn base_cost(&self) -> &CostMap { &self.base_cost }
    fn cost_growth(&self) -> f64 { self.cost_growth }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDef {
    pub id:                      EntityId,
    pub label:                   String,
    /// Paid when training is requested.
    pub cost:                    CostMap,
    /// Per-second output while this model is the active training run.
    pub production_while_active: CostMap,
    pub training_time_secs:      f64,
    /// Credited once when training completes.
    #[serde(default)]
    pub completion_reward:       CostMap,
    #[serde(default)]
    pub unlock:                  UnlockCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResearchEffect {
    GlobalMultiplier(f64),
    TrainingSpeed(f64),
    ModelPerformance(f64),
    Efficiency(f64),
    DataProduction(f64),
    ComputeEfficiency(f64),
    ResearchSpeed(f64),
    SafetyBonus(f64),
    UnlockEntities(Vec<EntityId>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchDef {
    pub id:            EntityId,
    pub label:         String,
    pub category:      String,
    pub cost:          CostMap,
    pub effect:        ResearchEffect,
    #[serde(default)]
    pub prerequisites: Vec<EntityId>,
    #[serde(default)]
    pub unlock:        UnlockCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AchievementDef {
    pub id:          EntityId,
    pub label:       String,
    pub requirement: Requirement,
    pub reward:      Reward,
}

/// Permanent upgrade bought with deployment tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpgradeDef {
    pub id:               EntityId,
    pub label:            String,
    /// One of training | efficiency | research | prestige.
    pub category:         String,
    pub base_cost:        f64,
    pub cost_growth:      f64,
    pub effect_per_level: f64,
    pub max_level:        u32,
}

impl UpgradeDef {
    /// Token price of the next level when `level` are owned.
    pub fn cost_at(&self, level: u32) -> u64 {
        let price = (self.base_cost * self.cost_growth.powf(level as f64)).floor();
        if price.is_finite() && price >= 0.0 { price as u64 } else { u64::MAX }
    }
}

/// Validation errors for definition tables.
#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("{id}: cost growth must be > 1")]
    NonIncreasingGrowth { id: String },
    #[error("{id}: cost for '{resource}' would not strictly increase after flooring")]
    CostNotIncreasing { id: String, resource: String },
    #[error("{id}: building has no cost")]
    EmptyCost { id: String },
    #[error("{id}: non-finite or negative value")]
    InvalidNumber { id: String },
    #[error("{id}: references unknown id '{reference}'")]
    UnknownReference { id: String, reference: String },
    #[error("research cycle through '{0}'")]
    ResearchCycle(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Definitions {
    pub resources:    Vec<ResourceDef>,
    pub buildings:    Vec<BuildingDef>,
    pub models:       Vec<ModelDef>,
    pub research:     Vec<ResearchDef>,
    pub achievements: Vec<AchievementDef>,
    pub upgrades:     Vec<UpgradeDef>,
}

impl Definitions {
    /// Load a definitions table from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let defs: Definitions = serde_json::from_str(&content)?;
        defs.validate()
            .map_err(|e| anyhow::anyhow!("Invalid definitions in {path}: {e}"))?;
        Ok(defs)
    }

    pub fn building(&self, id: &str) -> Option<&BuildingDef> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn model(&self, id: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn research_def(&self, id: &str) -> Option<&ResearchDef> {
        self.research.iter().find(|r| r.id == id)
    }

    pub fn achievement(&self, id: &str) -> Option<&AchievementDef> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    /// Check ids, numbers, cross-references and the research DAG.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        let all_ids = self.resources.iter().map(|r| r.id.as_str())
            .chain(self.buildings.iter().map(|b| b.id.as_str()))
            .chain(self.models.iter().map(|m| m.id.as_str()))
            .chain(self.research.iter().map(|r| r.id.as_str()))
            .chain(self.achievements.iter().map(|a| a.id.as_str()))
            .chain(self.upgrades.iter().map(|u| u.id.as_str()));
        for id in all_ids {
            if !ids.insert(id) {
                return Err(DefinitionError::DuplicateId(id.to_string()));
            }
        }

        let resource_ids: BTreeSet<&str> = self.resources.iter().map(|r| r.id.as_str()).collect();
        let check_costs = |id: &str, map: &CostMap| -> Result<(), DefinitionError> {
            for (resource, v) in map {
                if !resource_ids.contains(resource.as_str()) {
                    return Err(DefinitionError::UnknownReference {
                        id: id.to_string(),
                        reference: resource.clone(),
                    });
                }
                if !v.is_finite() || *v < 0.0 {
                    return Err(DefinitionError::InvalidNumber { id: id.to_string() });
                }
            }
            Ok(())
        };

        for b in &self.buildings {
            if b.base_cost.is_empty() {
                return Err(DefinitionError::EmptyCost { id: b.id.clone() });
            }
            check_costs(&b.id, &b.base_cost)?;
            check_costs(&b.id, &b.production)?;
            if !b.cost_growth.is_finite() || b.cost_growth <= 1.0 {
                return Err(DefinitionError::NonIncreasingGrowth { id: b.id.clone() });
            }
            // floor(x·g) > floor(x) for all x ≥ base once base·(g−1) ≥ 1.
            for (resource, base) in &b.base_cost {
                if base * (b.cost_growth - 1.0) < 1.0 {
                    return Err(DefinitionError::CostNotIncreasing {
                        id: b.id.clone(),
                        resource: resource.clone(),
                    });
                }
            }
            if b.global_bonus.is_some_and(|g| !g.is_finite()) {
                return Err(DefinitionError::InvalidNumber { id: b.id.clone() });
            }
        }

        for m in &self.models {
            check_costs(&m.id, &m.cost)?;
            check_costs(&m.id, &m.production_while_active)?;
            check_costs(&m.id, &m.completion_reward)?;
            if !m.training_time_secs.is_finite() || m.training_time_secs <= 0.0 {
                return Err(DefinitionError::InvalidNumber { id: m.id.clone() });
            }
        }

        let research_ids: BTreeSet<&str> = self.research.iter().map(|r| r.id.as_str()).collect();
        for r in &self.research {
            check_costs(&r.id, &r.cost)?;
            for p in &r.prerequisites {
                if !research_ids.contains(p.as_str()) {
                    return Err(DefinitionError::UnknownReference {
                        id: r.id.clone(),
                        reference: p.clone(),
                    });
                }
            }
            if let ResearchEffect::UnlockEntities(targets) = &r.effect {
                for t in targets {
                    if !ids.contains(t.as_str()) {
                        return Err(DefinitionError::UnknownReference {
                            id: r.id.clone(),
                            reference: t.clone(),
                        });
                    }
                }
            }
        }
        self.check_research_acyclic()?;

        for u in &self.upgrades {
            if !u.base_cost.is_finite() || u.base_cost < 0.0 || !u.cost_growth.is_finite()
                || u.cost_growth < 1.0 || !u.effect_per_level.is_finite()
            {
                return Err(DefinitionError::InvalidNumber { id: u.id.clone() });
            }
        }
        Ok(())
    }

    fn check_research_acyclic(&self) -> Result<(), DefinitionError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark { Visiting, Done }

        fn visit<'a>(
            id: &'a str,
            prereqs: &BTreeMap<&'a str, Vec<&'a str>>,
            marks: &mut BTreeMap<&'a str, Mark>,
        ) -> Result<(), DefinitionError> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(DefinitionError::ResearchCycle(id.to_string())),
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            for p in prereqs.get(id).into_iter().flatten() {
                visit(*p, prereqs, marks)?;
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let prereqs: BTreeMap<&str, Vec<&str>> = self.research.iter()
            .map(|r| (r.id.as_str(), r.prerequisites.iter().map(String::as_str).collect()))
            .collect();
        let mut marks = BTreeMap::new();
        for id in prereqs.keys() {
            visit(*id, &prereqs, &mut marks)?;
        }
        Ok(())
    }

    /// The shipped AI-lab catalog.
    pub fn standard() -> Self {
        Self {
            resources: vec![
                resource(DATA, "Data"),
                resource(COMPUTE, "Compute"),
                resource(RESEARCH_POINTS, "Research Points"),
                resource(FUNDING, "Funding"),
            ],
            buildings: vec![
                BuildingDef {
                    id:           "data_scraper".into(),
                    label:        "Data Scraper".into(),
                    base_cost:    costs(&[(DATA, 15.0)]),
                    cost_growth:  1.15,
                    production:   costs(&[(DATA, 1.0)]),
                    global_bonus: None,
                    unlock:       UnlockCondition::Always,
                },
                BuildingDef {
                    id:           "gpu_rack".into(),
                    label:        "GPU Rack".into(),
                    base_cost:    costs(&[(DATA, 100.0)]),
                    cost_growth:  1.15,
                    production:   costs(&[(COMPUTE, 1.0)]),
                    global_bonus: None,
                    unlock:       UnlockCondition::ResourceReached { resource: DATA.into(), amount: 50.0 },
                },
                BuildingDef {
                    id:           "annotation_team".into(),
                    label:        "Annotation Team".into(),
                    base_cost:    costs(&[(DATA, 500.0), (COMPUTE, 50.0)]),
                    cost_growth:  1.15,
                    production:   costs(&[(DATA, 8.0)]),
                    global_bonus: None,
                    unlock:       UnlockCondition::ResourceReached { resource: DATA.into(), amount: 250.0 },
                },
                BuildingDef {
                    id:           "research_lab".into(),
                    label:        "Research Lab".into(),
                    base_cost:    costs(&[(DATA, 1_000.0), (COMPUTE, 200.0)]),
                    cost_growth:  1.18,
                    production:   costs(&[(RESEARCH_POINTS, 1.0)]),
                    global_bonus: None,
                    unlock:       UnlockCondition::BuildingCount { building: "gpu_rack".into(), count: 5 },
                },
                BuildingDef {
                    id:           "grant_office".into(),
                    label:        "Grant Office".into(),
                    base_cost:    costs(&[(DATA, 2_000.0), (RESEARCH_POINTS, 50.0)]),
                    cost_growth:  1.2,
                    production:   costs(&[(FUNDING, 0.5)]),
                    global_bonus: None,
                    unlock:       UnlockCondition::ResourceReached { resource: RESEARCH_POINTS.into(), amount: 25.0 },
                },
                BuildingDef {
                    id:           "datacenter".into(),
                    label:        "Datacenter".into(),
                    base_cost:    costs(&[(DATA, 12_000.0), (COMPUTE, 2_500.0), (FUNDING, 100.0)]),
                    cost_growth:  1.2,
                    production:   costs(&[(COMPUTE, 40.0)]),
                    global_bonus: Some(0.01),
                    unlock:       UnlockCondition::Researched { research: "distributed_training".into() },
                },
            ],
            models: vec![
                ModelDef {
                    id:                      "small_lm".into(),
                    label:                   "Small Language Model".into(),
                    cost:                    costs(&[(DATA, 500.0), (COMPUTE, 100.0)]),
                    production_while_active: costs(&[(RESEARCH_POINTS, 0.5)]),
                    training_time_secs:      30.0,
                    completion_reward:       costs(&[(FUNDING, 50.0)]),
                    unlock:                  UnlockCondition::ResourceReached { resource: COMPUTE.into(), amount: 50.0 },
                },
                ModelDef {
                    id:                      "vision_model".into(),
                    label:                   "Vision Model".into(),
                    cost:                    costs(&[(DATA, 5_000.0), (COMPUTE, 1_500.0)]),
                    production_while_active: costs(&[(RESEARCH_POINTS, 2.0)]),
                    training_time_secs:      120.0,
                    completion_reward:       costs(&[(FUNDING, 400.0)]),
                    unlock:                  UnlockCondition::Researched { research: "convolutional_nets".into() },
                },
                ModelDef {
                    id:                      "frontier_model".into(),
                    label:                   "Frontier Model".into(),
                    cost:                    costs(&[(DATA, 100_000.0), (COMPUTE, 50_000.0), (FUNDING, 2_000.0)]),
                    production_while_active: costs(&[(RESEARCH_POINTS, 20.0), (DATA, 100.0)]),
                    training_time_secs:      900.0,
                    completion_reward:       costs(&[(FUNDING, 10_000.0)]),
                    unlock:                  UnlockCondition::Researched { research: "scaling_laws".into() },
                },
            ],
            research: vec![
                research("better_tokenizers", "Better Tokenizers", "data", 10.0,
                    ResearchEffect::DataProduction(1.25), &[]),
                research("gpu_kernels", "Custom GPU Kernels", "infrastructure", 25.0,
                    ResearchEffect::ComputeEfficiency(1.25), &[]),
                research("convolutional_nets", "Convolutional Nets", "architecture", 50.0,
                    ResearchEffect::UnlockEntities(vec!["vision_model".into()]), &[]),
                research("distributed_training", "Distributed Training", "infrastructure", 100.0,
                    ResearchEffect::TrainingSpeed(1.5), &["gpu_kernels"]),
                research("mixed_precision", "Mixed Precision", "infrastructure", 150.0,
                    ResearchEffect::Efficiency(1.2), &["gpu_kernels"]),
                research("rlhf", "RLHF", "safety", 200.0,
                    ResearchEffect::ModelPerformance(1.5), &[]),
                research("interpretability", "Interpretability", "safety", 300.0,
                    ResearchEffect::SafetyBonus(1.1), &["rlhf"]),
                research("automated_research", "Automated Research", "infrastructure", 400.0,
                    ResearchEffect::ResearchSpeed(1.3), &["mixed_precision"]),
                research("scaling_laws", "Scaling Laws", "architecture", 500.0,
                    ResearchEffect::GlobalMultiplier(1.5), &["convolutional_nets", "distributed_training"]),
            ],
            achievements: vec![
                achievement("first_click", "Hello, World",
                    Requirement::StatAtLeast { stat: StatKind::TotalClicks, threshold: 1.0 },
                    Reward::new(BonusKind::ClickPower, 0.1)),
                achievement("combo_master", "Combo Master",
                    Requirement::StatAtLeast { stat: StatKind::MaxComboLevel, threshold: 8.0 },
                    Reward::new(BonusKind::ClickPower, 0.25)),
                achievement("first_building", "Infrastructure",
                    Requirement::StatAtLeast { stat: StatKind::BuildingsOwned, threshold: 1.0 },
                    Reward::new(BonusKind::DataGeneration, 0.05)),
                achievement("data_hoarder", "Data Hoarder",
                    Requirement::StatAtLeast { stat: StatKind::DataGenerated, threshold: 10_000.0 },
                    Reward::new(BonusKind::DataGeneration, 0.1)),
                achievement("compute_cluster", "Compute Cluster",
                    Requirement::BuildingCountAtLeast { building: "gpu_rack".into(), count: 10 },
                    Reward::new(BonusKind::ComputePower, 0.1)),
                achievement("research_initiate", "Research Initiate",
                    Requirement::StatAtLeast { stat: StatKind::ResearchCompleted, threshold: 1.0 },
                    Reward::new(BonusKind::ResearchPoints, 0.1)),
                achievement("first_model", "First Model",
                    Requirement::StatAtLeast { stat: StatKind::ModelsTrained, threshold: 1.0 },
                    Reward::new(BonusKind::ModelPerformance, 0.1)),
                achievement("model_factory", "Model Factory",
                    Requirement::StatAtLeast { stat: StatKind::ModelsTrained, threshold: 10.0 },
                    Reward::new(BonusKind::TrainingSpeed, 0.2)),
                achievement("safety_first", "Safety First",
                    Requirement::ResearchSet { research: vec!["rlhf".into(), "interpretability".into()] },
                    Reward::new(BonusKind::GlobalMultiplier, 0.1)),
                achievement("infrastructure_complete", "Hyperscaler",
                    Requirement::CategoryComplete { category: "infrastructure".into() },
                    Reward::new(BonusKind::AllProduction, 0.1)),
                achievement("research_complete", "Singularity",
                    Requirement::AllResearch,
                    Reward::new(BonusKind::AllResources, 0.25)),
                achievement("first_deployment", "Shipped It",
                    Requirement::StatAtLeast { stat: StatKind::Deployments, threshold: 1.0 },
                    Reward::new(BonusKind::BuildingCostReduction, 0.05)),
                achievement("bulk_buyer", "Bulk Buyer",
                    Requirement::StatAtLeast { stat: StatKind::BuildingsPurchased, threshold: 100.0 },
                    Reward::new(BonusKind::BuildingCostReduction, 0.05)),
            ],
            upgrades: vec![
                upgrade("faster_training", "Faster Training", "training", 1.0, 2.0, 0.1, 10),
                upgrade("efficient_hardware", "Efficient Hardware", "efficiency", 1.0, 2.0, 0.1, 10),
                upgrade("research_grants", "Research Grants", "research", 2.0, 2.0, 0.1, 5),
                upgrade("brand_recognition", "Brand Recognition", "prestige", 3.0, 2.5, 0.25, 10),
            ],
        }
    }
}

// ── Catalog builders ──────────────────────────────────────────

pub fn costs(entries: &[(&str, f64)]) -> CostMap {
    entries.iter().map(|(id, v)| (id.to_string(), *v)).collect()
}

fn resource(id: &str, label: &str) -> ResourceDef {
    ResourceDef { id: id.into(), label: label.into(), initial: 0.0, track_max: true }
}

fn research(
    id: &str,
    label: &str,
    category: &str,
    points: f64,
    effect: ResearchEffect,
    prerequisites: &[&str],
) -> ResearchDef {
    ResearchDef {
        id:            id.into(),
        label:         label.into(),
        category:      category.into(),
        cost:          costs(&[(RESEARCH_POINTS, points)]),
        effect,
        prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
        unlock:        UnlockCondition::Always,
    }
}

fn achievement(id: &str, label: &str, requirement: Requirement, reward: Reward) -> AchievementDef {
    AchievementDef { id: id.into(), label: label.into(), requirement, reward }
}

fn upgrade(
    id: &str,
    label: &str,
    category: &str,
    base_cost: f64,
    cost_growth: f64,
    effect_per_level: f64,
    max_level: u32,
) -> UpgradeDef {
    UpgradeDef {
        id: id.into(),
        label: label.into(),
        category: category.into(),
        base_cost,
        cost_growth,
        effect_per_level,
        max_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_valid() {
        Definitions::standard().validate().unwrap();
    }

    #[test]
    fn standard_catalog_roundtrips_through_json() {
        let defs = Definitions::standard();
        let s = serde_json::to_string(&defs).unwrap();
        let back: Definitions = serde_json::from_str(&s).unwrap();
        assert_eq!(back, defs);
    }

    #[test]
    fn flat_growth_is_rejected() {
        let mut defs = Definitions::standard();
        defs.buildings[0].cost_growth = 1.0;
        assert_eq!(
            defs.validate(),
            Err(DefinitionError::NonIncreasingGrowth { id: "data_scraper".into() })
        );
    }

    #[test]
    fn cheap_slow_growth_is_rejected() {
        let mut defs = Definitions::standard();
        defs.buildings[0].base_cost = costs(&[(DATA, 2.0)]);
        assert!(matches!(defs.validate(), Err(DefinitionError::CostNotIncreasing { .. })));
    }

    #[test]
    fn building_without_cost_is_rejected() {
        let mut defs = Definitions::standard();
        defs.buildings[0].base_cost = CostMap::new();
        assert!(matches!(defs.validate(), Err(DefinitionError::EmptyCost { .. })));
    }

    #[test]
    fn research_cycle_is_rejected() {
        let mut defs = Definitions::standard();
        // distributed_training already requires gpu_kernels.
        let kernels = defs.research.iter_mut().find(|r| r.id == "gpu_kernels").unwrap();
        kernels.prerequisites.push("distributed_training".into());
        assert!(matches!(defs.validate(), Err(DefinitionError::ResearchCycle(_))));
    }
}
