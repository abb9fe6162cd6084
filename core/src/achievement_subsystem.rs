//! Achievement subsystem: one-way Locked → Unlocked state machine.
//!
//! Requirements are typed predicates over a `StatsSnapshot`; rewards are
//! structured `{BonusKind, magnitude}` values. The engine folds each newly
//! unlocked reward into the `BonusAccumulator` and then recalculates rates.

use crate::{
    bonus_subsystem::{BonusAccumulator, Reward},
    definitions::{AchievementDef, Definitions},
    snapshot::SnapshotState,
    stats::{StatKind, StatsSnapshot},
    types::EntityId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    /// Count threshold on a scalar stat.
    StatAtLeast { stat: StatKind, threshold: f64 },
    /// Count threshold on one building.
    BuildingCountAtLeast { building: EntityId, count: u64 },
    /// Every listed research node completed.
    ResearchSet { research: Vec<EntityId> },
    /// Every research node in a category completed.
    CategoryComplete { category: String },
    /// Every research node completed.
    AllResearch,
}

impl Requirement {
    pub fn is_met(&self, stats: &StatsSnapshot) -> bool {
        match self {
            Self::StatAtLeast { stat, threshold } => stats.stat(*stat) >= *threshold,
            Self::BuildingCountAtLeast { building, count } => {
                stats.building_count(building) >= *count
            }
            Self::ResearchSet { research } => {
                research.iter().all(|id| stats.researched.contains(id))
            }
            Self::CategoryComplete { category } => stats
                .research_categories
                .get(category)
                .map(|(done, total)| *total > 0 && done == total)
                .unwrap_or(false),
            Self::AllResearch => {
                stats.research_total > 0 && stats.researched.len() >= stats.research_total
            }
        }
    }

    /// `(current, target)` for threshold-style requirements.
    pub fn progress(&self, stats: &StatsSnapshot) -> Option<(f64, f64)> {
        match self {
            Self::StatAtLeast { stat, threshold } => Some((stats.stat(*stat), *threshold)),
            Self::BuildingCountAtLeast { building, count } => {
                Some((stats.building_count(building) as f64, *count as f64))
            }
            Self::ResearchSet { research } => {
                let done = research.iter().filter(|id| stats.researched.contains(*id)).count();
                Some((done as f64, research.len() as f64))
            }
            Self::CategoryComplete { category } => stats
                .research_categories
                .get(category)
                .map(|(done, total)| (*done as f64, *total as f64)),
            Self::AllResearch => {
                Some((stats.researched.len() as f64, stats.research_total as f64))
            }
        }
    }

    /// The scalar stat this requirement thresholds on, if any.
    pub fn stat(&self) -> Option<StatKind> {
        match self {
            Self::StatAtLeast { stat, .. } => Some(*stat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AchievementEntry {
    def:      AchievementDef,
    unlocked: bool,
}

impl AchievementEntry {
    pub fn def(&self) -> &AchievementDef { &self.def }
    pub fn is_unlocked(&self) -> bool { self.unlocked }
}

/// A freshly unlocked achievement, returned by `evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockedAchievement {
    pub id:     EntityId,
    pub label:  String,
    pub reward: Reward,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AchievementBook {
    entries: Vec<AchievementEntry>,
}

impl AchievementBook {
    pub fn from_definitions(defs: &Definitions) -> Self {
        Self {
            entries: defs.achievements.iter()
                .map(|def| AchievementEntry { def: def.clone(), unlocked: false })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AchievementEntry> {
        self.entries.iter()
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.def.id == id && e.unlocked)
    }

    pub fn unlocked_count(&self) -> usize {
        self.entries.iter().filter(|e| e.unlocked).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Test every locked achievement; unlock and return the ones now met,
    /// in definition order. Unlocked entries are skipped entirely.
    pub fn evaluate(&mut self, stats: &StatsSnapshot) -> Vec<UnlockedAchievement> {
        let mut newly = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.unlocked) {
            if entry.def.requirement.is_met(stats) {
                entry.unlocked = true;
                newly.push(UnlockedAchievement {
                    id:     entry.def.id.clone(),
                    label:  entry.def.label.clone(),
                    reward: entry.def.reward,
                });
            }
        }
        newly
    }

    /// Rewards of every unlocked achievement, in definition order.
    pub fn unlocked_rewards(&self) -> impl Iterator<Item = &Reward> {
        self.entries.iter().filter(|e| e.unlocked).map(|e| &e.def.reward)
    }

    /// Rebuild the accumulator from the unlocked set.
    pub fn accumulate(&self, max_reduction: f64) -> BonusAccumulator {
        BonusAccumulator::from_rewards(self.unlocked_rewards(), max_reduction)
    }
}

// ── Snapshot ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AchievementState {
    pub unlocked: Vec<EntityId>,
}

impl SnapshotState for AchievementBook {
    type State = AchievementState;

    fn snapshot(&self) -> AchievementState {
        AchievementState {
            unlocked: self.entries.iter()
                .filter(|e| e.unlocked)
                .map(|e| e.def.id.clone())
                .collect(),
        }
    }

    /// Merge: a saved unlock is applied; nothing is ever re-locked.
    fn restore(&mut self, state: AchievementState) {
        for id in state.unlocked {
            match self.entries.iter_mut().find(|e| e.def.id == id) {
                Some(entry) => entry.unlocked = true,
                None => log::debug!("snapshot: ignoring unknown achievement '{id}'"),
            }
        }
    }
}
