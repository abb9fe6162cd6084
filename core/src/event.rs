//! Everything the engine reports back to its caller.
//!
//! RULE: Events are a record of what already happened. Nothing in the
//! engine reads them back; they exist for the UI, the runner and tests.

use crate::{
    bonus_subsystem::Reward,
    types::{CostMap, EntityId, RunId, Tick},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Building,
    Model,
    Research,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    TickCompleted {
        tick: Tick,
        dt:   f64,
    },
    Paused {
        tick: Tick,
    },
    Resumed {
        tick: Tick,
    },

    // ── Economy events ─────────────────────────────
    Clicked {
        tick:   Tick,
        level:  u32,
        amount: f64,
    },
    ComboLevelChanged {
        tick: Tick,
        from: u32,
        to:   u32,
    },
    BuildingPurchased {
        tick:      Tick,
        building:  EntityId,
        quantity:  u64,
        new_count: u64,
        cost:      CostMap,
    },
    PurchaseMultiplierChanged {
        tick:       Tick,
        multiplier: u64,
    },
    EntityUnlocked {
        tick: Tick,
        kind: EntityKind,
        id:   EntityId,
    },

    // ── Research & training ────────────────────────
    ResearchCompleted {
        tick:     Tick,
        research: EntityId,
    },
    TrainingStarted {
        tick:  Tick,
        model: EntityId,
    },
    TrainingQueued {
        tick:     Tick,
        model:    EntityId,
        position: usize,
    },
    TrainingCompleted {
        tick:   Tick,
        model:  EntityId,
        reward: CostMap,
    },

    // ── Milestones ─────────────────────────────────
    AchievementUnlocked {
        tick:        Tick,
        achievement: EntityId,
        reward:      Reward,
    },
    DeploymentPerformed {
        tick:          Tick,
        closed_run:    RunId,
        new_run:       RunId,
        tokens_earned: u64,
    },
    UpgradePurchased {
        tick:      Tick,
        upgrade:   EntityId,
        new_level: u32,
    },

    // ── Offline ────────────────────────────────────
    OfflineProgressApplied {
        tick:       Tick,
        elapsed_ms: u64,
        applied_ms: u64,
        chunks:     u64,
    },
}

impl SimEvent {
    /// Stable name, used for logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TickCompleted { .. }             => "tick_completed",
            Self::Paused { .. }                    => "paused",
            Self::Resumed { .. }                   => "resumed",
            Self::Clicked { .. }                   => "clicked",
            Self::ComboLevelChanged { .. }         => "combo_level_changed",
            Self::BuildingPurchased { .. }         => "building_purchased",
            Self::PurchaseMultiplierChanged { .. } => "purchase_multiplier_changed",
            Self::EntityUnlocked { .. }            => "entity_unlocked",
            Self::ResearchCompleted { .. }         => "research_completed",
            Self::TrainingStarted { .. }           => "training_started",
            Self::TrainingQueued { .. }            => "training_queued",
            Self::TrainingCompleted { .. }         => "training_completed",
            Self::AchievementUnlocked { .. }       => "achievement_unlocked",
            Self::DeploymentPerformed { .. }       => "deployment_performed",
            Self::UpgradePurchased { .. }          => "upgrade_purchased",
            Self::OfflineProgressApplied { .. }    => "offline_progress_applied",
        }
    }
}
