use crate::{purchase_subsystem::PurchaseAmount, types::EntityId};
use serde::{Deserialize, Serialize};

/// All player-issued commands. The UI never mutates state any other way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,

    // ── Run economy ───────────────────────────────
    Click,
    Purchase {
        building: EntityId,
        #[serde(default = "configured")]
        amount:   PurchaseAmount,
    },
    SetPurchaseMultiplier {
        multiplier: u64,
    },
    Train {
        model: EntityId,
    },
    Research {
        research: EntityId,
    },

    // ── Prestige ──────────────────────────────────
    Deploy,
    BuyUpgrade {
        upgrade: EntityId,
    },
}

fn configured() -> PurchaseAmount {
    PurchaseAmount::Configured
}

impl PlayerCommand {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause                     => "pause",
            Self::Resume                    => "resume",
            Self::Click                     => "click",
            Self::Purchase { .. }           => "purchase",
            Self::SetPurchaseMultiplier { .. } => "set_purchase_multiplier",
            Self::Train { .. }              => "train",
            Self::Research { .. }           => "research",
            Self::Deploy                    => "deploy",
            Self::BuyUpgrade { .. }         => "buy_upgrade",
        }
    }
}
