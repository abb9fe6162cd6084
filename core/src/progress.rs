//! Progress analytics: read-only estimates for an external predictor.
//!
//! Nothing here mutates simulation state. Consumers are handed in
//! explicitly; there is no global registry.

use crate::{
    achievement_subsystem::AchievementBook,
    cost_model::unit_cost,
    definitions::BuildingDef,
    ledger::ResourceLedger,
    stats::{StatKind, StatsSnapshot},
    types::{EntityId, DATA},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressReport {
    pub achievement:        EntityId,
    pub label:              String,
    pub current:            f64,
    pub target:             f64,
    /// Per-second growth of `current`, where the stat has a derivative.
    pub rate:               Option<f64>,
    pub time_estimate_secs: Option<f64>,
}

/// Receives progress reports. Implemented by whatever predicts or
/// displays time-to-unlock.
pub trait ProgressConsumer {
    fn consume(&mut self, reports: &[ProgressReport]);
}

/// Collects reports into a Vec. Handy for tests and the runner.
#[derive(Debug, Default)]
pub struct ProgressLog {
    pub batches: Vec<Vec<ProgressReport>>,
}

impl ProgressConsumer for ProgressLog {
    fn consume(&mut self, reports: &[ProgressReport]) {
        self.batches.push(reports.to_vec());
    }
}

fn stat_rate(stat: StatKind, ledger: &ResourceLedger) -> Option<f64> {
    match stat {
        StatKind::DataGenerated => Some(ledger.per_second(DATA)),
        StatKind::PlaytimeSecs  => Some(1.0),
        _ => None,
    }
}

/// One report per locked count-threshold achievement.
pub fn reports(book: &AchievementBook, stats: &StatsSnapshot, ledger: &ResourceLedger) -> Vec<ProgressReport> {
    book.iter()
        .filter(|e| !e.is_unlocked())
        .filter_map(|e| {
            let req = &e.def().requirement;
            let stat = req.stat()?;
            let (current, target) = req.progress(stats)?;
            let rate = stat_rate(stat, ledger);
            let time_estimate_secs = rate
                .filter(|r| *r > 0.0)
                .map(|r| ((target - current) / r).max(0.0));
            Some(ProgressReport {
                achievement: e.def().id.clone(),
                label: e.def().label.clone(),
                current,
                target,
                rate,
                time_estimate_secs,
            })
        })
        .collect()
}

/// Seconds until the next unit of `def` is affordable at current rates.
/// `Some(0.0)` if affordable now, `None` if some shortfall never closes.
pub fn time_to_afford(def: &BuildingDef, owned: u64, ledger: &ResourceLedger, reduction: f64) -> Option<f64> {
    let next = unit_cost(&def.base_cost, def.cost_growth, owned, reduction);
    let mut worst = 0.0f64;
    for (id, needed) in &next {
        let short = needed - ledger.amount(id);
        if short <= 0.0 {
            continue;
        }
        let rate = ledger.per_second(id);
        if rate <= 0.0 || !ledger.contains(id) {
            return None;
        }
        worst = worst.max(short / rate);
    }
    Some(worst)
}
