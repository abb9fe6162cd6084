//! Deployment subsystem: prestige currency and permanent upgrades.
//!
//! earnable(metric) = floor(sqrt(metric / K))
//!
//! RULE: DeploymentState is never reset. A deployment pays out only the
//! difference between what is earnable now and what has already been
//! paid out over the save's lifetime.

use crate::{
    definitions::UpgradeDef,
    error::{SimError, SimResult},
    snapshot::SnapshotState,
    types::{EntityId, RunId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Total tokens a lifetime metric is worth. Monotonic non-decreasing.
pub fn earnable(lifetime_metric: f64, divisor: f64) -> u64 {
    if !lifetime_metric.is_finite() || lifetime_metric <= 0.0 || divisor.is_nan() || divisor <= 0.0 {
        return 0;
    }
    let tokens = (lifetime_metric / divisor).sqrt().floor();
    if tokens.is_finite() { tokens as u64 } else { u64::MAX }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub number:            u64,
    /// The run that was closed by this deployment.
    pub run_id:            RunId,
    pub tokens_earned:     u64,
    pub lifetime_metric:   f64,
    pub run_playtime_secs: f64,
    pub deployed_at:       DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeploymentState {
    /// Spendable tokens.
    pub permanent_currency: u64,
    /// Every token ever paid out.
    pub lifetime_currency:  u64,
    pub deployment_count:   u64,
    pub purchased_upgrades: BTreeMap<EntityId, u32>,
    pub history:            Vec<DeploymentRecord>,
}

impl DeploymentState {
    pub fn tokens_available(&self, lifetime_metric: f64, divisor: f64) -> u64 {
        earnable(lifetime_metric, divisor).saturating_sub(self.lifetime_currency)
    }

    pub fn can_deploy(&self, lifetime_metric: f64, divisor: f64) -> bool {
        self.tokens_available(lifetime_metric, divisor) > 0
    }

    /// Pay out and append to history. Resetting the run is the engine's job.
    pub fn deploy(
        &mut self,
        lifetime_metric: f64,
        divisor: f64,
        run_id: RunId,
        run_playtime_secs: f64,
    ) -> SimResult<DeploymentRecord> {
        let tokens = self.tokens_available(lifetime_metric, divisor);
        if tokens == 0 {
            return Err(SimError::invalid(format!(
                "nothing to deploy: earnable {} already paid {}",
                earnable(lifetime_metric, divisor),
                self.lifetime_currency
            )));
        }
        let record = DeploymentRecord {
            number:            self.deployment_count + 1,
            run_id,
            tokens_earned:     tokens,
            lifetime_metric,
            run_playtime_secs,
            deployed_at:       Utc::now(),
        };
        self.history.push(record.clone());
        self.permanent_currency += tokens;
        self.lifetime_currency += tokens;
        self.deployment_count += 1;
        Ok(record)
    }

    pub fn upgrade_level(&self, id: &str) -> u32 {
        self.purchased_upgrades.get(id).copied().unwrap_or(0)
    }

    /// Spend tokens on the next level. Returns the new level.
    pub fn buy_upgrade(&mut self, def: &UpgradeDef) -> SimResult<u32> {
        let level = self.upgrade_level(&def.id);
        if level >= def.max_level {
            return Err(SimError::invalid(format!("upgrade '{}' is at max level {}", def.id, def.max_level)));
        }
        let price = def.cost_at(level);
        if self.permanent_currency < price {
            return Err(SimError::insufficient(format!(
                "{}: {} tokens held, {price} needed",
                def.id, self.permanent_currency
            )));
        }
        self.permanent_currency -= price;
        self.purchased_upgrades.insert(def.id.clone(), level + 1);
        Ok(level + 1)
    }
}

impl SnapshotState for DeploymentState {
    type State = DeploymentState;

    fn snapshot(&self) -> DeploymentState {
        self.clone()
    }

    fn restore(&mut self, state: DeploymentState) {
        *self = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earnable_is_floor_sqrt() {
        assert_eq!(earnable(0.0, 250_000.0), 0);
        assert_eq!(earnable(249_999.0, 250_000.0), 0);
        assert_eq!(earnable(250_000.0, 250_000.0), 1);
        assert_eq!(earnable(1_000_000.0, 250_000.0), 2);
        assert_eq!(earnable(f64::NAN, 250_000.0), 0);
    }

    #[test]
    fn deploy_pays_only_the_difference() {
        let mut state = DeploymentState::default();
        let first = state.deploy(1_000_000.0, 250_000.0, "r1".into(), 10.0).unwrap();
        assert_eq!(first.tokens_earned, 2);
        assert!(!state.can_deploy(1_000_000.0, 250_000.0));
        let second = state.deploy(2_250_000.0, 250_000.0, "r2".into(), 10.0).unwrap();
        assert_eq!(second.tokens_earned, 1);
        assert_eq!(state.lifetime_currency, 3);
        assert_eq!(state.deployment_count, 2);
    }
}
