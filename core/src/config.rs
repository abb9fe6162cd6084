//! Tunable simulation constants.
//!
//! Every field has a production default, so an override file only needs
//! the keys it changes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Offline catch-up never applies more than this much time.
    pub max_offline_ms:                 u64,
    /// Shorter absences are ignored entirely.
    pub min_offline_ms:                 u64,
    pub offline_chunk_ms:               u64,
    /// Achievements are evaluated on this coarser cadence, not every tick.
    pub achievement_check_interval_secs: f64,
    /// K in `floor(sqrt(metric / K))`.
    pub deployment_divisor:             f64,
    pub combo_window_ms:                f64,
    /// Upper bound for the max-affordable search.
    pub bulk_purchase_cap:              u64,
    pub click_base_amount:              f64,
    /// Clamp for the additive building cost reduction.
    pub max_cost_reduction:             f64,
    pub save_key:                       String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_offline_ms:                 86_400_000,
            min_offline_ms:                 5_000,
            offline_chunk_ms:               60_000,
            achievement_check_interval_secs: 1.0,
            deployment_divisor:             250_000.0,
            combo_window_ms:                2_000.0,
            bulk_purchase_cap:              10_000,
            click_base_amount:              1.0,
            max_cost_reduction:             0.9,
            save_key:                       "labsim_save".to_string(),
        }
    }
}

impl SimConfig {
    /// Load overrides from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.offline_chunk_ms == 0 {
            anyhow::bail!("offline_chunk_ms must be positive");
        }
        if self.min_offline_ms > self.max_offline_ms {
            anyhow::bail!("min_offline_ms exceeds max_offline_ms");
        }
        if !(self.deployment_divisor.is_finite() && self.deployment_divisor > 0.0) {
            anyhow::bail!("deployment_divisor must be positive");
        }
        if !(self.combo_window_ms.is_finite() && self.combo_window_ms > 0.0) {
            anyhow::bail!("combo_window_ms must be positive");
        }
        if !(0.0..1.0).contains(&self.max_cost_reduction) {
            anyhow::bail!("max_cost_reduction must be in [0, 1)");
        }
        if !self.achievement_check_interval_secs.is_finite() || self.achievement_check_interval_secs < 0.0 {
            anyhow::bail!("achievement_check_interval_secs must be non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{"combo_window_ms": 500.0}"#).unwrap();
        assert_eq!(config.combo_window_ms, 500.0);
        assert_eq!(config.max_offline_ms, 86_400_000);
        assert_eq!(config.save_key, "labsim_save");
    }

    #[test]
    fn zero_chunk_is_rejected() {
        let config = SimConfig { offline_chunk_ms: 0, ..SimConfig::default() };
        assert!(config.validate().is_err());
    }
}
