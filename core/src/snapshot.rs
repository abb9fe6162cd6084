//! Snapshot serialization: full simulation state to/from JSON.
//!
//! Every stateful component owns its own snapshot/restore pair through
//! `SnapshotState`. The engine assembles those blobs into one versioned
//! `SaveDocument`.
//!
//! RULE: Parsing is completed before any component is touched. A document
//! that fails to parse leaves the target engine exactly as it was.
//! Restoring is a tolerant merge: missing blobs keep the target's values,
//! unknown keys and unknown entity ids are ignored.

use crate::{
    achievement_subsystem::AchievementState,
    clock::ClockState,
    combo_subsystem::ComboSnapshot,
    deployment_subsystem::DeploymentState,
    error::{SimError, SimResult},
    ledger::ResourceState,
    purchase_subsystem::BuildingsState,
    research_subsystem::ResearchState,
    stats::{LifetimeStats, RunStats},
    training_subsystem::ModelsState,
    types::{EntityId, ResourceId, RunId},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the document layout changes.
pub const SAVE_VERSION: u32 = 1;

/// A component that can hand out and take back its persistent state.
pub trait SnapshotState {
    type State: Serialize + DeserializeOwned + Default;

    fn snapshot(&self) -> Self::State;

    /// Merge `state` into `self`. Never fails; invalid entries are skipped.
    fn restore(&mut self, state: Self::State);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsState {
    pub run:      Option<RunStats>,
    pub lifetime: Option<LifetimeStats>,
}

/// The whole save. Every field is optional on the way in so that older
/// documents load with whatever they carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SaveDocument {
    pub version:             u32,
    pub timestamp:           Option<DateTime<Utc>>,
    pub run_id:              Option<RunId>,
    pub resources:           Option<BTreeMap<ResourceId, ResourceState>>,
    pub buildings:           Option<BuildingsState>,
    pub models:              Option<ModelsState>,
    pub research:            Option<ResearchState>,
    pub achievements:        Option<AchievementState>,
    pub deployment:          Option<DeploymentState>,
    pub current_training:    Option<EntityId>,
    /// Seconds of training already applied to `current_training`.
    pub training_progress:   Option<f64>,
    pub stats:               Option<StatsState>,
    pub combo:               Option<ComboSnapshot>,
    pub clock:               Option<ClockState>,
    pub training_queue:      Option<Vec<EntityId>>,
    pub purchase_multiplier: Option<u64>,
}

impl SaveDocument {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a document. Any structural failure is `CorruptSnapshot`.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let doc: SaveDocument = serde_json::from_str(json)
            .map_err(|e| SimError::CorruptSnapshot(format!("parse failed: {e}")))?;
        if doc.version != SAVE_VERSION {
            log::warn!(
                "snapshot: document version {} differs from current {SAVE_VERSION}; merging tolerantly",
                doc.version
            );
        }
        Ok(doc)
    }

    /// Portable text form: base64 of the JSON document.
    pub fn to_export(&self) -> SimResult<String> {
        Ok(STANDARD.encode(self.to_json()?))
    }

    pub fn from_export(data: &str) -> SimResult<Self> {
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| SimError::CorruptSnapshot(format!("bad export encoding: {e}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| SimError::CorruptSnapshot(format!("export is not UTF-8: {e}")))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_a_valid_older_document() {
        let doc = SaveDocument::from_json("{}").unwrap();
        assert_eq!(doc.version, 0);
        assert!(doc.resources.is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let doc = SaveDocument::from_json(r#"{"version":1,"settings":{"theme":"dark"}}"#).unwrap();
        assert_eq!(doc.version, SAVE_VERSION);
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let err = SaveDocument::from_json(r#"{"resources": 5}"#).unwrap_err();
        assert!(matches!(err, SimError::CorruptSnapshot(_)));
    }

    #[test]
    fn export_rejects_non_base64() {
        let err = SaveDocument::from_export("not base64 !!").unwrap_err();
        assert!(matches!(err, SimError::CorruptSnapshot(_)));
    }
}
