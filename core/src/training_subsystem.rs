//! Training subsystem: one active model run plus a FIFO queue.
//!
//! RULE: Cost is paid when training is requested, not when it starts.
//! Progress is counted in seconds already scaled by the training speed
//! multiplier, so the engine only ever hands in effective seconds.

use crate::{
    definitions::{Definitions, ModelDef},
    error::{SimError, SimResult},
    ledger::ResourceLedger,
    snapshot::SnapshotState,
    types::EntityId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelState {
    pub unlocked: bool,
    /// Completed runs of this model in the current run.
    pub trained:  u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingRun {
    pub model:         EntityId,
    pub progress_secs: f64,
    pub duration_secs: f64,
}

impl TrainingRun {
    pub fn fraction(&self) -> f64 {
        if self.duration_secs <= 0.0 { 1.0 } else { (self.progress_secs / self.duration_secs).min(1.0) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainRequest {
    Started,
    /// 1-based position in the queue.
    Queued(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingLab {
    order:  Vec<EntityId>,
    models: BTreeMap<EntityId, ModelState>,
    active: Option<TrainingRun>,
    queue:  VecDeque<EntityId>,
}

impl TrainingLab {
    pub fn from_definitions(defs: &Definitions) -> Self {
        Self {
            order:  defs.models.iter().map(|m| m.id.clone()).collect(),
            models: defs.models.iter()
                .map(|m| (m.id.clone(), ModelState { unlocked: m.unlock.is_always(), trained: 0 }))
                .collect(),
            active: None,
            queue:  VecDeque::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ModelState> {
        self.models.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &ModelState)> {
        self.order.iter().filter_map(|id| self.models.get_key_value(id))
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.models.get(id).map(|m| m.unlocked).unwrap_or(false)
    }

    pub fn unlock(&mut self, id: &str) -> bool {
        match self.models.get_mut(id) {
            Some(m) if !m.unlocked => {
                m.unlocked = true;
                true
            }
            _ => false,
        }
    }

    pub fn trained_count(&self, id: &str) -> u64 {
        self.models.get(id).map(|m| m.trained).unwrap_or(0)
    }

    pub fn active(&self) -> Option<&TrainingRun> {
        self.active.as_ref()
    }

    pub fn queue(&self) -> impl Iterator<Item = &EntityId> {
        self.queue.iter()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|r| r.model == id) || self.queue.iter().any(|q| q == id)
    }

    /// Pay for a model and start it, or queue it behind the active run.
    pub fn train(&mut self, def: &ModelDef, ledger: &mut ResourceLedger) -> SimResult<TrainRequest> {
        if !self.is_unlocked(&def.id) {
            return Err(SimError::invalid(format!("model '{}' is locked or unknown", def.id)));
        }
        if self.is_pending(&def.id) {
            return Err(SimError::invalid(format!("model '{}' is already training", def.id)));
        }
        if !ledger.spend(&def.cost) {
            return Err(SimError::insufficient(format!("{}: {}", def.id, ledger.shortfall(&def.cost))));
        }
        if self.active.is_none() {
            self.active = Some(TrainingRun {
                model:         def.id.clone(),
                progress_secs: 0.0,
                duration_secs: def.training_time_secs,
            });
            Ok(TrainRequest::Started)
        } else {
            self.queue.push_back(def.id.clone());
            Ok(TrainRequest::Queued(self.queue.len()))
        }
    }

    /// Apply `effective_secs` of progress. Leftover time carries into the
    /// next queued run. Returns the models that finished, in order.
    pub fn advance(&mut self, effective_secs: f64, defs: &Definitions) -> Vec<EntityId> {
        let mut completed = Vec::new();
        if !effective_secs.is_finite() || effective_secs <= 0.0 {
            return completed;
        }
        let mut budget = effective_secs;
        while let Some(run) = self.active.as_mut() {
            let needed = (run.duration_secs - run.progress_secs).max(0.0);
            if budget < needed {
                run.progress_secs += budget;
                break;
            }
            budget -= needed;
            let model = run.model.clone();
            self.active = None;
            if let Some(state) = self.models.get_mut(&model) {
                state.trained += 1;
            }
            completed.push(model);
            self.start_next(defs);
        }
        completed
    }

    fn start_next(&mut self, defs: &Definitions) {
        while let Some(next) = self.queue.pop_front() {
            match defs.model(&next) {
                Some(def) => {
                    self.active = Some(TrainingRun {
                        model:         next,
                        progress_secs: 0.0,
                        duration_secs: def.training_time_secs,
                    });
                    return;
                }
                None => log::warn!("training: dropping queued unknown model '{next}'"),
            }
        }
    }
}

// ── Snapshot ───────────────────────────────────────────────────

pub type ModelsState = BTreeMap<EntityId, ModelState>;

/// Training is restored as one unit: when `models` is present, the
/// active run and queue are authoritative even if empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingState {
    pub models:            Option<ModelsState>,
    pub current_training:  Option<EntityId>,
    pub training_progress: Option<f64>,
    pub training_queue:    Option<Vec<EntityId>>,
    /// Durations are definition data; they are not persisted.
    #[serde(skip)]
    pub durations:         BTreeMap<EntityId, f64>,
}

impl TrainingLab {
    /// Durations for every known model, used to rebuild the active run.
    pub fn restore_with(&mut self, state: TrainingState, defs: &Definitions) {
        let durations = defs.models.iter().map(|m| (m.id.clone(), m.training_time_secs)).collect();
        self.restore(TrainingState { durations, ..state });
    }
}

impl SnapshotState for TrainingLab {
    type State = TrainingState;

    fn snapshot(&self) -> TrainingState {
        TrainingState {
            models:            Some(self.models.clone()),
            current_training:  self.active.as_ref().map(|r| r.model.clone()),
            training_progress: self.active.as_ref().map(|r| r.progress_secs),
            training_queue:    Some(self.queue.iter().cloned().collect()),
            durations:         BTreeMap::new(),
        }
    }

    fn restore(&mut self, state: TrainingState) {
        let Some(models) = state.models else {
            return;
        };
        for (id, saved) in models {
            match self.models.get_mut(&id) {
                Some(m) => {
                    m.trained = saved.trained;
                    m.unlocked |= saved.unlocked;
                }
                None => log::debug!("snapshot: ignoring unknown model '{id}'"),
            }
        }

        self.active = state.current_training.and_then(|model| {
            let Some(&duration_secs) = state.durations.get(&model) else {
                log::debug!("snapshot: dropping active run of unknown model '{model}'");
                return None;
            };
            let progress_secs = state.training_progress
                .filter(|p| p.is_finite() && *p >= 0.0)
                .unwrap_or(0.0)
                .min(duration_secs);
            Some(TrainingRun { model, progress_secs, duration_secs })
        });

        self.queue = state.training_queue.unwrap_or_default()
            .into_iter()
            .filter(|id| state.durations.contains_key(id))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{COMPUTE, DATA};

    fn lab_with_budget(data: f64) -> (Definitions, TrainingLab, ResourceLedger) {
        let mut defs = Definitions::standard();
        for m in &mut defs.models {
            m.unlock = Default::default();
        }
        let lab = TrainingLab::from_definitions(&defs);
        let mut ledger = ResourceLedger::new();
        ledger.register(DATA, data, true);
        ledger.register(COMPUTE, data, true);
        (defs, lab, ledger)
    }

    #[test]
    fn second_request_is_queued() {
        let (defs, mut lab, mut ledger) = lab_with_budget(1e9);
        let small = defs.model("small_lm").unwrap().clone();
        let vision = defs.model("vision_model").unwrap().clone();
        assert_eq!(lab.train(&small, &mut ledger).unwrap(), TrainRequest::Started);
        assert_eq!(lab.train(&vision, &mut ledger).unwrap(), TrainRequest::Queued(1));
        assert!(lab.train(&small, &mut ledger).is_err());
    }

    #[test]
    fn leftover_time_carries_into_queued_run() {
        let (defs, mut lab, mut ledger) = lab_with_budget(1e9);
        let small = defs.model("small_lm").unwrap().clone();
        let vision = defs.model("vision_model").unwrap().clone();
        lab.train(&small, &mut ledger).unwrap();
        lab.train(&vision, &mut ledger).unwrap();
        let done = lab.advance(40.0, &defs);
        assert_eq!(done, vec!["small_lm".to_string()]);
        let run = lab.active().unwrap();
        assert_eq!(run.model, "vision_model");
        assert_eq!(run.progress_secs, 10.0);
    }
}
