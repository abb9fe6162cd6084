//! The simulation engine: aggregate root of the lab economy.
//!
//! TICK ORDER (fixed, documented, never reordered):
//!   1. Accrue production            (validated before anything mutates)
//!   2. Playtime and combo clock
//!   3. Training progress            (completion starts the next queued run)
//!   4. Unlock thresholds
//!   5. Achievements                 (on the coarser check interval only)
//!
//! RULES:
//!   - SimEngine is the only mutation surface. Callers issue commands and
//!     read state through `&self` accessors.
//!   - Every structural change is followed by recalculate_rates() before
//!     the next accrual.
//!   - Offline catch-up never advances training.

use crate::{
    achievement_subsystem::AchievementBook,
    bonus_subsystem::{self, BonusAccumulator, CompositionInputs, RateBreakdown, UpgradeMultipliers},
    clock::SimClock,
    combo_subsystem::ComboState,
    command::PlayerCommand,
    config::SimConfig,
    cost_model::unit_cost,
    definitions::{Definitions, ResearchEffect, UnlockCondition},
    deployment_subsystem::DeploymentState,
    error::{SimError, SimResult},
    event::{EntityKind, SimEvent},
    ledger::ResourceLedger,
    progress::{self, ProgressConsumer, ProgressReport},
    purchase_subsystem::{self, BuildingRoster, PurchaseAmount},
    research_subsystem::ResearchTree,
    snapshot::{SaveDocument, SnapshotState, StatsState, SAVE_VERSION},
    stats::{LifetimeStats, RunStats, StatsSnapshot},
    store::SaveStore,
    training_subsystem::{TrainRequest, TrainingLab, TrainingState},
    types::{CostMap, RunId, Tick, DATA},
};
use chrono::Utc;
use serde::Serialize;

/// What an offline catch-up did.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OfflineReport {
    pub elapsed_ms: u64,
    /// Elapsed time after the cap; 0 when below the minimum.
    pub applied_ms: u64,
    pub chunks:     u64,
    pub gains:      CostMap,
    pub events:     Vec<SimEvent>,
}

pub struct SimEngine {
    config:              SimConfig,
    defs:                Definitions,
    run_id:              RunId,
    clock:               SimClock,
    ledger:              ResourceLedger,
    buildings:           BuildingRoster,
    training:            TrainingLab,
    research:            ResearchTree,
    achievements:        AchievementBook,
    bonuses:             BonusAccumulator,
    combo:               ComboState,
    deployment:          DeploymentState,
    run_stats:           RunStats,
    lifetime_stats:      LifetimeStats,
    purchase_multiplier: u64,
    breakdown:           RateBreakdown,
    since_achievement_check: f64,
}

impl SimEngine {
    /// Validate the tables and build a fresh run from them.
    pub fn new(config: SimConfig, defs: Definitions) -> SimResult<Self> {
        config.validate()?;
        defs.validate()?;
        let run_id = new_run_id();
        let mut engine = Self {
            clock:               SimClock::new(run_id.clone()),
            ledger:              fresh_ledger(&defs),
            buildings:           BuildingRoster::from_definitions(&defs),
            training:            TrainingLab::from_definitions(&defs),
            research:            ResearchTree::from_definitions(&defs),
            achievements:        AchievementBook::from_definitions(&defs),
            bonuses:             BonusAccumulator::default(),
            combo:               ComboState::new(config.combo_window_ms),
            deployment:          DeploymentState::default(),
            run_stats:           RunStats::default(),
            lifetime_stats:      LifetimeStats::default(),
            purchase_multiplier: 1,
            breakdown:           RateBreakdown::default(),
            since_achievement_check: 0.0,
            run_id,
            config,
            defs,
        };
        engine.recalculate_rates();
        engine.check_unlocks();
        log::info!("engine: new run {} with {} buildings", engine.run_id, engine.defs.buildings.len());
        Ok(engine)
    }

    /// The shipped catalog under `config`.
    pub fn build(config: SimConfig) -> SimResult<Self> {
        Self::new(config, Definitions::standard())
    }

    /// Shipped catalog, default config. Used by tests and tooling.
    pub fn build_test() -> SimResult<Self> {
        Self::build(SimConfig::default())
    }

    // ── Read access ────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig { &self.config }
    pub fn definitions(&self) -> &Definitions { &self.defs }
    pub fn run_id(&self) -> &str { &self.run_id }
    pub fn clock(&self) -> &SimClock { &self.clock }
    pub fn current_tick(&self) -> Tick { self.clock.current_tick }
    pub fn ledger(&self) -> &ResourceLedger { &self.ledger }
    pub fn buildings(&self) -> &BuildingRoster { &self.buildings }
    pub fn training(&self) -> &TrainingLab { &self.training }
    pub fn research(&self) -> &ResearchTree { &self.research }
    pub fn achievements(&self) -> &AchievementBook { &self.achievements }
    pub fn bonuses(&self) -> &BonusAccumulator { &self.bonuses }
    pub fn combo(&self) -> &ComboState { &self.combo }
    pub fn deployment(&self) -> &DeploymentState { &self.deployment }
    pub fn run_stats(&self) -> &RunStats { &self.run_stats }
    pub fn lifetime_stats(&self) -> &LifetimeStats { &self.lifetime_stats }
    pub fn purchase_multiplier(&self) -> u64 { self.purchase_multiplier }
    pub fn breakdown(&self) -> &RateBreakdown { &self.breakdown }

    /// Price of the next unit of a building after cost reductions.
    pub fn next_cost(&self, building: &str) -> Option<CostMap> {
        let def = self.defs.building(building)?;
        Some(unit_cost(
            &def.base_cost,
            def.cost_growth,
            self.buildings.count(building),
            self.bonuses.building_cost_reduction,
        ))
    }

    /// Tokens a deployment would pay out right now.
    pub fn deployable_tokens(&self) -> u64 {
        self.deployment.tokens_available(self.lifetime_stats.data_generated, self.config.deployment_divisor)
    }

    // ── Commands ───────────────────────────────────────────────

    pub fn submit_command(&mut self, command: PlayerCommand) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        let name = command.name();
        log::debug!("tick={tick} engine: command {name}");
        let result = match command {
            PlayerCommand::Pause => {
                self.clock.pause();
                Ok(vec![SimEvent::Paused { tick }])
            }
            PlayerCommand::Resume => {
                self.clock.resume();
                Ok(vec![SimEvent::Resumed { tick }])
            }
            PlayerCommand::Click => self.click(),
            PlayerCommand::Purchase { building, amount } => self.purchase(&building, amount),
            PlayerCommand::SetPurchaseMultiplier { multiplier } => self.set_purchase_multiplier(multiplier),
            PlayerCommand::Train { model } => self.train(&model),
            PlayerCommand::Research { research } => self.complete_research(&research),
            PlayerCommand::Deploy => self.deploy(),
            PlayerCommand::BuyUpgrade { upgrade } => self.buy_upgrade(&upgrade),
        };
        if let Err(e) = &result {
            log::warn!("tick={tick} engine: rejected {name}: {e}");
        }
        result
    }

    /// Manual collection at the current combo multiplier.
    pub fn click(&mut self) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        if !self.ledger.contains(DATA) {
            return Err(SimError::invalid("no data resource to collect into"));
        }
        let mut combo = self.combo.clone();
        let before = combo.level();
        let level = combo.click();
        let amount = self.config.click_base_amount * level as f64 * self.bonuses.click_power;
        if !amount.is_finite() || amount < 0.0 || !self.ledger.add(DATA, amount) {
            log::error!("tick={tick} engine: click produced invalid amount {amount}");
            return Err(SimError::InvariantViolation(format!("click amount {amount}")));
        }
        self.combo = combo;
        self.run_stats.record_click(&mut self.lifetime_stats);
        self.run_stats.record_data(&mut self.lifetime_stats, amount);
        self.lifetime_stats.highest_combo_level = self.lifetime_stats.highest_combo_level.max(level);

        let mut events = vec![SimEvent::Clicked { tick, level, amount }];
        if level != before {
            events.push(SimEvent::ComboLevelChanged { tick, from: before, to: level });
        }
        events.extend(self.check_unlocks());
        Ok(events)
    }

    pub fn purchase(&mut self, building: &str, amount: PurchaseAmount) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        let def = self.defs.building(building)
            .ok_or_else(|| SimError::invalid(format!("unknown building '{building}'")))?;
        let receipt = purchase_subsystem::purchase(
            &mut self.buildings,
            def,
            &mut self.ledger,
            amount,
            self.purchase_multiplier,
            self.bonuses.building_cost_reduction,
            self.config.bulk_purchase_cap,
        )?;
        self.run_stats.record_buildings(&mut self.lifetime_stats, receipt.quantity);
        log::info!(
            "tick={tick} purchase: {} x{} (requested {}) now {}",
            receipt.building, receipt.quantity, receipt.requested, receipt.new_count
        );

        let mut events = vec![SimEvent::BuildingPurchased {
            tick,
            building:  receipt.building,
            quantity:  receipt.quantity,
            new_count: receipt.new_count,
            cost:      receipt.cost,
        }];
        self.recalculate_rates();
        events.extend(self.check_unlocks());
        Ok(events)
    }

    pub fn set_purchase_multiplier(&mut self, multiplier: u64) -> SimResult<Vec<SimEvent>> {
        if multiplier == 0 {
            return Err(SimError::invalid("purchase multiplier must be at least 1"));
        }
        self.purchase_multiplier = multiplier;
        Ok(vec![SimEvent::PurchaseMultiplierChanged { tick: self.clock.current_tick, multiplier }])
    }

    pub fn train(&mut self, model: &str) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        let def = self.defs.model(model)
            .ok_or_else(|| SimError::invalid(format!("unknown model '{model}'")))?;
        match self.training.train(def, &mut self.ledger)? {
            TrainRequest::Started => {
                log::info!("tick={tick} training: started {model}");
                self.recalculate_rates();
                Ok(vec![SimEvent::TrainingStarted { tick, model: model.to_string() }])
            }
            TrainRequest::Queued(position) => {
                log::info!("tick={tick} training: queued {model} at {position}");
                Ok(vec![SimEvent::TrainingQueued { tick, model: model.to_string(), position }])
            }
        }
    }

    pub fn complete_research(&mut self, research: &str) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        let divisor = UpgradeMultipliers::aggregate(&self.defs, &self.deployment.purchased_upgrades).research();
        let def = self.research.research(research, &mut self.ledger, divisor)?;
        self.run_stats.record_research(&mut self.lifetime_stats);
        log::info!("tick={tick} research: completed {research}");

        let mut events = vec![SimEvent::ResearchCompleted { tick, research: def.id.clone() }];
        if let ResearchEffect::UnlockEntities(targets) = &def.effect {
            for target in targets {
                if let Some(kind) = self.unlock_entity(target) {
                    events.push(SimEvent::EntityUnlocked { tick, kind, id: target.clone() });
                }
            }
        }
        self.recalculate_rates();
        events.extend(self.check_unlocks());
        Ok(events)
    }

    /// Convert lifetime data into tokens and start a fresh run.
    pub fn deploy(&mut self) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        let record = self.deployment.deploy(
            self.lifetime_stats.data_generated,
            self.config.deployment_divisor,
            self.run_id.clone(),
            self.run_stats.playtime_secs,
        )?;
        self.reset_run();
        log::info!(
            "tick={tick} deployment: #{} closed {} earned {} tokens",
            record.number, record.run_id, record.tokens_earned
        );
        let mut events = vec![SimEvent::DeploymentPerformed {
            tick,
            closed_run:    record.run_id,
            new_run:       self.run_id.clone(),
            tokens_earned: record.tokens_earned,
        }];
        events.extend(self.check_unlocks());
        Ok(events)
    }

    pub fn buy_upgrade(&mut self, upgrade: &str) -> SimResult<Vec<SimEvent>> {
        let tick = self.clock.current_tick;
        let def = self.defs.upgrade(upgrade)
            .ok_or_else(|| SimError::invalid(format!("unknown upgrade '{upgrade}'")))?;
        let new_level = self.deployment.buy_upgrade(def)?;
        log::info!("tick={tick} deployment: upgrade {upgrade} -> level {new_level}");
        self.recalculate_rates();
        Ok(vec![SimEvent::UpgradePurchased { tick, upgrade: upgrade.to_string(), new_level }])
    }

    // ── Time ───────────────────────────────────────────────────

    /// Advance live time by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> SimResult<Vec<SimEvent>> {
        if self.clock.paused {
            return Err(SimError::invalid("tick on a paused engine"));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::invalid(format!("tick dt must be positive and finite, got {dt}")));
        }

        // 1. Accrue. The only fallible step, so it runs first.
        let gains = self.ledger.accrue(dt).map_err(|e| {
            log::error!("tick={} engine: rejected tick: {e}", self.clock.current_tick + 1);
            e
        })?;
        let tick = self.clock.advance()?;
        if let Some(data) = gains.get(DATA) {
            self.run_stats.record_data(&mut self.lifetime_stats, *data);
        }
        let mut events = Vec::new();

        // 2.
        self.run_stats.record_playtime(&mut self.lifetime_stats, dt);
        events.extend(self.advance_combo(tick, dt * 1000.0));

        // 3.
        if self.training.active().is_some() {
            let effective = dt * self.breakdown.training_speed;
            let completed = self.training.advance(effective, &self.defs);
            for model in &completed {
                events.push(self.finish_training(tick, model));
            }
            if !completed.is_empty() {
                self.recalculate_rates();
            }
        }

        // 4.
        events.extend(self.check_unlocks());

        // 5.
        self.since_achievement_check += dt;
        if self.since_achievement_check >= self.config.achievement_check_interval_secs {
            self.since_achievement_check = 0.0;
            let unlocked = self.evaluate_achievements();
            if !unlocked.is_empty() {
                self.recalculate_rates();
                events.extend(unlocked);
            }
        }

        log::debug!("tick={tick} engine: dt={dt:.3} events={}", events.len());
        events.push(SimEvent::TickCompleted { tick, dt });
        Ok(events)
    }

    /// Run `n` live ticks of `dt` seconds. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64, dt: f64) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.tick(dt)?);
        }
        Ok(events)
    }

    /// Apply time that passed while the game was closed, in bounded chunks.
    pub fn catch_up(&mut self, elapsed_ms: u64) -> SimResult<OfflineReport> {
        let tick = self.clock.current_tick;
        let bounded = elapsed_ms.min(self.config.max_offline_ms);
        let mut report = OfflineReport { elapsed_ms, ..OfflineReport::default() };
        // The combo window is wall-clock time, so the full gap counts.
        report.events.extend(self.advance_combo(tick, elapsed_ms as f64));
        if bounded < self.config.min_offline_ms {
            log::debug!("tick={tick} offline: {elapsed_ms}ms below minimum, skipped");
            return Ok(report);
        }
        if bounded < elapsed_ms {
            log::warn!("tick={tick} offline: clamped {elapsed_ms}ms to {bounded}ms");
        }

        let mut remaining = bounded;
        while remaining > 0 {
            let step = remaining.min(self.config.offline_chunk_ms);
            let gains = self.ledger.accrue(step as f64 / 1000.0).map_err(|e| {
                log::error!("tick={tick} offline: rejected chunk {}: {e}", report.chunks + 1);
                e
            })?;
            for (id, gain) in gains {
                if id == DATA {
                    self.run_stats.record_data(&mut self.lifetime_stats, gain);
                }
                *report.gains.entry(id).or_insert(0.0) += gain;
            }

            let unlocks = self.check_unlocks();
            let achieved = self.evaluate_achievements();
            if !unlocks.is_empty() || !achieved.is_empty() {
                self.recalculate_rates();
            }
            report.events.extend(unlocks);
            report.events.extend(achieved);

            remaining -= step;
            report.applied_ms += step;
            report.chunks += 1;
        }

        self.run_stats.record_offline(&mut self.lifetime_stats, bounded as f64 / 1000.0);
        report.events.push(SimEvent::OfflineProgressApplied {
            tick,
            elapsed_ms,
            applied_ms: report.applied_ms,
            chunks:     report.chunks,
        });
        log::info!(
            "tick={tick} offline: applied {}ms in {} chunks ({} events)",
            report.applied_ms, report.chunks, report.events.len()
        );
        Ok(report)
    }

    /// Catch up from the last save to `now_ms` and mark `now_ms` as
    /// accounted for.
    pub fn resume_from(&mut self, now_ms: i64) -> SimResult<OfflineReport> {
        let elapsed = self.clock.elapsed_since_save(now_ms).unwrap_or(0);
        let report = self.catch_up(elapsed)?;
        self.clock.last_saved_ms = Some(now_ms);
        Ok(report)
    }

    // ── Derived state ──────────────────────────────────────────

    /// Rebuild every resource rate. See bonus_subsystem for the order.
    pub fn recalculate_rates(&mut self) {
        let active = self.training.active().and_then(|run| self.defs.model(&run.model));
        let counts = self.buildings.counts();
        let inputs = CompositionInputs {
            defs:            &self.defs,
            building_counts: &counts,
            upgrades:        &self.deployment.purchased_upgrades,
            achievements:    &self.bonuses,
            active_training: active,
        };
        self.breakdown = bonus_subsystem::recalculate(&mut self.ledger, &mut self.research, &inputs);
    }

    /// Flip every entity whose unlock condition now holds.
    pub fn check_unlocks(&mut self) -> Vec<SimEvent> {
        let tick = self.clock.current_tick;
        let mut newly = Vec::new();
        for b in &self.defs.buildings {
            if !self.buildings.is_unlocked(&b.id)
                && condition_met(&b.unlock, &self.ledger, &self.buildings, &self.research)
            {
                newly.push((EntityKind::Building, b.id.clone()));
            }
        }
        for m in &self.defs.models {
            if !self.training.is_unlocked(&m.id)
                && condition_met(&m.unlock, &self.ledger, &self.buildings, &self.research)
            {
                newly.push((EntityKind::Model, m.id.clone()));
            }
        }
        for r in &self.defs.research {
            let unlocked = self.research.node(&r.id).is_some_and(|n| n.is_unlocked());
            if !unlocked && condition_met(&r.unlock, &self.ledger, &self.buildings, &self.research) {
                newly.push((EntityKind::Research, r.id.clone()));
            }
        }

        newly.into_iter()
            .map(|(kind, id)| {
                match kind {
                    EntityKind::Building => self.buildings.unlock(&id),
                    EntityKind::Model    => self.training.unlock(&id),
                    EntityKind::Research => self.research.unlock(&id),
                };
                log::info!("tick={tick} engine: unlocked {kind:?} {id}");
                SimEvent::EntityUnlocked { tick, kind, id }
            })
            .collect()
    }

    /// Unlock newly met achievements and fold their rewards in.
    /// The caller recalculates rates when this returns anything.
    fn evaluate_achievements(&mut self) -> Vec<SimEvent> {
        let tick = self.clock.current_tick;
        let stats = self.stats_snapshot();
        self.achievements.evaluate(&stats)
            .into_iter()
            .map(|unlocked| {
                self.bonuses.apply(&unlocked.reward, self.config.max_cost_reduction);
                log::info!("tick={tick} achievement: unlocked {} ({})", unlocked.id, unlocked.label);
                SimEvent::AchievementUnlocked { tick, achievement: unlocked.id, reward: unlocked.reward }
            })
            .collect()
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_clicks:        self.lifetime_stats.clicks,
            max_combo_level:     self.lifetime_stats.highest_combo_level.max(self.combo.max_level()),
            buildings_owned:     self.buildings.total_owned(),
            buildings_purchased: self.lifetime_stats.buildings_purchased,
            models_trained:      self.lifetime_stats.models_trained,
            research_completed:  self.lifetime_stats.research_completed,
            data_generated:      self.lifetime_stats.data_generated,
            deployments:         self.deployment.deployment_count,
            playtime_secs:       self.lifetime_stats.playtime_secs,
            building_counts:     self.buildings.counts(),
            researched:          self.research.researched_ids(),
            research_categories: self.research.category_progress(),
            research_total:      self.research.len(),
        }
    }

    // ── Analytics ──────────────────────────────────────────────

    pub fn progress_reports(&self) -> Vec<ProgressReport> {
        progress::reports(&self.achievements, &self.stats_snapshot(), &self.ledger)
    }

    pub fn publish_progress(&self, consumer: &mut dyn ProgressConsumer) {
        consumer.consume(&self.progress_reports());
    }

    pub fn time_to_afford(&self, building: &str) -> Option<f64> {
        let def = self.defs.building(building)?;
        progress::time_to_afford(
            def,
            self.buildings.count(building),
            &self.ledger,
            self.bonuses.building_cost_reduction,
        )
    }

    // ── Persistence ────────────────────────────────────────────

    pub fn to_document(&self) -> SaveDocument {
        let training = self.training.snapshot();
        SaveDocument {
            version:             SAVE_VERSION,
            timestamp:           Some(Utc::now()),
            run_id:              Some(self.run_id.clone()),
            resources:           Some(self.ledger.snapshot()),
            buildings:           Some(self.buildings.snapshot()),
            models:              training.models,
            research:            Some(self.research.snapshot()),
            achievements:        Some(self.achievements.snapshot()),
            deployment:          Some(self.deployment.snapshot()),
            current_training:    training.current_training,
            training_progress:   training.training_progress,
            stats:               Some(StatsState {
                run:      Some(self.run_stats.clone()),
                lifetime: Some(self.lifetime_stats.clone()),
            }),
            combo:               Some(self.combo.snapshot()),
            clock:               Some(self.clock.snapshot()),
            training_queue:      training.training_queue,
            purchase_multiplier: Some(self.purchase_multiplier),
        }
    }

    /// Tolerant merge of an already-parsed document, then recalculation.
    pub fn apply_document(&mut self, doc: SaveDocument) {
        if let Some(run_id) = doc.run_id {
            self.clock.run_id = run_id.clone();
            self.run_id = run_id;
        }
        if let Some(resources) = doc.resources {
            self.ledger.restore(resources);
        }
        if let Some(buildings) = doc.buildings {
            self.buildings.restore(buildings);
        }
        if let Some(research) = doc.research {
            self.research.restore(research);
        }
        if let Some(achievements) = doc.achievements {
            self.achievements.restore(achievements);
        }
        if let Some(deployment) = doc.deployment {
            self.deployment.restore(deployment);
        }
        self.training.restore_with(
            TrainingState {
                models:            doc.models,
                current_training:  doc.current_training,
                training_progress: doc.training_progress,
                training_queue:    doc.training_queue,
                ..TrainingState::default()
            },
            &self.defs,
        );
        if let Some(stats) = doc.stats {
            if let Some(run) = stats.run {
                self.run_stats = run;
            }
            if let Some(lifetime) = stats.lifetime {
                self.lifetime_stats = lifetime;
            }
        }
        if let Some(combo) = doc.combo {
            self.combo.restore(combo);
        }
        if let Some(clock) = doc.clock {
            self.clock.restore(clock);
        }
        if let Some(ts) = doc.timestamp {
            self.clock.last_saved_ms = Some(ts.timestamp_millis());
        }
        if let Some(multiplier) = doc.purchase_multiplier.filter(|m| *m >= 1) {
            self.purchase_multiplier = multiplier;
        }

        self.bonuses = self.achievements.accumulate(self.config.max_cost_reduction);
        self.since_achievement_check = 0.0;
        self.recalculate_rates();
        log::info!(
            "tick={} snapshot: restored run {} (document v{})",
            self.clock.current_tick, self.run_id, doc.version
        );
    }

    pub fn save(&mut self, store: &mut dyn SaveStore) -> SimResult<()> {
        let previous = self.clock.last_saved_ms;
        self.clock.last_saved_ms = Some(Utc::now().timestamp_millis());
        let result = self.to_document().to_json()
            .and_then(|json| store.set(&self.config.save_key, &json));
        if let Err(e) = result {
            self.clock.last_saved_ms = previous;
            log::warn!("tick={} snapshot: save failed: {e}", self.clock.current_tick);
            return Err(SimError::PersistenceFailure(e.to_string()));
        }
        log::info!("tick={} snapshot: saved to '{}'", self.clock.current_tick, self.config.save_key);
        Ok(())
    }

    /// Returns false when the store holds no save.
    pub fn load(&mut self, store: &dyn SaveStore) -> SimResult<bool> {
        let json = store.get(&self.config.save_key)
            .map_err(|e| SimError::PersistenceFailure(e.to_string()))?;
        let Some(json) = json else {
            return Ok(false);
        };
        let doc = SaveDocument::from_json(&json)?;
        self.apply_document(doc);
        Ok(true)
    }

    pub fn delete_save(&self, store: &mut dyn SaveStore) -> SimResult<()> {
        store.remove(&self.config.save_key)
            .map_err(|e| SimError::PersistenceFailure(e.to_string()))
    }

    pub fn export_string(&self) -> SimResult<String> {
        self.to_document().to_export()
    }

    /// Decode and merge an exported save. Nothing changes on failure.
    pub fn import_string(&mut self, data: &str) -> SimResult<()> {
        let doc = SaveDocument::from_export(data)?;
        self.apply_document(doc);
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────

    fn finish_training(&mut self, tick: Tick, model: &str) -> SimEvent {
        let reward = self.defs.model(model).map(|m| m.completion_reward.clone()).unwrap_or_default();
        for (resource, amount) in &reward {
            if !self.ledger.add(resource, *amount) {
                log::error!("tick={tick} training: {model} reward of {amount} {resource} rejected");
                continue;
            }
            if resource == DATA {
                self.run_stats.record_data(&mut self.lifetime_stats, *amount);
            }
        }
        self.run_stats.record_model_trained(&mut self.lifetime_stats);
        log::info!("tick={tick} training: completed {model}");
        SimEvent::TrainingCompleted { tick, model: model.to_string(), reward }
    }

    fn advance_combo(&mut self, tick: Tick, dt_ms: f64) -> Option<SimEvent> {
        let before = self.combo.level();
        self.combo.update(dt_ms);
        let after = self.combo.level();
        if after == before {
            return None;
        }
        log::debug!("tick={tick} combo: level {before} -> {after}");
        Some(SimEvent::ComboLevelChanged { tick, from: before, to: after })
    }

    fn unlock_entity(&mut self, id: &str) -> Option<EntityKind> {
        if self.buildings.unlock(id) {
            Some(EntityKind::Building)
        } else if self.training.unlock(id) {
            Some(EntityKind::Model)
        } else if self.research.unlock(id) {
            Some(EntityKind::Research)
        } else {
            None
        }
    }

    /// Rebuild every run-scoped entity from definitions. Deployment
    /// state, lifetime stats and achievements are untouched.
    fn reset_run(&mut self) {
        self.run_id = new_run_id();
        self.clock.run_id = self.run_id.clone();
        self.ledger = fresh_ledger(&self.defs);
        self.buildings = BuildingRoster::from_definitions(&self.defs);
        self.training = TrainingLab::from_definitions(&self.defs);
        self.research = ResearchTree::from_definitions(&self.defs);
        self.combo = ComboState::new(self.config.combo_window_ms);
        self.run_stats = RunStats::default();
        self.purchase_multiplier = 1;
        self.since_achievement_check = 0.0;
        self.recalculate_rates();
    }
}

fn new_run_id() -> RunId {
    uuid::Uuid::new_v4().to_string()
}

fn fresh_ledger(defs: &Definitions) -> ResourceLedger {
    let mut ledger = ResourceLedger::new();
    for r in &defs.resources {
        ledger.register(r.id.clone(), r.initial, r.track_max);
    }
    ledger
}

fn condition_met(
    condition: &UnlockCondition,
    ledger: &ResourceLedger,
    buildings: &BuildingRoster,
    research: &ResearchTree,
) -> bool {
    match condition {
        UnlockCondition::Always => true,
        UnlockCondition::ResourceReached { resource, amount } => {
            ledger.get(resource).is_some_and(|r| r.peak() >= *amount)
        }
        UnlockCondition::BuildingCount { building, count } => buildings.count(building) >= *count,
        UnlockCondition::Researched { research: id } => research.is_researched(id),
    }
}
