//! Deployment (prestige) tests.

use labsim_core::{
    achievement_subsystem::Requirement,
    bonus_subsystem::{BonusKind, Reward},
    config::SimConfig,
    definitions::{
        costs, AchievementDef, BuildingDef, Definitions, ResourceDef, UnlockCondition, UpgradeDef,
    },
    deployment_subsystem::earnable,
    engine::SimEngine,
    error::SimError,
    event::SimEvent,
    purchase_subsystem::PurchaseAmount,
    stats::StatKind,
    types::DATA,
};

// ── Helpers ──────────────────────────────────────────────────

const K: f64 = 250_000.0;

fn defs(achievements: Vec<AchievementDef>) -> Definitions {
    Definitions {
        resources: vec![ResourceDef { id: DATA.into(), label: "Data".into(), initial: 10.0, track_max: true }],
        buildings: vec![BuildingDef {
            id:           "farm".into(),
            label:        "Server Farm".into(),
            base_cost:    costs(&[(DATA, 10.0)]),
            cost_growth:  1.15,
            production:   costs(&[(DATA, 1_000.0)]),
            global_bonus: None,
            unlock:       UnlockCondition::Always,
        }],
        achievements,
        upgrades: vec![UpgradeDef {
            id:               "efficient_hardware".into(),
            label:            "Efficient Hardware".into(),
            category:         "efficiency".into(),
            base_cost:        1.0,
            cost_growth:      2.0,
            effect_per_level: 0.1,
            max_level:        10,
        }],
        ..Definitions::default()
    }
}

/// A run that has generated exactly K data.
fn ready_engine(achievements: Vec<AchievementDef>) -> SimEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut e = SimEngine::new(SimConfig::default(), defs(achievements)).expect("engine");
    e.purchase("farm", PurchaseAmount::Count(1)).unwrap();
    e.tick(250.0).unwrap();
    assert_eq!(e.lifetime_stats().data_generated, K);
    e
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9 * b.abs().max(1.0)
}

// ── Tests ────────────────────────────────────────────────────

/// floor(sqrt(metric / K)).
#[test]
fn earnable_scenario() {
    assert_eq!(earnable(K, K), 1);
    assert_eq!(earnable(4.0 * K - 1.0, K), 1);
    assert_eq!(earnable(4.0 * K, K), 2);
    assert_eq!(earnable(K, 0.0), 0);
}

/// Deploying resets the run and keeps lifetime progress.
#[test]
fn deploy_resets_run_and_pays_tokens() {
    let mut e = ready_engine(vec![]);
    let old_run = e.run_id().to_string();
    assert_eq!(e.deployable_tokens(), 1);

    let events = e.deploy().unwrap();
    let Some(SimEvent::DeploymentPerformed { closed_run, new_run, tokens_earned, .. }) = events.first() else {
        panic!("expected a deployment event, got {events:?}");
    };
    assert_eq!(*tokens_earned, 1);
    assert_eq!(closed_run, &old_run);
    assert_ne!(new_run, &old_run);
    assert_eq!(e.run_id(), new_run.as_str());

    assert_eq!(e.deployment().permanent_currency, 1);
    assert_eq!(e.deployment().deployment_count, 1);
    assert_eq!(e.deployment().history.len(), 1);
    assert_eq!(e.deployment().history[0].run_id, old_run);

    assert_eq!(e.ledger().amount(DATA), 10.0);
    assert_eq!(e.ledger().per_second(DATA), 0.0);
    assert_eq!(e.buildings().count("farm"), 0);
    assert_eq!(e.run_stats().data_generated, 0.0);
    assert_eq!(e.lifetime_stats().data_generated, K);
}

/// Nothing new earned since the last deployment: refused, nothing reset.
#[test]
fn redeploy_without_new_tokens_is_refused() {
    let mut e = ready_engine(vec![]);
    e.deploy().unwrap();
    e.purchase("farm", PurchaseAmount::Count(1)).unwrap();
    let run = e.run_id().to_string();

    assert!(matches!(e.deploy(), Err(SimError::InvalidRequest { .. })));
    assert_eq!(e.run_id(), run);
    assert_eq!(e.buildings().count("farm"), 1);
    assert_eq!(e.deployment().deployment_count, 1);
}

/// Achievements and their folded rewards survive the reset.
#[test]
fn achievements_survive_deployment() {
    let mut e = ready_engine(vec![AchievementDef {
        id:          "builder".into(),
        label:       "Builder".into(),
        requirement: Requirement::StatAtLeast { stat: StatKind::BuildingsOwned, threshold: 1.0 },
        reward:      Reward::new(BonusKind::DataGeneration, 0.5),
    }]);
    assert!(e.achievements().is_unlocked("builder"));
    e.deploy().unwrap();

    assert!(e.achievements().is_unlocked("builder"));
    assert_eq!(e.bonuses().data_generation, 1.5);
    e.purchase("farm", PurchaseAmount::Count(1)).unwrap();
    assert!(close(e.ledger().per_second(DATA), 1_500.0));
}

/// Tokens buy permanent upgrades that apply to the new run.
#[test]
fn upgrade_applies_after_deployment() {
    let mut e = ready_engine(vec![]);
    e.deploy().unwrap();

    let events = e.buy_upgrade("efficient_hardware").unwrap();
    assert!(matches!(events[0], SimEvent::UpgradePurchased { new_level: 1, .. }));
    assert_eq!(e.deployment().permanent_currency, 0);
    assert_eq!(e.deployment().upgrade_level("efficient_hardware"), 1);

    e.purchase("farm", PurchaseAmount::Count(1)).unwrap();
    assert!(close(e.ledger().per_second(DATA), 1_100.0));
}

/// No tokens left to spend.
#[test]
fn upgrade_without_tokens_is_insufficient() {
    let mut e = SimEngine::new(SimConfig::default(), defs(vec![])).unwrap();
    assert!(matches!(
        e.buy_upgrade("efficient_hardware"),
        Err(SimError::InsufficientResources { .. })
    ));
    assert!(matches!(e.buy_upgrade("nope"), Err(SimError::InvalidRequest { .. })));
}
