//! Progress analytics tests.

use labsim_core::{
    achievement_subsystem::Requirement,
    bonus_subsystem::{BonusKind, Reward},
    config::SimConfig,
    definitions::{costs, AchievementDef, BuildingDef, Definitions, ResourceDef, UnlockCondition},
    engine::SimEngine,
    progress::ProgressLog,
    purchase_subsystem::PurchaseAmount,
    stats::StatKind,
    types::{COMPUTE, DATA},
};

fn engine() -> SimEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let building = |id: &str, base_cost| BuildingDef {
        id:           id.into(),
        label:        id.into(),
        base_cost,
        cost_growth:  1.15,
        production:   costs(&[(DATA, 1.0)]),
        global_bonus: None,
        unlock:       UnlockCondition::Always,
    };
    let defs = Definitions {
        resources: vec![
            ResourceDef { id: DATA.into(), label: "Data".into(), initial: 10.0, track_max: true },
            ResourceDef { id: COMPUTE.into(), label: "Compute".into(), initial: 0.0, track_max: true },
        ],
        buildings: vec![
            building("scraper", costs(&[(DATA, 10.0)])),
            building("rack", costs(&[(DATA, 10.0), (COMPUTE, 10.0)])),
        ],
        achievements: vec![
            AchievementDef {
                id:          "hundred".into(),
                label:       "Hundred".into(),
                requirement: Requirement::StatAtLeast { stat: StatKind::DataGenerated, threshold: 100.0 },
                reward:      Reward::new(BonusKind::DataGeneration, 0.1),
            },
            AchievementDef {
                id:          "scholar".into(),
                label:       "Scholar".into(),
                requirement: Requirement::AllResearch,
                reward:      Reward::new(BonusKind::DataGeneration, 0.1),
            },
        ],
        ..Definitions::default()
    };
    let mut e = SimEngine::new(SimConfig::default(), defs).expect("engine");
    e.purchase("scraper", PurchaseAmount::Count(1)).unwrap();
    e
}

/// Threshold achievements get a report with a time estimate.
#[test]
fn reports_cover_locked_threshold_achievements() {
    let e = engine();
    let reports = e.progress_reports();
    assert_eq!(reports.len(), 1);
    let r = &reports[0];
    assert_eq!(r.achievement, "hundred");
    assert_eq!((r.current, r.target), (0.0, 100.0));
    assert_eq!(r.rate, Some(1.0));
    assert_eq!(r.time_estimate_secs, Some(100.0));
}

/// Consumers are handed in explicitly and receive one batch per publish.
#[test]
fn publish_hands_reports_to_consumer() {
    let mut e = engine();
    let mut log = ProgressLog::default();
    e.publish_progress(&mut log);
    e.tick(40.0).unwrap();
    e.publish_progress(&mut log);
    assert_eq!(log.batches.len(), 2);
    assert_eq!(log.batches[1][0].current, 40.0);
    assert_eq!(log.batches[1][0].time_estimate_secs, Some(60.0));
}

/// Waiting time for the next unit, or None when a shortfall never closes.
#[test]
fn time_to_afford_next_unit() {
    let e = engine();
    assert_eq!(e.time_to_afford("scraper"), Some(11.0));
    assert_eq!(e.time_to_afford("rack"), None);
    assert_eq!(e.time_to_afford("nope"), None);
}
