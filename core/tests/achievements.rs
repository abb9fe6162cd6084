//! Achievement engine tests.

use labsim_core::{
    achievement_subsystem::{AchievementBook, AchievementState, Requirement},
    bonus_subsystem::{BonusKind, Reward},
    definitions::{AchievementDef, Definitions},
    engine::SimEngine,
    snapshot::SnapshotState,
    stats::{StatKind, StatsSnapshot},
};

fn book(requirements: Vec<(&str, Requirement)>) -> AchievementBook {
    let defs = Definitions {
        achievements: requirements.into_iter()
            .map(|(id, requirement)| AchievementDef {
                id: id.into(),
                label: id.into(),
                requirement,
                reward: Reward::new(BonusKind::GlobalMultiplier, 0.1),
            })
            .collect(),
        ..Definitions::default()
    };
    AchievementBook::from_definitions(&defs)
}

/// modelsTrained ≥ 1: [] at 0, exactly one at 1, [] on re-evaluation.
#[test]
fn threshold_scenario() {
    let mut b = book(vec![(
        "first_model",
        Requirement::StatAtLeast { stat: StatKind::ModelsTrained, threshold: 1.0 },
    )]);
    let mut stats = StatsSnapshot::default();
    assert!(b.evaluate(&stats).is_empty());

    stats.models_trained = 1;
    let unlocked = b.evaluate(&stats);
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].id, "first_model");

    assert!(b.evaluate(&stats).is_empty());
    assert!(b.is_unlocked("first_model"));
}

/// Newly unlocked entries come back in definition order.
#[test]
fn unlocks_in_definition_order() {
    let mut b = book(vec![
        ("second", Requirement::StatAtLeast { stat: StatKind::TotalClicks, threshold: 2.0 }),
        ("first", Requirement::StatAtLeast { stat: StatKind::TotalClicks, threshold: 1.0 }),
    ]);
    let stats = StatsSnapshot { total_clicks: 5, ..StatsSnapshot::default() };
    let ids: Vec<_> = b.evaluate(&stats).into_iter().map(|u| u.id).collect();
    assert_eq!(ids, vec!["second", "first"]);
}

/// Set membership, category completion and all-completion predicates.
#[test]
fn research_requirements() {
    let mut b = book(vec![
        ("pair", Requirement::ResearchSet { research: vec!["a".into(), "b".into()] }),
        ("safety", Requirement::CategoryComplete { category: "safety".into() }),
        ("all", Requirement::AllResearch),
    ]);
    let mut stats = StatsSnapshot {
        researched: ["a".to_string()].into_iter().collect(),
        research_categories: [("safety".to_string(), (1, 2))].into_iter().collect(),
        research_total: 3,
        ..StatsSnapshot::default()
    };
    assert!(b.evaluate(&stats).is_empty());

    stats.researched.insert("b".into());
    stats.research_categories.insert("safety".into(), (2, 2));
    let ids: Vec<_> = b.evaluate(&stats).into_iter().map(|u| u.id).collect();
    assert_eq!(ids, vec!["pair", "safety"]);

    stats.researched.insert("c".into());
    assert_eq!(b.evaluate(&stats).len(), 1);
}

/// An empty category is never "complete".
#[test]
fn empty_category_does_not_complete() {
    let mut b = book(vec![("ghost", Requirement::CategoryComplete { category: "ghost".into() })]);
    assert!(b.evaluate(&StatsSnapshot::default()).is_empty());
}

/// Restoring an older state never re-locks anything.
#[test]
fn restore_never_relocks() {
    let mut b = book(vec![(
        "click",
        Requirement::StatAtLeast { stat: StatKind::TotalClicks, threshold: 1.0 },
    )]);
    b.evaluate(&StatsSnapshot { total_clicks: 1, ..StatsSnapshot::default() });
    b.restore(AchievementState { unlocked: vec!["unknown".into()] });
    assert!(b.is_unlocked("click"));
    assert_eq!(b.snapshot().unlocked, vec!["click".to_string()]);
}

/// In the engine, a click plus one checked tick unlocks the first-click
/// achievement and folds its click-power reward.
#[test]
fn engine_folds_reward_on_unlock() {
    let mut e = SimEngine::build_test().unwrap();
    e.click().unwrap();
    assert!(!e.achievements().is_unlocked("first_click"));

    let events = e.tick(1.0).unwrap();
    assert!(events.iter().any(|ev| ev.name() == "achievement_unlocked"));
    assert!(e.achievements().is_unlocked("first_click"));
    assert!((e.bonuses().click_power - 1.1).abs() < 1e-12);
}

/// Evaluation waits for the configured interval.
#[test]
fn engine_checks_on_coarse_interval() {
    let mut e = SimEngine::build_test().unwrap();
    e.click().unwrap();
    e.tick(0.25).unwrap();
    e.tick(0.25).unwrap();
    assert!(!e.achievements().is_unlocked("first_click"));
    e.tick(0.5).unwrap();
    assert!(e.achievements().is_unlocked("first_click"));
}
