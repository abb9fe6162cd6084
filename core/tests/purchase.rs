//! Bulk purchase tests.

use labsim_core::{
    config::SimConfig,
    definitions::{costs, BuildingDef, Definitions, ResourceDef, UnlockCondition},
    engine::SimEngine,
    error::SimError,
    purchase_subsystem::PurchaseAmount,
    types::DATA,
};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────

fn defs_with_data(data: f64) -> Definitions {
    Definitions {
        resources: vec![ResourceDef { id: DATA.into(), label: "Data".into(), initial: data, track_max: true }],
        buildings: vec![
            BuildingDef {
                id:           "a".into(),
                label:        "A".into(),
                base_cost:    costs(&[(DATA, 10.0)]),
                cost_growth:  1.15,
                production:   costs(&[(DATA, 1.0)]),
                global_bonus: None,
                unlock:       UnlockCondition::Always,
            },
            BuildingDef {
                id:           "locked".into(),
                label:        "Locked".into(),
                base_cost:    costs(&[(DATA, 10.0)]),
                cost_growth:  1.15,
                production:   costs(&[(DATA, 1.0)]),
                global_bonus: None,
                unlock:       UnlockCondition::ResourceReached { resource: DATA.into(), amount: 1e12 },
            },
        ],
        ..Definitions::default()
    }
}

fn engine(data: f64) -> SimEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SimEngine::new(SimConfig::default(), defs_with_data(data)).expect("engine")
}

// ── Tests ────────────────────────────────────────────────────

/// An unaffordable explicit request buys as many as the balance covers.
#[test]
fn explicit_request_falls_back_to_affordable() {
    let mut e = engine(34.0);
    let events = e.purchase("a", PurchaseAmount::Count(10)).unwrap();
    assert_eq!(e.buildings().count("a"), 3);
    assert_eq!(e.ledger().amount(DATA), 0.0);
    assert_eq!(e.lifetime_stats().buildings_purchased, 3);
    assert_eq!(events[0].name(), "building_purchased");
}

/// An unbounded cap still resolves Max to the affordable count.
#[test]
fn max_with_unbounded_cap() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = SimConfig { bulk_purchase_cap: u64::MAX, ..SimConfig::default() };
    let mut e = SimEngine::new(config, defs_with_data(34.0)).expect("engine");
    e.purchase("a", PurchaseAmount::Max).unwrap();
    assert_eq!(e.buildings().count("a"), 3);
    assert_eq!(e.ledger().amount(DATA), 0.0);
}

/// Zero affordable units is a failure that changes nothing.
#[test]
fn zero_affordable_is_insufficient() {
    let mut e = engine(9.0);
    let err = e.purchase("a", PurchaseAmount::Max).unwrap_err();
    assert!(matches!(err, SimError::InsufficientResources { .. }));
    assert_eq!(e.ledger().amount(DATA), 9.0);
    assert_eq!(e.buildings().count("a"), 0);
}

/// Locked and unknown buildings are invalid requests, not shortfalls.
#[test]
fn locked_or_unknown_building_is_invalid() {
    let mut e = engine(1_000.0);
    assert!(matches!(
        e.purchase("locked", PurchaseAmount::Count(1)),
        Err(SimError::InvalidRequest { .. })
    ));
    assert!(matches!(
        e.purchase("nope", PurchaseAmount::Count(1)),
        Err(SimError::InvalidRequest { .. })
    ));
    assert_eq!(e.ledger().amount(DATA), 1_000.0);
}

/// The configured multiplier drives `Configured` purchases.
#[test]
fn configured_multiplier_is_used() {
    let mut e = engine(1_000.0);
    assert!(e.set_purchase_multiplier(0).is_err());
    e.set_purchase_multiplier(4).unwrap();
    e.purchase("a", PurchaseAmount::Configured).unwrap();
    assert_eq!(e.buildings().count("a"), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Buying max never overdraws and never leaves enough for one more unit.
    #[test]
    fn max_purchase_is_tight(data in 10.0f64..5_000_000.0) {
        let mut e = engine(data);
        e.purchase("a", PurchaseAmount::Max).unwrap();
        let left = e.ledger().amount(DATA);
        prop_assert!(left >= 0.0);
        let next = e.next_cost("a").unwrap();
        prop_assert!(!e.ledger().can_afford(&next), "left {} could buy another at {:?}", left, next);
    }
}
