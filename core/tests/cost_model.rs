//! Cost and production model tests.

use labsim_core::{
    cost_model::{bulk_cost, cost, production, total},
    definitions::{costs, BuildingDef, Definitions, UnlockCondition},
    types::DATA,
};

fn building(base: f64, growth: f64) -> BuildingDef {
    BuildingDef {
        id:           "a".into(),
        label:        "A".into(),
        base_cost:    costs(&[(DATA, base)]),
        cost_growth:  growth,
        production:   costs(&[(DATA, 1.0)]),
        global_bonus: None,
        unlock:       UnlockCondition::Always,
    }
}

/// bulkCost(from=0, qty=3, base=10, growth=1.15) = 10 + 11 + 13.
#[test]
fn bulk_cost_scenario() {
    assert_eq!(bulk_cost(&building(10.0, 1.15), 0, 3)[DATA], 34.0);
}

/// Bulk cost from a later count continues the same unit sequence.
#[test]
fn bulk_cost_continues_from_owned_count() {
    let b = building(10.0, 1.15);
    let whole = bulk_cost(&b, 0, 5)[DATA];
    let split = bulk_cost(&b, 0, 2)[DATA] + bulk_cost(&b, 2, 3)[DATA];
    assert_eq!(whole, split);
}

/// Every shipped building gets strictly more expensive with each unit.
#[test]
fn standard_catalog_costs_strictly_increase() {
    for b in &Definitions::standard().buildings {
        let mut previous = total(&cost(b, 0));
        for n in 1..200 {
            let next = total(&cost(b, n));
            assert!(next > previous, "{} unit {n}: {next} <= {previous}", b.id);
            previous = next;
        }
    }
}

/// Production is base × count × multiplier per output resource.
#[test]
fn production_scales_linearly() {
    let out = production(&costs(&[(DATA, 2.0)]), 5, 1.5);
    assert_eq!(out[DATA], 15.0);
    assert_eq!(production(&costs(&[(DATA, 2.0)]), 0, 1.5)[DATA], 0.0);
}
