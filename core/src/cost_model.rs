//! Cost and production model: pure, total functions.
//!
//! Unit cost at count n:  Σ_r floor(base[r] · growth^n · (1 − reduction))
//! Bulk cost is the iterative sum of unit costs. A closed-form geometric
//! series would skip the per-unit floor and drift from what the player
//! is actually charged one unit at a time.

use crate::types::CostMap;

/// Anything bought at an exponentially growing price.
pub trait Priced {
    fn base_cost(&self) -> &CostMap;
    fn cost_growth(&self) -> f64;
}

/// Price of the unit bought when `at_count` are already owned.
pub fn cost<P: Priced + ?Sized>(entity: &P, at_count: u64) -> CostMap {
    unit_cost(entity.base_cost(), entity.cost_growth(), at_count, 0.0)
}

/// Total price of `qty` units starting at `from`.
pub fn bulk_cost<P: Priced + ?Sized>(entity: &P, from: u64, qty: u64) -> CostMap {
    bulk_cost_with_reduction(entity, from, qty, 0.0)
}

pub fn bulk_cost_with_reduction<P: Priced + ?Sized>(
    entity: &P,
    from: u64,
    qty: u64,
    reduction: f64,
) -> CostMap {
    let mut total = CostMap::new();
    for i in 0..qty {
        let unit = unit_cost(
            entity.base_cost(),
            entity.cost_growth(),
            from.saturating_add(i),
            reduction,
        );
        for (id, amount) in unit {
            *total.entry(id).or_insert(0.0) += amount;
        }
        // Once any entry overflows, further units cannot change the outcome.
        if total.values().any(|v| v.is_infinite()) {
            break;
        }
    }
    if qty == 0 {
        for id in entity.base_cost().keys() {
            total.insert(id.clone(), 0.0);
        }
    }
    total
}

/// Per-unit price with a fractional reduction applied before flooring.
pub fn unit_cost(base: &CostMap, growth: f64, at_count: u64, reduction: f64) -> CostMap {
    let scale = growth.powf(at_count as f64) * (1.0 - reduction.clamp(0.0, 1.0));
    base.iter()
        .map(|(id, b)| (id.clone(), (b * scale).floor()))
        .collect()
}

/// `base_production × count × multiplier` for every produced resource.
pub fn production(base: &CostMap, count: u64, multiplier: f64) -> CostMap {
    base.iter()
        .map(|(id, rate)| (id.clone(), rate * count as f64 * multiplier))
        .collect()
}

/// Sum of all entries. Handy for ordering and display only.
pub fn total(cost: &CostMap) -> f64 {
    cost.values().sum()
}

/// Scale every entry of a cost map, flooring the result.
pub fn scaled(cost: &CostMap, factor: f64) -> CostMap {
    cost.iter()
        .map(|(id, v)| (id.clone(), (v * factor).floor()))
        .collect()
}
