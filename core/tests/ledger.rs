//! Resource ledger tests.

use labsim_core::{
    definitions::costs,
    ledger::ResourceLedger,
    snapshot::SnapshotState,
    types::{COMPUTE, DATA},
};

fn ledger(data: f64, compute: f64) -> ResourceLedger {
    let mut ledger = ResourceLedger::new();
    ledger.register(DATA, data, true);
    ledger.register(COMPUTE, compute, false);
    ledger
}

/// Lifetime totals count only gains; the running max survives spending.
#[test]
fn lifetime_and_running_max_only_move_up() {
    let mut l = ledger(0.0, 0.0);
    assert!(l.add(DATA, 10.0));
    assert!(l.spend(&costs(&[(DATA, 4.0)])));
    assert!(l.add(DATA, -3.0));

    let data = l.get(DATA).unwrap();
    assert_eq!(data.amount(), 3.0);
    assert_eq!(data.lifetime_total(), 10.0);
    assert_eq!(data.running_max(), Some(10.0));
    assert_eq!(data.peak(), 10.0);
}

/// Resources declared without a tracked maximum carry none.
#[test]
fn untracked_resource_has_no_running_max() {
    let mut l = ledger(0.0, 5.0);
    l.add(COMPUTE, 5.0);
    assert_eq!(l.get(COMPUTE).unwrap().running_max(), None);
    assert_eq!(l.get(COMPUTE).unwrap().peak(), 10.0);
}

/// An add that would go negative is refused without touching the balance.
#[test]
fn add_refuses_negative_result() {
    let mut l = ledger(5.0, 0.0);
    assert!(!l.add(DATA, -6.0));
    assert!(!l.add(DATA, f64::NAN));
    assert_eq!(l.amount(DATA), 5.0);
}

/// Unknown resources are never affordable and cannot be credited.
#[test]
fn unknown_resource_is_unaffordable() {
    let mut l = ledger(100.0, 100.0);
    assert!(!l.can_afford(&costs(&[("funding", 1.0)])));
    assert!(!l.add("funding", 1.0));
    assert!(l.can_afford(&costs(&[(DATA, 100.0)])));
}

/// Spend debits every entry or none of them.
#[test]
fn spend_is_all_or_nothing() {
    let mut l = ledger(10.0, 5.0);
    assert!(!l.spend(&costs(&[(DATA, 5.0), (COMPUTE, 10.0)])));
    assert_eq!(l.amount(DATA), 10.0);
    assert_eq!(l.amount(COMPUTE), 5.0);

    assert!(l.spend(&costs(&[(DATA, 10.0), (COMPUTE, 5.0)])));
    assert_eq!(l.amount(DATA), 0.0);
    assert_eq!(l.amount(COMPUTE), 0.0);
}

/// Restore skips unknown ids and invalid numbers.
#[test]
fn restore_is_tolerant() {
    let mut source = ledger(0.0, 0.0);
    source.add(DATA, 42.0);
    let mut state = source.snapshot();
    state.get_mut(COMPUTE).unwrap().amount = Some(f64::NAN);
    state.insert("mystery".into(), Default::default());

    let mut target = ledger(0.0, 7.0);
    target.restore(state);
    assert_eq!(target.amount(DATA), 42.0);
    assert_eq!(target.amount(COMPUTE), 7.0);
    assert!(!target.contains("mystery"));
}
