//! Save, load, export and import.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use labsim_core::{
    config::SimConfig,
    definitions::Definitions,
    engine::SimEngine,
    error::SimError,
    purchase_subsystem::PurchaseAmount,
    snapshot::SaveDocument,
    store::MemorySaveStore,
    types::{COMPUTE, DATA},
};

// ── Helpers ──────────────────────────────────────────────────

/// A few clicks, three scrapers, one second of play.
fn played_engine() -> SimEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut e = SimEngine::build_test().expect("engine");
    for _ in 0..20 {
        e.click().unwrap();
    }
    e.purchase("data_scraper", PurchaseAmount::Count(3)).unwrap();
    e.tick(1.0).unwrap();
    e
}

/// A second run with an upgrade bought, research completed, one model
/// training and another queued behind it.
fn deep_engine() -> SimEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut defs = Definitions::standard();
    for r in &mut defs.resources {
        r.initial = 1e6;
    }
    let mut e = SimEngine::new(SimConfig::default(), defs).expect("engine");
    e.purchase("data_scraper", PurchaseAmount::Count(10)).unwrap();
    e.tick(100_000.0).unwrap();
    e.deploy().unwrap();
    e.buy_upgrade("efficient_hardware").unwrap();

    e.purchase("data_scraper", PurchaseAmount::Count(5)).unwrap();
    for node in [
        "better_tokenizers",
        "gpu_kernels",
        "convolutional_nets",
        "distributed_training",
        "mixed_precision",
    ] {
        e.complete_research(node).unwrap();
    }
    e.train("small_lm").unwrap();
    e.train("vision_model").unwrap();
    e.tick(1.0).unwrap();
    e
}

/// The document minus wall-clock fields.
fn comparable(e: &SimEngine) -> SaveDocument {
    let mut doc = e.to_document();
    doc.timestamp = None;
    if let Some(clock) = doc.clock.as_mut() {
        clock.last_saved_ms = None;
    }
    doc
}

// ── Tests ────────────────────────────────────────────────────

/// export → import into a fresh engine reproduces the same state.
#[test]
fn export_import_roundtrip() {
    let source = played_engine();
    let exported = source.export_string().unwrap();

    let mut target = SimEngine::build_test().unwrap();
    target.import_string(&exported).unwrap();

    assert_eq!(comparable(&target), comparable(&source));
    assert_eq!(target.run_id(), source.run_id());
    assert_eq!(target.bonuses(), source.bonuses());
    assert_eq!(target.ledger().per_second(DATA), source.ledger().per_second(DATA));
    assert_eq!(
        target.research().cached_multipliers(),
        Some(target.research().compute_multipliers())
    );
}

/// Recomputed multipliers and rates survive a round trip with research,
/// upgrades and training all contributing.
#[test]
fn roundtrip_preserves_derived_rates() {
    let source = deep_engine();
    assert!(source.training().active().is_some());
    assert_eq!(source.training().queue().count(), 1);
    assert!(source.breakdown().training_speed > 1.0);
    assert!(source.breakdown().upgrades.efficiency() > 1.0);

    let mut target = SimEngine::new(SimConfig::default(), Definitions::standard()).unwrap();
    target.import_string(&source.export_string().unwrap()).unwrap();

    assert_eq!(comparable(&target), comparable(&source));
    assert_eq!(target.breakdown(), source.breakdown());
    assert_eq!(target.deployment().permanent_currency, source.deployment().permanent_currency);
    for (id, r) in source.ledger().iter() {
        assert_eq!(target.ledger().per_second(id), r.per_second(), "rate of {id}");
    }
}

/// A malformed import fails and leaves state exactly as it was.
#[test]
fn corrupt_import_changes_nothing() {
    let mut e = played_engine();
    let before = comparable(&e);

    let err = e.import_string("definitely not base64 !!").unwrap_err();
    assert!(matches!(err, SimError::CorruptSnapshot(_)));

    let wrong_shape = STANDARD.encode(r#"{"resources":5}"#);
    let err = e.import_string(&wrong_shape).unwrap_err();
    assert!(matches!(err, SimError::CorruptSnapshot(_)));

    assert_eq!(comparable(&e), before);
}

/// An older document with most fields missing still loads; absent
/// fields keep their current values.
#[test]
fn partial_document_merges() {
    let mut e = played_engine();
    let scrapers = e.buildings().count("data_scraper");
    let old = STANDARD.encode(r#"{"version":0,"resources":{"data":{"amount":42.0}}}"#);

    e.import_string(&old).unwrap();
    assert_eq!(e.ledger().amount(DATA), 42.0);
    assert_eq!(e.ledger().amount(COMPUTE), 0.0);
    assert_eq!(e.buildings().count("data_scraper"), scrapers);
}

/// save → load through a store; an empty store reports no save.
#[test]
fn save_and_load_through_store() {
    let mut store = MemorySaveStore::new();
    let mut fresh = SimEngine::build_test().unwrap();
    assert!(!fresh.load(&store).unwrap());

    let mut source = played_engine();
    source.save(&mut store).unwrap();
    assert!(source.clock().last_saved_ms.is_some());
    assert_eq!(store.len(), 1);

    assert!(fresh.load(&store).unwrap());
    assert!(fresh.clock().last_saved_ms.is_some());
    assert_eq!(comparable(&fresh), comparable(&source));

    source.delete_save(&mut store).unwrap();
    assert!(store.is_empty());
}
