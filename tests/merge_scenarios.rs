#[path = "../src/test_support.rs"]
mod test_support;

use loopmerge_rs::{
    MemoryStore, MergePolicy, Reconciled, Reconciler, RecordPort, Source, Validity,
};
use test_support::{ns_reading, pump_tbr};

#[test]
fn ns_id_backfill_reports_updated_external_id_without_insert() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();

    // A local record that predates any cloud diary knowledge.
    let mut local = ns_reading(1_000, 120.0, "unused");
    local.core.ids.nightscout_id = None;
    store.insert(local);

    let result = Reconciler::nightscout().apply_one(&mut store, ns_reading(1_000, 120.0, "ns-1"));

    assert!(result.inserted.is_empty());
    assert_eq!(result.updated_external_id.len(), 1);
    assert_eq!(
        result.updated_external_id[0]
            .core
            .ids
            .nightscout_id
            .as_deref(),
        Some("ns-1")
    );
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn conflicting_composite_match_is_dropped_entirely() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();

    let mut stored = pump_tbr(1_000, 60_000, 42);
    stored.core.ids.nightscout_id = Some("ns-OLD".to_string());
    let id = store.insert(stored);

    let mut incoming = pump_tbr(1_000, 30_000, 42);
    incoming.core.ids.nightscout_id = Some("ns-NEW".to_string());

    let result = Reconciler::nightscout().begin_interval(&mut store, incoming);

    // Guard rule: neither an insert nor an update.
    assert!(result.is_empty());
    assert_eq!(store.len(), 1);
    let untouched = store
        .find_by_local_id(id)
        .expect("stored record still present");
    assert_eq!(untouched.core.ids.nightscout_id.as_deref(), Some("ns-OLD"));
    assert_eq!(untouched.duration, 60_000);
    Ok(())
}

#[test]
fn pump_confirmation_resolves_through_temporary_id() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();

    // Created locally before the pump confirmed: only a temporary id.
    let mut pending = pump_tbr(1_000, 60_000, 0);
    pending.core.ids.pump_id = None;
    pending.core.ids.temporary_id = Some(555);
    store.insert(pending);

    // The pump confirms with a definitive pump id and the same temporary id.
    let mut confirmed = pump_tbr(1_000, 60_000, 42);
    confirmed.core.ids.temporary_id = Some(555);

    let result = Reconciler::pump().begin_interval(&mut store, confirmed);

    assert!(result.inserted.is_empty());
    assert_eq!(result.updated_external_id.len(), 1);
    assert_eq!(result.updated_external_id[0].core.ids.pump_id, Some(42));
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn invalidity_is_monotonic_across_operation_sequences() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let engine = Reconciler::nightscout();

    let mut incoming = ns_reading(1_000, 120.0, "ns-1");
    incoming.core.validity = Validity::Invalidated {
        at: 2_000,
        by: Source::Nightscout,
    };
    engine.apply_one(&mut store, incoming);

    // A later batch claims the record is valid again, with a payload edit.
    let revived = ns_reading(1_000, 140.0, "ns-1");
    let result = engine.apply_one(&mut store, revived);

    assert!(result.invalidated.is_empty());
    let stored = store.find_by_nightscout_id("ns-1").unwrap();
    assert!(!stored.is_valid());
    // Payload still merges; validity does not.
    assert_eq!(stored.value_mgdl, 140.0);
    Ok(())
}

#[test]
fn device_authoritative_merge_backfills_but_keeps_payload() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    store.insert(ns_reading(1_000, 120.0, "ns-1"));

    let engine = Reconciler::new(Source::Nightscout, MergePolicy::DeviceAuthoritative);
    let mut incoming = ns_reading(1_500, 140.0, "ns-1");
    incoming.core.ids.temporary_id = Some(9);

    let result = engine.apply_one(&mut store, incoming);

    assert_eq!(result.updated_external_id.len(), 1);
    assert!(result.updated.is_empty());

    let stored = store.find_by_nightscout_id("ns-1").unwrap();
    assert_eq!(stored.value_mgdl, 120.0);
    assert_eq!(stored.timestamp(), 1_000);
    assert_eq!(stored.core.ids.temporary_id, Some(9));
    Ok(())
}
