#[path = "../src/test_support.rs"]
mod test_support;

use loopmerge_rs::entities::ExtendedBolus;
use loopmerge_rs::{
    ExternalIds, IntervalPort, IntervalRecord, MemoryStore, PumpType, Reconciled, Reconciler,
};
use test_support::{generate_tbr_chain, pump_tbr};

fn pump_eb(timestamp: i64, duration: i64, amount: f64, pump_id: i64) -> ExtendedBolus {
    let mut record = ExtendedBolus::new(timestamp, duration, amount);
    record.core.ids = ExternalIds {
        pump_id: Some(pump_id),
        pump_type: Some(PumpType::Dana),
        pump_serial: Some("SN-TEST".to_string()),
        ..Default::default()
    };
    record
}

#[test]
fn new_interval_splits_running_extended_bolus() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let engine = Reconciler::pump();

    engine.begin_interval(&mut store, pump_eb(1_000, 60_000, 6.0, 1));
    let result = engine.begin_interval(&mut store, pump_eb(31_000, 30_000, 2.0, 2));

    let closed = &result.ended[0];
    assert_eq!(closed.core.timestamp, 1_000);
    assert_eq!(closed.duration, 30_000);
    assert!((closed.amount - 3.0).abs() < 1e-9);

    let opened = &result.inserted[0];
    assert_eq!(opened.core.timestamp, 31_000);
    assert_eq!(opened.amount, 2.0);

    // The old record is closed exactly where the new one begins.
    assert_eq!(closed.end(), opened.timestamp());
    Ok(())
}

#[test]
fn proportional_truncation_matches_elapsed_fraction() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let engine = Reconciler::pump();

    // duration D = 50 min, closed after 20 min: amount' = 5.0 * 20/50 = 2.0
    engine.begin_interval(&mut store, pump_eb(0, 3_000_000, 5.0, 1));
    let result = engine.begin_interval(&mut store, pump_eb(1_200_000, 600_000, 1.0, 2));

    let closed = &result.ended[0];
    assert_eq!(closed.duration, 1_200_000);
    assert!((closed.amount - 2.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn at_most_one_active_after_randomized_chain() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let engine = Reconciler::pump();

    let chain = generate_tbr_chain(50, 11);
    let horizon = chain.last().map(|r| r.timestamp() + r.duration).unwrap();
    engine.apply_interval_batch(&mut store, chain);

    for t in (0..horizon).step_by(60_000) {
        let active = store
            .all()
            .into_iter()
            .filter(|record| record.is_active_at(t))
            .count();
        assert!(active <= 1, "{} records active at {}", active, t);
    }
    Ok(())
}

#[test]
fn randomized_chain_replay_is_empty() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let engine = Reconciler::pump();
    let chain = generate_tbr_chain(50, 23);

    let first = engine.apply_interval_batch(&mut store, chain.clone());
    assert_eq!(first.inserted.len(), 50);
    let count_after_first = store.len();

    let second = engine.apply_interval_batch(&mut store, chain);
    assert!(second.is_empty());
    assert_eq!(store.len(), count_after_first);
    Ok(())
}

#[test]
fn termination_replay_after_clamped_close_is_noop() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let engine = Reconciler::pump();

    engine.begin_interval(&mut store, pump_tbr(1_000, 60_000, 1));

    // Cancellation arriving at the record's own start clamps to 1 ms and
    // stamps the terminating id.
    let first = engine.begin_interval(&mut store, pump_tbr(1_000, 0, 2));
    assert_eq!(first.ended.len(), 1);
    assert_eq!(first.ended[0].duration, 1);
    assert_eq!(first.ended[0].core.ids.end_id, Some(2));

    // The clamped record is still active at t=1000; the end-id check is
    // what makes the replay a no-op instead of a second close.
    assert!(store.find_active_at(1_000).is_some());
    let replay = engine.begin_interval(&mut store, pump_tbr(1_000, 0, 2));
    assert!(replay.is_empty());
    Ok(())
}

#[test]
fn interval_merge_without_new_interval_follows_field_policy() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let pump_engine = Reconciler::pump();
    let ns_engine = Reconciler::nightscout();

    pump_engine.begin_interval(&mut store, pump_tbr(1_000, 60_000, 1));

    // The diary echoes the same record back with its cloud id attached: a
    // pure external-id merge, no lifecycle involvement.
    let mut echoed = pump_tbr(1_000, 60_000, 1);
    echoed.core.ids.nightscout_id = Some("ns-tbr-1".to_string());
    let result = ns_engine.begin_interval(&mut store, echoed);

    assert_eq!(result.updated_external_id.len(), 1);
    assert!(result.ended.is_empty());
    assert!(result.inserted.is_empty());
    assert_eq!(store.len(), 1);
    Ok(())
}
