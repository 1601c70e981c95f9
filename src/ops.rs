//! # Single-Record Operations Module
//!
//! Operations addressed by local primary key: invalidate, cut, and the
//! best-effort external-id reconciliation pass. These are the only fallible
//! paths in the crate; a missing key aborts before any write.

use crate::config::Source;
use crate::error::{ReconcileError, Result};
use crate::model::{IntervalRecord, LocalId, Millis, Reconciled};
use crate::result::TxResult;
use crate::store::RecordPort;
use tracing::debug;

/// Soft-delete the record with the given local key.
///
/// Fails with [`ReconcileError::NotFound`] when the key is absent. Already
/// invalid records are left untouched and the result is empty.
pub fn invalidate<E, P>(port: &mut P, id: LocalId, at: Millis, by: Source) -> Result<TxResult<E>>
where
    E: Reconciled,
    P: RecordPort<E> + ?Sized,
{
    let mut record = port
        .find_by_local_id(id)
        .ok_or(ReconcileError::NotFound {
            entity: E::ENTITY,
            id,
        })?;

    let mut result = TxResult::new();
    if record.invalidate(at, by) {
        port.update(&record);
        debug!(entity = E::ENTITY, local_id = %id, "invalidated record");
        result.invalidated.push(record);
    }
    Ok(result)
}

/// Truncate the interval record with the given local key at instant `at`.
///
/// Boundary policy:
/// - `at` before the start, or at/after the end: no-op.
/// - `at` exactly at the start: fully invalidate, quantity untouched.
/// - strictly inside: shrink the duration to `at - start` and rescale the
///   carried quantity proportionally.
pub fn cut<E, P>(port: &mut P, id: LocalId, at: Millis) -> Result<TxResult<E>>
where
    E: IntervalRecord,
    P: RecordPort<E> + ?Sized,
{
    let mut record = port
        .find_by_local_id(id)
        .ok_or(ReconcileError::NotFound {
            entity: E::ENTITY,
            id,
        })?;

    let mut result = TxResult::new();
    let start = record.timestamp();

    if at == start {
        // Cutting at the very start means the record never took effect;
        // a zero-duration truncation would leave a misleading quantity.
        if record.invalidate(at, Source::User) {
            port.update(&record);
            result.invalidated.push(record);
        }
        return Ok(result);
    }
    if at < start || at >= record.end() {
        return Ok(result);
    }

    record.truncate_to(at - start);
    port.update(&record);
    debug!(entity = E::ENTITY, local_id = %id, cut_at = at, "truncated record");
    result.updated.push(record);
    Ok(result)
}

/// Best-effort overwrite of the cloud diary id on one record.
///
/// Part of a reconciliation pass over a batch, so an absent key is skipped
/// silently rather than raised; an unchanged id is a no-op.
pub fn update_nightscout_id<E, P>(port: &mut P, id: LocalId, ns_id: &str) -> TxResult<E>
where
    E: Reconciled,
    P: RecordPort<E> + ?Sized,
{
    let mut result = TxResult::new();
    let Some(mut record) = port.find_by_local_id(id) else {
        return result;
    };
    if record.ids().nightscout_id.as_deref() == Some(ns_id) {
        return result;
    }

    record.core_mut().ids.nightscout_id = Some(ns_id.to_string());
    port.update(&record);
    debug!(entity = E::ENTITY, local_id = %id, ns_id, "updated nightscout id");
    result.updated_external_id.push(record);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Carbs;
    use crate::store::MemoryStore;

    fn seeded_store() -> (MemoryStore<Carbs>, LocalId) {
        let mut store = MemoryStore::new();
        let id = store.insert(Carbs::new(1_000, 60_000, 100.0));
        (store, id)
    }

    #[test]
    fn test_invalidate_missing_key_fails_before_write() {
        let (mut store, _) = seeded_store();
        let err = invalidate(&mut store, LocalId(99), 5_000, Source::User).unwrap_err();
        assert_eq!(
            err.to_string(),
            "there is no such Carbs with the specified ID"
        );
        assert!(store.find_by_local_id(LocalId(1)).unwrap().is_valid());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let (mut store, id) = seeded_store();
        let first = invalidate(&mut store, id, 5_000, Source::User).unwrap();
        assert_eq!(first.invalidated.len(), 1);

        let second = invalidate(&mut store, id, 6_000, Source::User).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_cut_midway_rescales_and_shrinks() {
        let (mut store, id) = seeded_store();
        let result = cut(&mut store, id, 31_000).unwrap();
        assert_eq!(result.updated.len(), 1);

        let record = store.find_by_local_id(id).unwrap();
        assert_eq!(record.duration, 30_000);
        assert_eq!(record.grams, 50.0);
    }

    #[test]
    fn test_cut_at_quarter() {
        let (mut store, id) = seeded_store();
        cut(&mut store, id, 16_000).unwrap();
        let record = store.find_by_local_id(id).unwrap();
        assert_eq!(record.grams, 25.0);
        assert_eq!(record.duration, 15_000);
    }

    #[test]
    fn test_cut_at_start_invalidates_without_rescale() {
        let (mut store, id) = seeded_store();
        let result = cut(&mut store, id, 1_000).unwrap();
        assert_eq!(result.invalidated.len(), 1);
        assert!(result.updated.is_empty());

        let record = store.find_by_local_id(id).unwrap();
        assert!(!record.is_valid());
        assert_eq!(record.grams, 100.0);
        assert_eq!(record.duration, 60_000);
    }

    #[test]
    fn test_cut_outside_interval_is_noop() {
        let (mut store, id) = seeded_store();
        assert!(cut(&mut store, id, 500).unwrap().is_empty());
        assert!(cut(&mut store, id, 61_000).unwrap().is_empty());
        assert!(cut(&mut store, id, 90_000).unwrap().is_empty());

        let record = store.find_by_local_id(id).unwrap();
        assert_eq!(record.grams, 100.0);
        assert_eq!(record.duration, 60_000);
    }

    #[test]
    fn test_cut_missing_key_fails() {
        let (mut store, _) = seeded_store();
        assert!(cut(&mut store, LocalId(99), 31_000).is_err());
    }

    #[test]
    fn test_update_nightscout_id_best_effort() {
        let (mut store, id) = seeded_store();

        // Absent key: skipped, no error.
        let result = update_nightscout_id(&mut store, LocalId(99), "ns-1");
        assert!(result.is_empty());

        let result = update_nightscout_id(&mut store, id, "ns-1");
        assert_eq!(result.updated_external_id.len(), 1);

        // Unchanged id: no-op.
        let result = update_nightscout_id(&mut store, id, "ns-1");
        assert!(result.is_empty());

        // A differing id is overwritten by this operation.
        let result = update_nightscout_id(&mut store, id, "ns-2");
        assert_eq!(result.updated_external_id.len(), 1);
        assert_eq!(
            store
                .find_by_local_id(id)
                .unwrap()
                .core
                .ids
                .nightscout_id
                .as_deref(),
            Some("ns-2")
        );
    }
}
