//! # Store Module
//!
//! The Record Store ports the reconciliation core consumes, plus
//! [`MemoryStore`], an in-memory reference implementation used by the tests
//! and by embedders without a database.
//!
//! All reads and writes issued by one engine operation are expected to land
//! inside one storage-level transaction; the core performs no locking itself
//! and assumes the surrounding storage layer provides isolation. Embedders
//! with a real database implement these traits over their transaction
//! handle.

use crate::model::{IntervalRecord, LocalId, Millis, PumpKey, Reconciled};
use hashbrown::HashMap;

/// The minimal lookup/write contract an entity type's storage must expose.
pub trait RecordPort<E: Reconciled> {
    /// Look up by local primary key.
    fn find_by_local_id(&self, id: LocalId) -> Option<E>;

    /// Look up by the cloud diary id.
    fn find_by_nightscout_id(&self, ns_id: &str) -> Option<E>;

    /// Look up by the client-generated correlation id.
    fn find_by_temporary_id(&self, temporary_id: i64) -> Option<E>;

    /// Look up by the fully-populated composite pump identity.
    fn find_by_pump_key(&self, key: &PumpKey) -> Option<E>;

    /// Look up the timestamp-dedup match for `probe`. The probe form keeps
    /// subtype-scoped dedup (therapy events match on type as well) inside
    /// the port contract.
    fn find_by_timestamp(&self, probe: &E) -> Option<E>;

    /// Persist a new record, returning the assigned local key.
    fn insert(&mut self, record: E) -> LocalId;

    /// Persist changes to an existing record, addressed by its local key.
    fn update(&mut self, record: &E);
}

/// Additional lookup interval entities expose.
pub trait IntervalPort<E: IntervalRecord>: RecordPort<E> {
    /// The record in effect at `at`, if any. When histories created outside
    /// this core hold more than one, the latest-starting record wins so the
    /// engine always closes the most recent interval first.
    fn find_active_at(&self, at: Millis) -> Option<E>;
}

/// In-memory record store, one entity type per instance.
///
/// Lookups scan the primary map; where several records satisfy a predicate
/// the lowest local key wins, keeping results deterministic.
#[derive(Debug, Clone)]
pub struct MemoryStore<E> {
    records: HashMap<i64, E>,
    next_id: i64,
}

impl<E: Reconciled> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by local key.
    pub fn all(&self) -> Vec<E> {
        let mut keys: Vec<i64> = self.records.keys().copied().collect();
        keys.sort_unstable();
        keys.iter().map(|k| self.records[k].clone()).collect()
    }

    fn first_matching<F>(&self, predicate: F) -> Option<E>
    where
        F: Fn(&E) -> bool,
    {
        self.records
            .values()
            .filter(|record| predicate(record))
            .min_by_key(|record| record.local_id())
            .cloned()
    }
}

impl<E: Reconciled> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Reconciled> RecordPort<E> for MemoryStore<E> {
    fn find_by_local_id(&self, id: LocalId) -> Option<E> {
        self.records.get(&id.0).cloned()
    }

    fn find_by_nightscout_id(&self, ns_id: &str) -> Option<E> {
        self.first_matching(|record| record.ids().nightscout_id.as_deref() == Some(ns_id))
    }

    fn find_by_temporary_id(&self, temporary_id: i64) -> Option<E> {
        self.first_matching(|record| record.ids().temporary_id == Some(temporary_id))
    }

    fn find_by_pump_key(&self, key: &PumpKey) -> Option<E> {
        self.first_matching(|record| record.ids().pump_key().as_ref() == Some(key))
    }

    fn find_by_timestamp(&self, probe: &E) -> Option<E> {
        self.first_matching(|record| record.matches_timestamp_probe(probe))
    }

    fn insert(&mut self, mut record: E) -> LocalId {
        let id = if record.local_id().is_set() {
            // Keep externally assigned keys, but never reissue them.
            self.next_id = self.next_id.max(record.local_id().0 + 1);
            record.local_id()
        } else {
            let id = LocalId(self.next_id);
            self.next_id += 1;
            record.core_mut().local_id = id;
            id
        };
        self.records.insert(id.0, record);
        id
    }

    fn update(&mut self, record: &E) {
        if record.local_id().is_set() {
            self.records.insert(record.local_id().0, record.clone());
        }
    }
}

impl<E: IntervalRecord> IntervalPort<E> for MemoryStore<E> {
    fn find_active_at(&self, at: Millis) -> Option<E> {
        self.records
            .values()
            .filter(|record| record.is_active_at(at))
            .max_by_key(|record| (record.timestamp(), record.local_id()))
            .cloned()
    }
}
