//! # Merge Engine Module
//!
//! Applies incoming records to the store: identity resolution, then the
//! field-level update policy. The policy clauses are independent and any
//! subset may fire for one record; each fired clause lands the record in its
//! own result bucket.

use crate::config::{MergePolicy, Source};
use crate::identity::{self, Resolution};
use crate::model::{IntervalRecord, Reconciled, Validity};
use crate::result::TxResult;
use crate::store::RecordPort;
use tracing::debug;

/// Which policy clauses fired during one merge. Drives both the write-back
/// decision and the result buckets the record is reported under.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PolicyFired {
    pub external_id: bool,
    pub invalidated: bool,
    pub updated: bool,
    pub duration: bool,
}

impl PolicyFired {
    pub fn any(&self) -> bool {
        self.external_id || self.invalidated || self.updated || self.duration
    }
}

/// The apply-one-record engine, parameterized by batch provenance and merge
/// authority. One instance per sync direction; the engine itself is
/// stateless between calls.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    source: Source,
    policy: MergePolicy,
}

impl Reconciler {
    pub fn new(source: Source, policy: MergePolicy) -> Self {
        Self { source, policy }
    }

    /// Engine for a cloud diary batch in client-follows-server mode.
    pub fn nightscout() -> Self {
        Self::new(Source::Nightscout, MergePolicy::FollowRemote)
    }

    /// Engine for a pump-driver batch; the device is authoritative.
    pub fn pump() -> Self {
        Self::new(Source::Pump, MergePolicy::DeviceAuthoritative)
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Apply a batch of point records, folding per-record outcomes into one
    /// result.
    pub fn apply_batch<E, P>(&self, port: &mut P, batch: Vec<E>) -> TxResult<E>
    where
        E: Reconciled,
        P: RecordPort<E> + ?Sized,
    {
        let mut result = TxResult::new();
        for incoming in batch {
            result.absorb(self.apply_one(port, incoming));
        }
        result
    }

    /// Apply one point record: resolve identity, then run the field policy
    /// or insert verbatim.
    pub fn apply_one<E, P>(&self, port: &mut P, incoming: E) -> TxResult<E>
    where
        E: Reconciled,
        P: RecordPort<E> + ?Sized,
    {
        let mut result = TxResult::new();
        match identity::resolve(port, &incoming, self.source) {
            Resolution::Skip => {}
            Resolution::New => self.insert_new(port, incoming, &mut result),
            Resolution::Existing(mut current) => {
                let fired = self.apply_field_policy(&mut current, &incoming);
                Self::commit(port, current, fired, &mut result);
            }
        }
        result
    }

    /// The field policy for a matched record. Every clause is checked;
    /// none is exclusive of the others.
    pub(crate) fn apply_field_policy<E: Reconciled>(
        &self,
        current: &mut E,
        incoming: &E,
    ) -> PolicyFired {
        let mut fired = PolicyFired::default();

        // External-id backfill: absent fields only, never an overwrite.
        if current.core_mut().ids.backfill_from(incoming.ids()) {
            fired.external_id = true;
        }

        // Invalidation is monotonic; the reverse transition never happens.
        if current.is_valid() && !incoming.is_valid() {
            if let Validity::Invalidated { at, by } = incoming.core().validity {
                current.invalidate(at, by);
            }
            fired.invalidated = true;
        }

        if self.policy.applies_payload() {
            // A remote-led merge may correct the timestamp of a record that
            // was matched through an id namespace.
            if current.timestamp() != incoming.timestamp() {
                current.core_mut().timestamp = incoming.timestamp();
                fired.updated = true;
            }
            if current.merge_payload(incoming) {
                fired.updated = true;
            }
        }

        fired
    }

    /// Field policy for interval entities: the point clauses plus the
    /// shrink-only duration correction.
    pub(crate) fn apply_interval_field_policy<E: IntervalRecord>(
        &self,
        current: &mut E,
        incoming: &E,
    ) -> PolicyFired {
        let mut fired = self.apply_field_policy(current, incoming);

        if self.policy.applies_duration() && incoming.duration() < current.duration() {
            current.set_duration(incoming.duration());
            fired.duration = true;
        }

        fired
    }

    /// Write back a merged record and report it under every fired bucket.
    pub(crate) fn commit<E, P>(
        port: &mut P,
        current: E,
        fired: PolicyFired,
        result: &mut TxResult<E>,
    ) where
        E: Reconciled,
        P: RecordPort<E> + ?Sized,
    {
        if !fired.any() {
            return;
        }
        port.update(&current);
        debug!(
            entity = E::ENTITY,
            local_id = %current.local_id(),
            external_id = fired.external_id,
            invalidated = fired.invalidated,
            updated = fired.updated,
            duration = fired.duration,
            "merged into existing record"
        );
        if fired.external_id {
            result.updated_external_id.push(current.clone());
        }
        if fired.invalidated {
            result.invalidated.push(current.clone());
        }
        if fired.updated {
            result.updated.push(current.clone());
        }
        if fired.duration {
            result.updated_duration.push(current.clone());
        }
    }

    /// Persist an unmatched incoming record verbatim and report the insert.
    pub(crate) fn insert_new<E, P>(&self, port: &mut P, incoming: E, result: &mut TxResult<E>)
    where
        E: Reconciled,
        P: RecordPort<E> + ?Sized,
    {
        let mut record = incoming;
        let id = port.insert(record.clone());
        record.core_mut().local_id = id;
        debug!(entity = E::ENTITY, local_id = %id, source = %self.source, "inserted new record");
        result.inserted.push(record);
    }
}
