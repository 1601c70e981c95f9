//! # Data Model
//!
//! Core data structures for timeline reconciliation: local keys, millisecond
//! timestamps, the monotonic validity state machine, the multi-namespace
//! external identity struct, and the traits every reconciled entity
//! implements.

use crate::config::Source;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// A timeline instant as UTC epoch milliseconds.
///
/// Using i64 to support both past and future times, and to avoid floating
/// point issues.
pub type Millis = i64;

/// Convert a UTC datetime to epoch milliseconds.
pub fn millis_from_datetime(dt: OffsetDateTime) -> Millis {
    (dt.unix_timestamp_nanos() / 1_000_000) as Millis
}

/// Convert epoch milliseconds back to a UTC datetime.
pub fn datetime_from_millis(millis: Millis) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Local primary key of a persisted record.
///
/// Assigned exactly once, by the store, at insertion. [`LocalId::UNSET`]
/// (zero) marks a record that has not been persisted yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LocalId(pub i64);

impl LocalId {
    /// The not-yet-persisted marker.
    pub const UNSET: LocalId = LocalId(0);

    /// Whether this key has been assigned by a store.
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Pump models whose records carry a composite pump identity.
///
/// Matching is by equality only: the same `pump_id` and `pump_serial` under a
/// different pump type is a distinct identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PumpType {
    Dana,
    DanaRs,
    Insight,
    Combo,
    Omnipod,
    Medtronic,
    Diaconn,
    Equil,
    Virtual,
}

impl fmt::Display for PumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The fully-populated composite pump identity.
///
/// Only ever constructed when all three fields are present; a partially
/// populated composite key is never used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PumpKey {
    pub pump_id: i64,
    pub pump_type: PumpType,
    pub pump_serial: String,
}

impl fmt::Display for PumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.pump_type, self.pump_serial, self.pump_id)
    }
}

/// External identity namespaces attached to every reconciled record.
///
/// Each field is independently optional; a record may carry any subset. Two
/// records matching on one namespace are the same logical entity even if
/// another namespace disagrees (subject to the composite-key guard rule in
/// the identity module).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    /// Canonical id assigned by the cloud diary service.
    pub nightscout_id: Option<String>,
    /// Record id assigned by a specific physical pump.
    pub pump_id: Option<i64>,
    /// Model of the pump that assigned `pump_id`.
    pub pump_type: Option<PumpType>,
    /// Serial number of the pump that assigned `pump_id`.
    pub pump_serial: Option<String>,
    /// Client-generated correlation id for records created locally before
    /// the pump confirms a definitive `pump_id`.
    pub temporary_id: Option<i64>,
    /// Pump-assigned id recorded on an interval when it is terminated; used
    /// to detect an already-processed termination.
    pub end_id: Option<i64>,
}

impl ExternalIds {
    /// The composite pump identity, if fully populated.
    pub fn pump_key(&self) -> Option<PumpKey> {
        match (&self.pump_id, &self.pump_type, &self.pump_serial) {
            (Some(id), Some(pump_type), Some(serial)) => Some(PumpKey {
                pump_id: *id,
                pump_type: *pump_type,
                pump_serial: serial.clone(),
            }),
            _ => None,
        }
    }

    /// Fill every absent field from `incoming`, never overwriting a value
    /// that is already present. Returns whether anything was written.
    pub fn backfill_from(&mut self, incoming: &ExternalIds) -> bool {
        let mut changed = false;
        if self.nightscout_id.is_none() && incoming.nightscout_id.is_some() {
            self.nightscout_id = incoming.nightscout_id.clone();
            changed = true;
        }
        if self.pump_id.is_none() && incoming.pump_id.is_some() {
            self.pump_id = incoming.pump_id;
            changed = true;
        }
        if self.pump_type.is_none() && incoming.pump_type.is_some() {
            self.pump_type = incoming.pump_type;
            changed = true;
        }
        if self.pump_serial.is_none() && incoming.pump_serial.is_some() {
            self.pump_serial = incoming.pump_serial.clone();
            changed = true;
        }
        if self.temporary_id.is_none() && incoming.temporary_id.is_some() {
            self.temporary_id = incoming.temporary_id;
            changed = true;
        }
        if self.end_id.is_none() && incoming.end_id.is_some() {
            self.end_id = incoming.end_id;
            changed = true;
        }
        changed
    }
}

/// Soft-delete state of a record.
///
/// The only transition is `Valid -> Invalidated`; nothing in this crate
/// constructs the reverse, so invalidity is monotonic by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    /// The record is in effect.
    Valid,
    /// The record has been soft-deleted.
    Invalidated {
        /// When the invalidation happened.
        at: Millis,
        /// Who asked for it.
        by: Source,
    },
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }

    /// Transition to `Invalidated`. Returns `false` (and changes nothing)
    /// when the record is already invalid, preserving the original stamp.
    pub fn invalidate(&mut self, at: Millis, by: Source) -> bool {
        match self {
            Validity::Valid => {
                *self = Validity::Invalidated { at, by };
                true
            }
            Validity::Invalidated { .. } => false,
        }
    }
}

impl Default for Validity {
    fn default() -> Self {
        Validity::Valid
    }
}

/// The shared header embedded in every reconciled entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordCore {
    /// Local primary key; [`LocalId::UNSET`] before insertion.
    pub local_id: LocalId,
    /// Instant the record's effect begins, epoch milliseconds.
    pub timestamp: Millis,
    /// Soft-delete state.
    pub validity: Validity,
    /// External identity namespaces.
    pub ids: ExternalIds,
}

impl RecordCore {
    /// Create a header for a new, valid, unpersisted record.
    pub fn new(timestamp: Millis) -> Self {
        Self {
            local_id: LocalId::UNSET,
            timestamp,
            validity: Validity::Valid,
            ids: ExternalIds::default(),
        }
    }

    /// Create a header carrying external ids.
    pub fn with_ids(timestamp: Millis, ids: ExternalIds) -> Self {
        Self {
            local_id: LocalId::UNSET,
            timestamp,
            validity: Validity::Valid,
            ids,
        }
    }
}

/// A reconciled timeline entity.
///
/// Entities embed a [`RecordCore`] and expose it through `core`/`core_mut`;
/// everything identity- and validity-shaped is provided here so per-entity
/// code is limited to payload.
pub trait Reconciled: Clone + fmt::Debug {
    /// Display name used in not-found messages.
    const ENTITY: &'static str;

    fn core(&self) -> &RecordCore;
    fn core_mut(&mut self) -> &mut RecordCore;

    /// Overwrite payload fields from `incoming`, returning whether anything
    /// actually changed. Identity, validity, timestamp, and duration are not
    /// payload; the engine applies those under their own policy clauses.
    fn merge_payload(&mut self, incoming: &Self) -> bool;

    /// Whether this record is the timestamp-dedup match for `incoming`.
    /// Default: exact timestamp equality. Entities with a subtype that
    /// participates in dedup (therapy events) narrow this further.
    fn matches_timestamp_probe(&self, incoming: &Self) -> bool {
        self.timestamp() == incoming.timestamp()
    }

    fn local_id(&self) -> LocalId {
        self.core().local_id
    }

    fn timestamp(&self) -> Millis {
        self.core().timestamp
    }

    fn ids(&self) -> &ExternalIds {
        &self.core().ids
    }

    fn is_valid(&self) -> bool {
        self.core().validity.is_valid()
    }

    /// Soft-delete this record. No-op (returning `false`) when already
    /// invalid.
    fn invalidate(&mut self, at: Millis, by: Source) -> bool {
        self.core_mut().validity.invalidate(at, by)
    }
}

/// A reconciled entity whose effect spans `[timestamp, timestamp + duration)`.
pub trait IntervalRecord: Reconciled {
    /// Elapsed milliseconds the record is in effect; 0 means instantaneous
    /// or already ended.
    fn duration(&self) -> i64;

    fn set_duration(&mut self, duration: i64);

    /// Rescale the carried quantity for a truncation to `new_duration`,
    /// using the old duration still stored on the record. Rate-shaped and
    /// bound-shaped entities keep their payload untouched (the default).
    fn rescale_quantity(&mut self, _new_duration: i64) {}

    /// Truncate the interval: rescale the quantity, then shrink the
    /// duration.
    fn truncate_to(&mut self, new_duration: i64) {
        self.rescale_quantity(new_duration);
        self.set_duration(new_duration);
    }

    /// Exclusive end of the interval.
    fn end(&self) -> Millis {
        self.timestamp() + self.duration()
    }

    /// Whether the record is in effect at `t`: valid, not yet ended, and
    /// `timestamp <= t < end`.
    fn is_active_at(&self, t: Millis) -> bool {
        self.is_valid() && self.duration() > 0 && self.timestamp() <= t && t < self.end()
    }
}
