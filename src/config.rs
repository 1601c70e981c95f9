//! # Configuration Module
//!
//! Policy knobs for the reconciliation engine: where a batch comes from and
//! which side of the sync is authoritative for payload fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of an incoming batch or of a single-record operation.
///
/// The source selects the primary external-id namespace used during identity
/// resolution: `Nightscout` batches are keyed by their cloud diary id, `Pump`
/// batches by the client-generated temporary id they are confirming. `User`
/// actions carry no external id and resolve by pump key or timestamp only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Records produced by the pump driver.
    Pump,
    /// Records delivered by the cloud diary service.
    Nightscout,
    /// Records entered locally by the user.
    User,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Pump => write!(f, "pump"),
            Source::Nightscout => write!(f, "nightscout"),
            Source::User => write!(f, "user"),
        }
    }
}

/// Which side of the sync owns payload fields during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergePolicy {
    /// The remote service is authoritative: payload fields, timestamp
    /// corrections, and strictly-shorter durations from the incoming record
    /// are applied to the matched local record.
    FollowRemote,
    /// The local device is authoritative: a merge may only backfill missing
    /// external ids and apply invalidation. Payload and duration from an
    /// external source are never applied.
    #[default]
    DeviceAuthoritative,
}

impl MergePolicy {
    /// Whether payload fields and timestamp corrections may be applied.
    pub fn applies_payload(&self) -> bool {
        matches!(self, MergePolicy::FollowRemote)
    }

    /// Whether a strictly-shorter incoming duration may be applied.
    pub fn applies_duration(&self) -> bool {
        matches!(self, MergePolicy::FollowRemote)
    }
}
