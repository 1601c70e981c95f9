//! # Transaction Result Module
//!
//! The uniform report every reconciliation operation returns.

use serde::{Deserialize, Serialize};

/// Outcome of one reconciliation operation: named, possibly-overlapping,
/// order-irrelevant lists of the records the operation touched. A single
/// record may appear in more than one bucket (an id backfill and an
/// invalidation can both fire for the same merge).
///
/// Replaying a batch that has already been fully applied yields an empty
/// result, which is what the idempotency tests assert on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxResult<E> {
    /// Brand-new records persisted by this operation.
    pub inserted: Vec<E>,
    /// Records whose payload (or corrected timestamp) changed.
    pub updated: Vec<E>,
    /// Records that received an external-id backfill or overwrite.
    pub updated_external_id: Vec<E>,
    /// Interval records whose duration was shortened by the merge policy.
    pub updated_duration: Vec<E>,
    /// Records transitioned to invalid.
    pub invalidated: Vec<E>,
    /// Interval records closed early because a successor began.
    pub ended: Vec<E>,
}

impl<E> TxResult<E> {
    pub fn new() -> Self {
        Self {
            inserted: Vec::new(),
            updated: Vec::new(),
            updated_external_id: Vec::new(),
            updated_duration: Vec::new(),
            invalidated: Vec::new(),
            ended: Vec::new(),
        }
    }

    /// Whether the operation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.updated.is_empty()
            && self.updated_external_id.is_empty()
            && self.updated_duration.is_empty()
            && self.invalidated.is_empty()
            && self.ended.is_empty()
    }

    /// Total bucket entries, counting overlaps once per bucket.
    pub fn len(&self) -> usize {
        self.inserted.len()
            + self.updated.len()
            + self.updated_external_id.len()
            + self.updated_duration.len()
            + self.invalidated.len()
            + self.ended.len()
    }

    /// Fold another result into this one, bucket by bucket. Used to
    /// assemble a batch result from per-record results.
    pub fn absorb(&mut self, other: TxResult<E>) {
        self.inserted.extend(other.inserted);
        self.updated.extend(other.updated);
        self.updated_external_id.extend(other.updated_external_id);
        self.updated_duration.extend(other.updated_duration);
        self.invalidated.extend(other.invalidated);
        self.ended.extend(other.ended);
    }
}

impl<E> Default for TxResult<E> {
    fn default() -> Self {
        Self::new()
    }
}
