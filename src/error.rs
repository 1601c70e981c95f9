//! # Error Module
//!
//! The crate's closed error set. Reconciliation itself is a pure-data
//! transformation with no failure mode: missing matches and unmet policy
//! conditions degrade to no-ops. The only fault is a single-record operation
//! addressing a local key that does not exist.

use crate::model::LocalId;
use thiserror::Error;

/// Errors surfaced by the reconciliation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A single-record operation addressed a local key that is not in the
    /// store. Raised before any write, so the store is left unchanged.
    #[error("there is no such {entity} with the specified ID")]
    NotFound {
        /// Display name of the entity type, e.g. `"TemporaryBasal"`.
        entity: &'static str,
        /// The local key that was looked up.
        id: LocalId,
    },
}

/// Result alias used by the fallible single-record operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
