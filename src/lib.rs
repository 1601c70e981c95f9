//! # Loopmerge
//!
//! The reconciliation core of a closed-loop insulin-dosing application.
//!
//! Timeline records describing insulin delivery, carbohydrate intake,
//! glucose readings, and device state arrive concurrently from three
//! sources: the pump driver, a cloud diary service, and local user entry.
//! This crate decides, for every incoming record, whether it is new, a
//! duplicate of something local, or an update to something local, and how
//! interval-shaped records (temporary basal rates, extended boluses,
//! temporary targets) get truncated and split when a new interval begins.
//!
//! Storage is an external collaborator: each entity type's persistence is
//! reached through the port traits in [`store`], and every operation's reads
//! and writes are expected to execute inside one storage-level transaction
//! provided by the embedder. The core itself performs no locking and no
//! I/O beyond the ports.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod merge;
pub mod model;
pub mod ops;
pub mod result;
pub mod rounding;
pub mod store;

// Re-export main types for convenience
pub use config::{MergePolicy, Source};
pub use error::{ReconcileError, Result};
pub use identity::{resolve, Resolution};
pub use merge::Reconciler;
pub use model::{
    ExternalIds, IntervalRecord, LocalId, Millis, PumpKey, PumpType, Reconciled, RecordCore,
    Validity,
};
pub use result::TxResult;
pub use store::{IntervalPort, MemoryStore, RecordPort};
