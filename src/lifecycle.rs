//! # Interval Lifecycle Module
//!
//! Running-interval semantics for entities where at most one record may be
//! active at any instant (temporary basal, extended bolus, temporary
//! target, offline event). An incoming interval-start event closes whatever
//! is active at its start, recomputing delivered quantities proportionally,
//! and then opens itself as the successor. A pure cancellation (duration 0)
//! closes without opening anything.

use crate::identity::{self, Resolution};
use crate::merge::Reconciler;
use crate::model::IntervalRecord;
use crate::result::TxResult;
use crate::store::IntervalPort;
use tracing::{debug, trace};

impl Reconciler {
    /// Apply a batch of interval-start events in order.
    pub fn apply_interval_batch<E, P>(&self, port: &mut P, batch: Vec<E>) -> TxResult<E>
    where
        E: IntervalRecord,
        P: IntervalPort<E> + ?Sized,
    {
        let mut result = TxResult::new();
        for incoming in batch {
            result.absorb(self.begin_interval(port, incoming));
        }
        result
    }

    /// Apply one interval-start event.
    ///
    /// Identity resolution runs first: an event that matches a stored
    /// record degrades to a plain field-policy merge (which is what makes
    /// replaying an already-applied batch a no-op). Only a genuinely new
    /// event touches the lifecycle: close the record active at its start,
    /// then insert the event as the successor unless it is a pure
    /// cancellation.
    pub fn begin_interval<E, P>(&self, port: &mut P, incoming: E) -> TxResult<E>
    where
        E: IntervalRecord,
        P: IntervalPort<E> + ?Sized,
    {
        let mut result = TxResult::new();

        match identity::resolve(port, &incoming, self.source()) {
            Resolution::Skip => return result,
            Resolution::Existing(mut current) => {
                let fired = self.apply_interval_field_policy(&mut current, &incoming);
                Self::commit(port, current, fired, &mut result);
                return result;
            }
            Resolution::New => {}
        }

        let start = incoming.timestamp();
        let terminating_id = incoming.ids().pump_id;

        if let Some(mut active) = port.find_active_at(start) {
            if terminating_id.is_some() && active.ids().end_id == terminating_id {
                // This termination was already processed; replaying it must
                // not shrink the record a second time.
                trace!(
                    entity = E::ENTITY,
                    local_id = %active.local_id(),
                    "termination already recorded, skipping"
                );
                return result;
            }

            // Clamp to 1 ms so a successor starting exactly at the active
            // record's own start never produces a zero or negative duration.
            let elapsed = (start - active.timestamp()).max(1);
            active.truncate_to(elapsed);
            if terminating_id.is_some() {
                active.core_mut().ids.end_id = terminating_id;
            }
            port.update(&active);
            debug!(
                entity = E::ENTITY,
                local_id = %active.local_id(),
                closed_at = start,
                new_duration = elapsed,
                "closed active interval"
            );
            result.ended.push(active);
        }

        // Duration 0 is a pure cancellation: close only, open nothing.
        if incoming.duration() > 0 {
            self.insert_new(port, incoming, &mut result);
        }

        result
    }
}
