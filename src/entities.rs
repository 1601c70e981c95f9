//! # Entities Module
//!
//! The concrete reconciled entity types of the therapy timeline. Each one is
//! a payload struct embedding a [`RecordCore`]; everything identity-shaped
//! lives in the header and the engine never branches on the entity type.

use crate::model::{IntervalRecord, Millis, Reconciled, RecordCore};
use crate::rounding::{self, GRAM_STEP, INSULIN_STEP};
use serde::{Deserialize, Serialize};

/// A temporary basal rate, absolute or relative to the profile basal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BasalRate {
    /// Units per hour.
    Absolute(f64),
    /// Percent of the profile basal rate.
    Percent(i32),
}

/// A temporary basal rate running over an interval.
///
/// The rate is a rate, not a delivered total, so truncation leaves the
/// payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryBasal {
    pub core: RecordCore,
    pub duration: i64,
    pub rate: BasalRate,
}

impl TemporaryBasal {
    pub fn new(timestamp: Millis, duration: i64, rate: BasalRate) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration,
            rate,
        }
    }
}

impl Reconciled for TemporaryBasal {
    const ENTITY: &'static str = "TemporaryBasal";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        if self.rate != incoming.rate {
            self.rate = incoming.rate;
            return true;
        }
        false
    }
}

impl IntervalRecord for TemporaryBasal {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }
}

/// An extended bolus: a total amount of insulin delivered evenly over an
/// interval. Truncation rescales the amount proportionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedBolus {
    pub core: RecordCore,
    pub duration: i64,
    /// Total insulin units to deliver over the interval.
    pub amount: f64,
}

impl ExtendedBolus {
    pub fn new(timestamp: Millis, duration: i64, amount: f64) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration,
            amount,
        }
    }
}

impl Reconciled for ExtendedBolus {
    const ENTITY: &'static str = "ExtendedBolus";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        if self.amount != incoming.amount {
            self.amount = incoming.amount;
            return true;
        }
        false
    }
}

impl IntervalRecord for ExtendedBolus {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }

    fn rescale_quantity(&mut self, new_duration: i64) {
        self.amount =
            rounding::scale_for_truncation(self.amount, new_duration, self.duration, INSULIN_STEP);
    }
}

/// Why a temporary target was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetReason {
    Custom,
    Activity,
    EatingSoon,
    Hypoglycemia,
    Automation,
}

/// A temporary glucose target window. Bounds are targets, not delivered
/// quantities, so truncation leaves them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryTarget {
    pub core: RecordCore,
    pub duration: i64,
    pub low_mgdl: f64,
    pub high_mgdl: f64,
    pub reason: TargetReason,
}

impl TemporaryTarget {
    pub fn new(
        timestamp: Millis,
        duration: i64,
        low_mgdl: f64,
        high_mgdl: f64,
        reason: TargetReason,
    ) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration,
            low_mgdl,
            high_mgdl,
            reason,
        }
    }
}

impl Reconciled for TemporaryTarget {
    const ENTITY: &'static str = "TemporaryTarget";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.low_mgdl != incoming.low_mgdl
            || self.high_mgdl != incoming.high_mgdl
            || self.reason != incoming.reason;
        if changed {
            self.low_mgdl = incoming.low_mgdl;
            self.high_mgdl = incoming.high_mgdl;
            self.reason = incoming.reason;
        }
        changed
    }
}

impl IntervalRecord for TemporaryTarget {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }
}

/// Why the loop is not in its normal running mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfflineReason {
    PumpDisconnected,
    DeliverySuspended,
    LoopDisabled,
    Other,
}

/// A running-mode marker: the loop is offline for an interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineEvent {
    pub core: RecordCore,
    pub duration: i64,
    pub reason: OfflineReason,
}

impl OfflineEvent {
    pub fn new(timestamp: Millis, duration: i64, reason: OfflineReason) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration,
            reason,
        }
    }
}

impl Reconciled for OfflineEvent {
    const ENTITY: &'static str = "OfflineEvent";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        if self.reason != incoming.reason {
            self.reason = incoming.reason;
            return true;
        }
        false
    }
}

impl IntervalRecord for OfflineEvent {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }
}

/// A profile switch. Duration 0 means permanent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSwitch {
    pub core: RecordCore,
    pub duration: i64,
    pub profile_name: String,
    /// Percent scaling applied to the profile, 100 = unscaled.
    pub percentage: i32,
    /// Shift applied to the profile's time axis, milliseconds.
    pub timeshift: i64,
}

impl ProfileSwitch {
    pub fn new(timestamp: Millis, duration: i64, profile_name: impl Into<String>) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration,
            profile_name: profile_name.into(),
            percentage: 100,
            timeshift: 0,
        }
    }
}

impl Reconciled for ProfileSwitch {
    const ENTITY: &'static str = "ProfileSwitch";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.profile_name != incoming.profile_name
            || self.percentage != incoming.percentage
            || self.timeshift != incoming.timeshift;
        if changed {
            self.profile_name = incoming.profile_name.clone();
            self.percentage = incoming.percentage;
            self.timeshift = incoming.timeshift;
        }
        changed
    }
}

impl IntervalRecord for ProfileSwitch {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }
}

/// How a bolus was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BolusKind {
    Normal,
    /// Super micro bolus issued by the loop.
    Smb,
    /// Priming insulin, not delivered to the body.
    Priming,
}

/// A single insulin bolus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bolus {
    pub core: RecordCore,
    pub amount: f64,
    pub kind: BolusKind,
}

impl Bolus {
    pub fn new(timestamp: Millis, amount: f64, kind: BolusKind) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            amount,
            kind,
        }
    }
}

impl Reconciled for Bolus {
    const ENTITY: &'static str = "Bolus";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.amount != incoming.amount || self.kind != incoming.kind;
        if changed {
            self.amount = incoming.amount;
            self.kind = incoming.kind;
        }
        changed
    }
}

/// A carbohydrate entry with an absorption window.
///
/// Carbs carry a duration (the absorption window) and rescale their grams on
/// a cut, but they have no single-active lifecycle: overlapping entries are
/// legitimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carbs {
    pub core: RecordCore,
    /// Absorption window, milliseconds; 0 means absorbed immediately.
    pub duration: i64,
    pub grams: f64,
}

impl Carbs {
    pub fn new(timestamp: Millis, duration: i64, grams: f64) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration,
            grams,
        }
    }
}

impl Reconciled for Carbs {
    const ENTITY: &'static str = "Carbs";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        if self.grams != incoming.grams {
            self.grams = incoming.grams;
            return true;
        }
        false
    }
}

impl IntervalRecord for Carbs {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }

    fn rescale_quantity(&mut self, new_duration: i64) {
        self.grams =
            rounding::scale_for_truncation(self.grams, new_duration, self.duration, GRAM_STEP);
    }
}

/// Where a glucose reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlucoseSource {
    Sensor,
    Finger,
    Manual,
}

/// A glucose reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseValue {
    pub core: RecordCore,
    pub value_mgdl: f64,
    pub source: GlucoseSource,
}

impl GlucoseValue {
    pub fn new(timestamp: Millis, value_mgdl: f64, source: GlucoseSource) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            value_mgdl,
            source,
        }
    }
}

impl Reconciled for GlucoseValue {
    const ENTITY: &'static str = "GlucoseValue";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.value_mgdl != incoming.value_mgdl || self.source != incoming.source;
        if changed {
            self.value_mgdl = incoming.value_mgdl;
            self.source = incoming.source;
        }
        changed
    }
}

/// Kinds of therapy events recorded in the diary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TherapyEventType {
    CannulaChange,
    InsulinChange,
    SensorChange,
    PumpBatteryChange,
    FingerStickGlucose,
    Exercise,
    Note,
    Announcement,
    Question,
}

/// A diary therapy event, optionally spanning an interval (e.g. exercise).
///
/// Two therapy events at the same instant are the same record only when
/// their types also agree, so the subtype participates in timestamp dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapyEvent {
    pub core: RecordCore,
    pub duration: i64,
    pub event_type: TherapyEventType,
    pub note: Option<String>,
    pub glucose_mgdl: Option<f64>,
}

impl TherapyEvent {
    pub fn new(timestamp: Millis, event_type: TherapyEventType) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            duration: 0,
            event_type,
            note: None,
            glucose_mgdl: None,
        }
    }
}

impl Reconciled for TherapyEvent {
    const ENTITY: &'static str = "TherapyEvent";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.event_type != incoming.event_type
            || self.note != incoming.note
            || self.glucose_mgdl != incoming.glucose_mgdl;
        if changed {
            self.event_type = incoming.event_type;
            self.note = incoming.note.clone();
            self.glucose_mgdl = incoming.glucose_mgdl;
        }
        changed
    }

    fn matches_timestamp_probe(&self, incoming: &Self) -> bool {
        self.timestamp() == incoming.timestamp() && self.event_type == incoming.event_type
    }
}

impl IntervalRecord for TherapyEvent {
    fn duration(&self) -> i64 {
        self.duration
    }

    fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }
}

/// A snapshot of the bolus calculator's inputs and advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BolusCalculatorResult {
    pub core: RecordCore,
    pub glucose_mgdl: f64,
    pub carbs_grams: f64,
    pub insulin_advised: f64,
}

impl BolusCalculatorResult {
    pub fn new(
        timestamp: Millis,
        glucose_mgdl: f64,
        carbs_grams: f64,
        insulin_advised: f64,
    ) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            glucose_mgdl,
            carbs_grams,
            insulin_advised,
        }
    }
}

impl Reconciled for BolusCalculatorResult {
    const ENTITY: &'static str = "BolusCalculatorResult";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.glucose_mgdl != incoming.glucose_mgdl
            || self.carbs_grams != incoming.carbs_grams
            || self.insulin_advised != incoming.insulin_advised;
        if changed {
            self.glucose_mgdl = incoming.glucose_mgdl;
            self.carbs_grams = incoming.carbs_grams;
            self.insulin_advised = incoming.insulin_advised;
        }
        changed
    }
}

/// A daily insulin total reported by the pump. Timestamp is the start of the
/// day the total covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalDailyDose {
    pub core: RecordCore,
    pub basal_units: f64,
    pub bolus_units: f64,
    pub total_units: f64,
}

impl TotalDailyDose {
    pub fn new(timestamp: Millis, basal_units: f64, bolus_units: f64, total_units: f64) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            basal_units,
            bolus_units,
            total_units,
        }
    }
}

impl Reconciled for TotalDailyDose {
    const ENTITY: &'static str = "TotalDailyDose";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.basal_units != incoming.basal_units
            || self.bolus_units != incoming.bolus_units
            || self.total_units != incoming.total_units;
        if changed {
            self.basal_units = incoming.basal_units;
            self.bolus_units = incoming.bolus_units;
            self.total_units = incoming.total_units;
        }
        changed
    }
}

/// A food catalog entry, reconciled by its cloud diary id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub core: RecordCore,
    pub name: String,
    pub carbs_grams: f64,
}

impl Food {
    pub fn new(timestamp: Millis, name: impl Into<String>, carbs_grams: f64) -> Self {
        Self {
            core: RecordCore::new(timestamp),
            name: name.into(),
            carbs_grams,
        }
    }
}

impl Reconciled for Food {
    const ENTITY: &'static str = "Food";

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn merge_payload(&mut self, incoming: &Self) -> bool {
        let changed = self.name != incoming.name || self.carbs_grams != incoming.carbs_grams;
        if changed {
            self.name = incoming.name.clone();
            self.carbs_grams = incoming.carbs_grams;
        }
        changed
    }
}
