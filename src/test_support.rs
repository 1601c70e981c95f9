use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use loopmerge_rs::entities::{BasalRate, GlucoseSource, GlucoseValue, TemporaryBasal};
use loopmerge_rs::{ExternalIds, Millis, PumpType};

#[allow(dead_code)]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A glucose reading carrying a cloud diary id, the shape of a Nightscout
/// batch entry.
#[allow(dead_code)]
pub fn ns_reading(timestamp: Millis, value: f64, ns_id: &str) -> GlucoseValue {
    let mut record = GlucoseValue::new(timestamp, value, GlucoseSource::Sensor);
    record.core.ids.nightscout_id = Some(ns_id.to_string());
    record
}

/// A temporary basal carrying a full composite pump identity, the shape of
/// a pump-driver batch entry.
#[allow(dead_code)]
pub fn pump_tbr(timestamp: Millis, duration: i64, pump_id: i64) -> TemporaryBasal {
    let mut record = TemporaryBasal::new(timestamp, duration, BasalRate::Percent(110));
    record.core.ids = ExternalIds {
        pump_id: Some(pump_id),
        pump_type: Some(PumpType::Dana),
        pump_serial: Some("SN-TEST".to_string()),
        ..Default::default()
    };
    record
}

/// Generate a randomized glucose batch: five-minute cadence with jittered
/// values, every record tagged with a unique diary id.
#[allow(dead_code)]
pub fn generate_glucose_batch(count: u32, seed: u64) -> Vec<GlucoseValue> {
    let mut rng = seeded_rng(seed);
    let mut batch = Vec::with_capacity(count as usize);
    for i in 0..count {
        let timestamp = 1_000 + i as i64 * 300_000;
        let value = 70.0 + rng.random_range(0..120) as f64;
        batch.push(ns_reading(timestamp, value, &format!("ns-gv-{:06}", i)));
    }
    batch
}

/// Generate a randomized chain of pump temporary basals: back-to-back
/// intervals with random lengths, each carrying a fresh pump id. Every
/// interval starts strictly inside its predecessor, so applying the chain
/// exercises the close-and-open path on every record after the first.
#[allow(dead_code)]
pub fn generate_tbr_chain(count: u32, seed: u64) -> Vec<TemporaryBasal> {
    let mut rng = seeded_rng(seed ^ 0x7b);
    let mut batch = Vec::with_capacity(count as usize);
    let mut start: Millis = 1_000;
    for i in 0..count {
        let duration = rng.random_range(10..120) as i64 * 60_000;
        batch.push(pump_tbr(start, duration, 100 + i as i64));
        start += rng.random_range(1..duration / 60_000).max(1) * 60_000;
    }
    batch
}
