//! # Rounding Module
//!
//! Centralized rounding policy for proportionally recomputed quantities.
//!
//! Every quantity derived by truncating an interval goes through
//! [`scale_for_truncation`], so the whole crate shares one rounding rule:
//! half-up to the nearest multiple of the entity's unit step.

/// Unit step for carbohydrate quantities: whole grams.
pub const GRAM_STEP: f64 = 1.0;

/// Unit step for insulin quantities: hundredths of a unit.
pub const INSULIN_STEP: f64 = 0.01;

/// Round `value` to the nearest multiple of `step`, halves rounding up
/// (away from zero). A non-positive step returns the value unchanged.
pub fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

/// Rescale a quantity delivered over `total` milliseconds down to the
/// `elapsed` prefix of the interval, rounded to the entity's unit step.
///
/// Degenerate totals (zero or negative) leave the quantity unchanged rather
/// than dividing by zero; callers never truncate an interval that has no
/// duration to begin with.
pub fn scale_for_truncation(amount: f64, elapsed: i64, total: i64, step: f64) -> f64 {
    if total <= 0 {
        return amount;
    }
    round_to_step(amount * elapsed as f64 / total as f64, step)
}
