//! Scalar helpers shared across the core

use num_traits::Float;

/// Sample rate used before `init` and after `release`
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Floor used when converting silence to decibels
pub const SILENCE_DB: f32 = -120.0;

/// Convert decibels to linear gain
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear gain to decibels, floored at [`SILENCE_DB`]
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        (20.0 * linear.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a + (b - a) * t
}

/// Map `value` from `in_min..in_max` onto `out_min..out_max`
#[inline]
pub fn remap<T: Float>(value: T, in_min: T, in_max: T, out_min: T, out_max: T) -> T {
    let t = (value - in_min) / (in_max - in_min);
    lerp(out_min, out_max, t)
}

/// One-pole smoothing coefficient for a time constant
///
/// `exp(-1 / (seconds * sample_rate))`; zero for non-positive times,
/// which makes the smoother follow its input instantly.
#[inline]
pub fn time_to_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    let samples = seconds * sample_rate;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Milliseconds to a whole number of samples (at least one)
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    ((ms * 0.001 * sample_rate).round() as usize).max(1)
}

/// Replace subnormal values with zero
#[inline]
pub fn flush_denormal(value: f32) -> f32 {
    if value.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        value
    }
}
