//! Chebyshev type II band-stop
//!
//! Flat passband, equiripple stopband held at least `attenuation_db` down
//! everywhere between the two edges. The analog low-pass prototype is
//! mapped to a band-stop around the prewarped edges, taken through the
//! bilinear transform and split into biquad sections of unity DC gain.

use super::biquad::{BiquadCoefficients, BiquadFilter};
use super::math::SILENCE_DB;
use super::processor::Processor;
use crate::error::{FxError, Result};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Biquad sections per band-stop (also the prototype order)
pub const BAND_STOP_SECTIONS: usize = 6;
/// Stopband depth used when muting
pub const BAND_STOP_ATTENUATION_DB: f32 = 50.0;
/// Highest accepted edge as a fraction of the sample rate
pub const MAX_EDGE_RATIO: f32 = 0.49;

/// Design the sections of a band-stop between `low_hz` and `high_hz`
pub fn design_band_stop(
    sample_rate: f32,
    low_hz: f32,
    high_hz: f32,
    attenuation_db: f32,
) -> Result<[BiquadCoefficients; BAND_STOP_SECTIONS]> {
    let max_edge = sample_rate * MAX_EDGE_RATIO;
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(FxError::invalid_parameter("sample_rate", sample_rate, 1000.0, 768_000.0));
    }
    if !(low_hz.is_finite() && low_hz > 0.0 && low_hz < high_hz) {
        return Err(FxError::invalid_parameter("low_hz", low_hz, 0.0, high_hz));
    }
    if !(high_hz.is_finite() && high_hz <= max_edge) {
        return Err(FxError::invalid_parameter("high_hz", high_hz, low_hz, max_edge));
    }
    if !(1.0..=120.0).contains(&attenuation_db) {
        return Err(FxError::invalid_parameter("attenuation_db", attenuation_db, 1.0, 120.0));
    }

    let fs = sample_rate as f64;
    let order = BAND_STOP_SECTIONS as f64;
    let epsilon = 1.0 / (10.0_f64.powf(attenuation_db as f64 / 10.0) - 1.0).sqrt();
    let mu = (1.0 / epsilon).asinh() / order;

    let prewarp = |f: f32| 2.0 * fs * (PI * f as f64 / fs).tan();
    let (w1, w2) = (prewarp(low_hz), prewarp(high_hz));
    let width = w2 - w1;
    let center_sq = w1 * w2;
    let bilinear = |s: Complex64| (2.0 * fs + s) / (2.0 * fs - s);

    let mut sections = [BiquadCoefficients::IDENTITY; BAND_STOP_SECTIONS];
    // One prototype pole/zero per conjugate pair; each maps to two sections
    for k in 0..BAND_STOP_SECTIONS / 2 {
        let theta = PI * (2 * k + 1) as f64 / (2.0 * order);
        let pole = Complex64::new(-mu.sinh() * theta.sin(), mu.cosh() * theta.cos()).inv();
        let zero = Complex64::new(0.0, 1.0 / theta.cos());

        let poles = band_stop_roots(pole, width, center_sq);
        let zeros = band_stop_roots(zero, width, center_sq);
        for (i, (p, z)) in poles.into_iter().zip(zeros).enumerate() {
            sections[2 * k + i] = section(bilinear(p), bilinear(z));
        }
    }

    if let Some(unstable) = sections.iter().find(|c| !c.is_stable()) {
        return Err(FxError::UnstableCoefficient {
            stage: "band-stop".to_string(),
            value: unstable.a2,
        });
    }
    Ok(sections)
}

/// Roots of `s^2 - (width / r) s + center^2`, lower frequency first
fn band_stop_roots(r: Complex64, width: f64, center_sq: f64) -> [Complex64; 2] {
    let b = Complex64::new(width, 0.0) / r;
    let d = (b * b - 4.0 * center_sq).sqrt();
    let mut roots = [(b + d) * 0.5, (b - d) * 0.5];
    roots.sort_by(|x, y| x.im.abs().total_cmp(&y.im.abs()));
    roots
}

/// Biquad from a digital pole and zero (each with its conjugate)
fn section(pole: Complex64, zero: Complex64) -> BiquadCoefficients {
    let (b1, b2) = (-2.0 * zero.re, zero.norm_sqr());
    let (a1, a2) = (-2.0 * pole.re, pole.norm_sqr());
    let gain = (1.0 + a1 + a2) / (1.0 + b1 + b2);
    BiquadCoefficients {
        b0: gain as f32,
        b1: (gain * b1) as f32,
        b2: (gain * b2) as f32,
        a1: a1 as f32,
        a2: a2 as f32,
    }
}

/// Cascade of band-stop sections
#[derive(Debug, Clone, Default)]
pub struct BandStop {
    sections: [BiquadFilter; BAND_STOP_SECTIONS],
}

impl BandStop {
    /// Create a pass-through band-stop
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        for section in self.sections.iter_mut() {
            section.init(sample_rate)?;
        }
        Ok(())
    }

    /// Redesign for new edges; on error the previous design stays
    pub fn set(&mut self, low_hz: f32, high_hz: f32, attenuation_db: f32) -> Result<()> {
        let sample_rate = self.sections[0].sample_rate();
        let coeffs = design_band_stop(sample_rate, low_hz, high_hz, attenuation_db)?;
        for (section, c) in self.sections.iter_mut().zip(coeffs) {
            section.set_coefficients(c);
        }
        log::debug!(
            "band-stop: {:.1}..{:.1} Hz, {} dB at {} Hz",
            low_hz,
            high_hz,
            attenuation_db,
            sample_rate
        );
        Ok(())
    }

    /// Combined magnitude response in dB
    pub fn magnitude_db_at(&self, frequency: f32) -> f32 {
        self.sections
            .iter()
            .map(|section| section.magnitude_db_at(frequency))
            .sum::<f32>()
            .max(SILENCE_DB)
    }

    /// Clear the history, keeping the design
    pub fn reset(&mut self) {
        for section in self.sections.iter_mut() {
            section.reset();
        }
    }
}

impl Processor for BandStop {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.sections.iter_mut().fold(input, |x, section| section.process(x))
    }

    fn release(&mut self) {
        self.reset();
    }
}
