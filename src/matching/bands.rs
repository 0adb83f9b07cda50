//! Band table and parameters
//!
//! Six bands split 20 Hz to 20 kHz evenly in log-frequency, each one a
//! factor of sqrt(10) wide. Centers are the geometric means of the edges.

use crate::error::{FxError, Result};
use crate::spectral::StftParams;
use serde::{Deserialize, Serialize};

pub const NUM_BANDS: usize = 6;

/// Band edges in Hz, `20 * 1000^(i / 6)`
pub const BAND_EDGES_HZ: [f32; NUM_BANDS + 1] =
    [20.0, 63.245_55, 200.0, 632.455_5, 2000.0, 6324.555, 20000.0];

/// Geometric band centers in Hz
pub const BAND_CENTERS_HZ: [f32; NUM_BANDS] =
    [35.565_59, 112.468_27, 355.655_9, 1124.682_7, 3556.559, 11246.827];

/// Q of a band-pass spanning one band: `sqrt(r) / (r - 1)`, `r = sqrt(10)`
pub const BAND_Q: f32 = 0.822_4;

/// Per-band correction scale; outer bands are corrected less
pub const ATTENUATION: [f32; NUM_BANDS] = [0.5, 0.8, 1.0, 1.0, 0.8, 0.5];

/// Limit of the correction applied to any band
pub const MAX_CORRECTION_DB: f32 = 24.0;

/// Below this mean level all bands report unity
pub const LEVEL_EPSILON: f32 = 1.0e-6;

/// Which detector feeds the gain stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Band-pass biquads and per-sample followers
    #[default]
    TimeDomain,
    /// Analyzer bins grouped into bands, followers at the hop rate
    FrequencyDomain,
}

/// One band's target and mute state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BandParams {
    /// Target level relative to the band mean, in dB (-24 to 24)
    pub target_db: f32,
    /// Silence the band instead of correcting it
    pub mute: bool,
}

/// Spectrum matcher parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumMatchParams {
    pub bands: [BandParams; NUM_BANDS],
    /// Correction amount (0 to 1)
    pub amount: f32,
    /// Base attack in ms, scaled per band (0 to 1000)
    pub attack_ms: f32,
    /// Base release in ms, scaled per band (0 to 5000)
    pub release_ms: f32,
    pub detector: DetectorKind,
    /// Frame setup of the frequency-domain paths
    pub fft: StftParams,
}

impl Default for SpectrumMatchParams {
    fn default() -> Self {
        Self {
            bands: [BandParams::default(); NUM_BANDS],
            amount: 1.0,
            attack_ms: 10.0,
            release_ms: 50.0,
            detector: DetectorKind::TimeDomain,
            fft: StftParams::default(),
        }
    }
}

impl SpectrumMatchParams {
    pub fn validate(&self) -> Result<()> {
        for band in &self.bands {
            if !(-MAX_CORRECTION_DB..=MAX_CORRECTION_DB).contains(&band.target_db) {
                return Err(FxError::invalid_parameter(
                    "target_db",
                    band.target_db,
                    -MAX_CORRECTION_DB,
                    MAX_CORRECTION_DB,
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.amount) {
            return Err(FxError::invalid_parameter("amount", self.amount, 0.0, 1.0));
        }
        if !(0.0..=1000.0).contains(&self.attack_ms) {
            return Err(FxError::invalid_parameter("attack_ms", self.attack_ms, 0.0, 1000.0));
        }
        if !(0.0..=5000.0).contains(&self.release_ms) {
            return Err(FxError::invalid_parameter("release_ms", self.release_ms, 0.0, 5000.0));
        }
        self.fft.validate()
    }

    pub fn clamp(&mut self) {
        for band in self.bands.iter_mut() {
            band.target_db = band.target_db.clamp(-MAX_CORRECTION_DB, MAX_CORRECTION_DB);
        }
        self.amount = self.amount.clamp(0.0, 1.0);
        self.attack_ms = self.attack_ms.clamp(0.0, 1000.0);
        self.release_ms = self.release_ms.clamp(0.0, 5000.0);
        self.fft.clamp();
    }
}

/// Attack and release of band `band` in seconds; lower bands are slower
pub fn band_times(band: usize, attack_ms: f32, release_ms: f32) -> (f32, f32) {
    let scale = (NUM_BANDS - band) as f32 * 0.001;
    (attack_ms * scale, release_ms * scale)
}

/// Divide by the mean so the levels average to one
///
/// Silence (mean below [`LEVEL_EPSILON`]) maps to all ones.
pub fn normalize(levels: &[f32; NUM_BANDS]) -> [f32; NUM_BANDS] {
    let mean = levels.iter().sum::<f32>() / NUM_BANDS as f32;
    if mean.is_nan() || mean <= LEVEL_EPSILON {
        return [1.0; NUM_BANDS];
    }
    levels.map(|level| level / mean)
}

/// Correction for one band in dB
pub fn correction_db(target_db: f32, detected_db: f32, band: usize, amount: f32) -> f32 {
    ((target_db - detected_db) * ATTENUATION[band] * amount)
        .clamp(-MAX_CORRECTION_DB, MAX_CORRECTION_DB)
}

/// Band centers usable at `sample_rate` (kept below Nyquist)
pub fn centers_for(sample_rate: f32) -> [f32; NUM_BANDS] {
    let limit = 0.45 * sample_rate;
    BAND_CENTERS_HZ.map(|center| center.min(limit))
}

/// Edges of the band-stop that silences a muted band at `sample_rate`
///
/// The upper edge is held below Nyquist and the lower edge at most an
/// octave under it.
pub fn mute_edges(band: usize, sample_rate: f32) -> (f32, f32) {
    let high = BAND_EDGES_HZ[band + 1].min(0.45 * sample_rate);
    let low = BAND_EDGES_HZ[band].min(0.5 * high);
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_band_table_is_logarithmic() {
        let ratio = 10.0_f32.sqrt();
        for i in 0..NUM_BANDS {
            assert_abs_diff_eq!(
                BAND_EDGES_HZ[i + 1] / BAND_EDGES_HZ[i],
                ratio,
                epsilon = 1e-4
            );
            let center = (BAND_EDGES_HZ[i] * BAND_EDGES_HZ[i + 1]).sqrt();
            assert_abs_diff_eq!(BAND_CENTERS_HZ[i] / center, 1.0, epsilon = 1e-5);
        }
        let q = ratio.sqrt() / (ratio - 1.0);
        assert_abs_diff_eq!(BAND_Q, q, epsilon = 1e-4);
    }

    #[test]
    fn test_band_times_scale_with_index() {
        let (attack, release) = band_times(0, 10.0, 50.0);
        assert_abs_diff_eq!(attack, 0.06, epsilon = 1e-7);
        assert_abs_diff_eq!(release, 0.3, epsilon = 1e-6);
        let (attack, release) = band_times(5, 10.0, 50.0);
        assert_abs_diff_eq!(attack, 0.01, epsilon = 1e-7);
        assert_abs_diff_eq!(release, 0.05, epsilon = 1e-7);
    }

    #[test]
    fn test_normalize() {
        // Mean 4
        let levels = normalize(&[1.0, 2.0, 3.0, 4.0, 5.0, 9.0]);
        for (level, expected) in levels.iter().zip([0.25, 0.5, 0.75, 1.0, 1.25, 2.25]) {
            assert_abs_diff_eq!(*level, expected, epsilon = 1e-6);
        }
        // Scale does not matter
        assert_eq!(normalize(&[0.5; NUM_BANDS]), [1.0; NUM_BANDS]);
        assert_eq!(normalize(&[0.0; NUM_BANDS]), [1.0; NUM_BANDS]);
        assert_eq!(normalize(&[f32::NAN; NUM_BANDS]), [1.0; NUM_BANDS]);
    }

    #[test]
    fn test_correction_db() {
        assert_abs_diff_eq!(correction_db(0.0, -6.0, 2, 1.0), 6.0);
        assert_abs_diff_eq!(correction_db(0.0, -6.0, 0, 1.0), 3.0);
        assert_abs_diff_eq!(correction_db(0.0, -6.0, 2, 0.5), 3.0);
        assert_eq!(correction_db(24.0, -120.0, 3, 1.0), MAX_CORRECTION_DB);
    }

    #[test]
    fn test_params_validation() {
        let mut params = SpectrumMatchParams::default();
        assert!(params.validate().is_ok());
        params.bands[3].target_db = 40.0;
        params.amount = 2.0;
        assert!(params.validate().is_err());
        params.clamp();
        assert!(params.validate().is_ok());
        assert_eq!(params.bands[3].target_db, MAX_CORRECTION_DB);
    }
}
