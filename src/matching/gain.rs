//! Banded gain stage
//!
//! One peak biquad per band at the band center. Coefficients are only
//! redesigned when a band's correction moves by more than
//! [`GAIN_UPDATE_THRESHOLD_DB`]. A muted band additionally runs through a
//! band-stop spanning its edges, designed once at construction.

use super::bands::{
    centers_for, correction_db, mute_edges, SpectrumMatchParams, BAND_Q, NUM_BANDS,
};
use crate::dsp::math::linear_to_db;
use crate::dsp::{
    BandStop, BiquadCoefficients, BiquadFilter, FilterKind, Processor, BAND_STOP_ATTENUATION_DB,
};
use crate::error::Result;

/// Smallest correction change that triggers a coefficient update
pub const GAIN_UPDATE_THRESHOLD_DB: f32 = 0.01;

/// Cascade of six peak filters, plus a band-stop per muted band
#[derive(Debug, Clone)]
pub struct BandGainStage {
    filters: [BiquadFilter; NUM_BANDS],
    stops: [BandStop; NUM_BANDS],
    centers: [f32; NUM_BANDS],
    applied_db: [f32; NUM_BANDS],
    muted: [bool; NUM_BANDS],
    sample_rate: f32,
}

impl BandGainStage {
    pub fn new(sample_rate: f32) -> Result<Self> {
        let mut filters: [BiquadFilter; NUM_BANDS] = Default::default();
        let centers = centers_for(sample_rate);
        for (filter, center) in filters.iter_mut().zip(centers) {
            filter.init(sample_rate)?;
            filter.set_peak(center, BAND_Q, 0.0)?;
        }
        let mut stops: [BandStop; NUM_BANDS] = Default::default();
        for (band, stop) in stops.iter_mut().enumerate() {
            let (low, high) = mute_edges(band, sample_rate);
            stop.init(sample_rate)?;
            stop.set(low, high, BAND_STOP_ATTENUATION_DB)?;
        }
        Ok(Self {
            filters,
            stops,
            centers,
            applied_db: [0.0; NUM_BANDS],
            muted: [false; NUM_BANDS],
            sample_rate,
        })
    }

    /// Retarget from normalized detector levels
    #[inline]
    pub fn update(&mut self, levels: &[f32; NUM_BANDS], params: &SpectrumMatchParams) {
        for band in 0..NUM_BANDS {
            let settings = &params.bands[band];
            if settings.mute {
                if !self.muted[band] {
                    self.muted[band] = true;
                    self.stops[band].reset();
                }
                continue;
            }

            let gain_db = correction_db(
                settings.target_db,
                linear_to_db(levels[band]),
                band,
                params.amount,
            );
            let moved = (gain_db - self.applied_db[band]).abs() > GAIN_UPDATE_THRESHOLD_DB;
            if self.muted[band] || moved {
                self.muted[band] = false;
                self.applied_db[band] = gain_db;
                self.design(band, gain_db);
            }
        }
    }

    fn design(&mut self, band: usize, gain_db: f32) {
        let center = self.centers[band];
        let coeffs =
            BiquadCoefficients::design(FilterKind::Peak, self.sample_rate, center, BAND_Q, gain_db);
        self.filters[band].set_coefficients(coeffs);
    }

    /// Correction currently applied per band in dB (muted bands hold
    /// their last correction)
    pub fn applied_gains_db(&self) -> [f32; NUM_BANDS] {
        self.applied_db
    }

    pub fn is_muted(&self, band: usize) -> bool {
        self.muted.get(band).copied().unwrap_or(false)
    }

    /// Combined magnitude response in dB, band-stops included
    pub fn magnitude_db_at(&self, frequency: f32) -> f32 {
        (0..NUM_BANDS)
            .map(|band| {
                let peak = self.filters[band].magnitude_db_at(frequency);
                if self.muted[band] {
                    peak + self.stops[band].magnitude_db_at(frequency)
                } else {
                    peak
                }
            })
            .sum()
    }

    /// Clear filter history; corrections return to flat
    pub fn reset(&mut self) {
        for band in 0..NUM_BANDS {
            self.filters[band].reset();
            self.stops[band].reset();
            self.applied_db[band] = 0.0;
            self.muted[band] = false;
            self.design(band, 0.0);
        }
    }
}

impl Processor for BandGainStage {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut x = input;
        for band in 0..NUM_BANDS {
            x = self.filters[band].process(x);
            if self.muted[band] {
                x = self.stops[band].process(x);
            }
        }
        x
    }

    fn release(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{band_energy_db, white_noise};
    use crate::matching::BAND_CENTERS_HZ as BAND_CENTERS;
    use approx::assert_abs_diff_eq;

    const SR: f32 = 48000.0;

    #[test]
    fn test_flat_levels_leave_signal_untouched() {
        let mut stage = BandGainStage::new(SR).unwrap();
        stage.update(&[1.0; NUM_BANDS], &SpectrumMatchParams::default());
        assert_eq!(stage.applied_gains_db(), [0.0; NUM_BANDS]);
        for f in [50.0, 1000.0, 15000.0] {
            let total: f32 = stage.filters.iter().map(|filter| filter.magnitude_db_at(f)).sum();
            assert_abs_diff_eq!(total, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_quiet_band_is_boosted() {
        let mut stage = BandGainStage::new(SR).unwrap();
        let mut levels = [1.2; NUM_BANDS];
        levels[2] = 0.5;
        stage.update(&levels, &SpectrumMatchParams::default());

        let applied = stage.applied_gains_db();
        assert_abs_diff_eq!(applied[2], -linear_to_db(0.5), epsilon = 1e-4);
        assert!(applied[0] < 0.0);
        assert_abs_diff_eq!(
            stage.filters[2].magnitude_db_at(BAND_CENTERS[2]),
            applied[2],
            epsilon = 0.01
        );
    }

    #[test]
    fn test_small_changes_do_not_redesign() {
        let mut stage = BandGainStage::new(SR).unwrap();
        let params = SpectrumMatchParams::default();
        let mut levels = [1.0; NUM_BANDS];
        levels[3] = 0.9;
        stage.update(&levels, &params);
        let designed = stage.filters[3].coefficients();

        // 0.001 dB away
        levels[3] = 0.9 * 1.000_115;
        stage.update(&levels, &params);
        assert_eq!(stage.filters[3].coefficients(), designed);

        levels[3] = 0.8;
        stage.update(&levels, &params);
        assert_ne!(stage.filters[3].coefficients(), designed);
    }

    #[test]
    fn test_mute_stops_the_whole_band() {
        let mut stage = BandGainStage::new(SR).unwrap();
        let mut params = SpectrumMatchParams::default();
        params.bands[3].mute = true;
        stage.update(&[1.0; NUM_BANDS], &params);
        assert!(stage.is_muted(3));

        let (low, high) = mute_edges(3, SR);
        for i in 0..=20 {
            let f = low * (high / low).powf(i as f32 / 20.0);
            let db = stage.magnitude_db_at(f);
            assert!(db < -45.0, "{} Hz at {} dB", f, db);
        }
        // Neighbouring band centers pass
        assert!(stage.magnitude_db_at(BAND_CENTERS[2]).abs() < 0.5);
        assert!(stage.magnitude_db_at(BAND_CENTERS[4]).abs() < 0.5);

        params.bands[3].mute = false;
        stage.update(&[1.0; NUM_BANDS], &params);
        assert!(!stage.is_muted(3));
        assert_abs_diff_eq!(stage.magnitude_db_at(BAND_CENTERS[3]), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_muted_noise_band_is_silenced() {
        let mut stage = BandGainStage::new(SR).unwrap();
        let mut params = SpectrumMatchParams {
            amount: 0.0,
            ..Default::default()
        };
        params.bands[3].mute = true;
        stage.update(&[1.0; NUM_BANDS], &params);

        let (low, high) = mute_edges(3, SR);
        let input = white_noise(SR as usize * 2, 0.5, 9);
        let mut output = input.clone();
        stage.process_block(&mut output);
        let drop = band_energy_db(&output[SR as usize..], SR, low, high).unwrap()
            - band_energy_db(&input[SR as usize..], SR, low, high).unwrap();
        assert!(drop < -40.0, "muted band down {} dB", drop);
    }
}
