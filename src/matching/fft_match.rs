//! STFT spectrum matcher
//!
//! Detection runs on the STFT's own analysis frame (or on a key analyzer
//! for side-chaining). Band corrections become per-bin gains,
//! interpolated in dB over log-frequency between band centers. Muted
//! bands scale their bins by the magnitude of the same band-stop the
//! biquad matcher uses. Latency is one frame.

use super::bands::{
    centers_for, correction_db, mute_edges, normalize, SpectrumMatchParams, NUM_BANDS,
};
use super::detector::{band_bin_ranges, BandSmoother};
use super::gain::GAIN_UPDATE_THRESHOLD_DB;
use crate::dsp::math::{db_to_linear, linear_to_db, DEFAULT_SAMPLE_RATE};
use crate::dsp::{BandStop, Processor, BAND_STOP_ATTENUATION_DB};
use crate::error::{clamp_param, Result};
use crate::spectral::{
    band_mean_square, window, Complex32, SpectralProcessor, SpectrumAnalyzer, Stft,
};
use std::ops::Range;

/// Where a bin sits between two band centers
#[derive(Debug, Clone, Copy, PartialEq)]
struct BinWeight {
    lower: usize,
    upper: usize,
    /// Position between the centers in log-frequency, 0 at `lower`
    t: f32,
}

fn bin_weight(frequency: f32, centers: &[f32; NUM_BANDS]) -> BinWeight {
    if frequency <= centers[0] {
        return BinWeight { lower: 0, upper: 0, t: 0.0 };
    }
    for i in 0..NUM_BANDS - 1 {
        if frequency < centers[i + 1] {
            let t = (frequency / centers[i]).ln() / (centers[i + 1] / centers[i]).ln();
            return BinWeight { lower: i, upper: i + 1, t };
        }
    }
    let last = NUM_BANDS - 1;
    BinWeight { lower: last, upper: last, t: 0.0 }
}

/// Linear band-stop magnitude of every band at each bin frequency
fn mute_responses(sample_rate: f32, frame_size: usize) -> Result<Vec<[f32; NUM_BANDS]>> {
    let bin_width = sample_rate / frame_size as f32;
    let mut responses = vec![[1.0; NUM_BANDS]; frame_size / 2 + 1];
    for band in 0..NUM_BANDS {
        let (low, high) = mute_edges(band, sample_rate);
        let mut stop = BandStop::new();
        stop.init(sample_rate)?;
        stop.set(low, high, BAND_STOP_ATTENUATION_DB)?;
        for (k, response) in responses.iter_mut().enumerate() {
            response[band] = db_to_linear(stop.magnitude_db_at(k as f32 * bin_width));
        }
    }
    Ok(responses)
}

/// Per-frame detection and per-bin gain synthesis
#[derive(Debug, Default)]
struct MatchStage {
    params: SpectrumMatchParams,
    ranges: [Range<usize>; NUM_BANDS],
    smoother: BandSmoother,
    weights: Vec<BinWeight>,
    mute_response: Vec<[f32; NUM_BANDS]>,
    bin_gains: Vec<f32>,
    power: Vec<f32>,
    applied_db: [f32; NUM_BANDS],
    muted: [bool; NUM_BANDS],
    frame_size: usize,
    window_energy: f32,
    /// Detection is fed from a key analyzer instead of the frame
    keyed: bool,
}

impl MatchStage {
    fn allocate(
        &mut self,
        sample_rate: f32,
        params: &SpectrumMatchParams,
        frame_rate: f32,
    ) -> Result<()> {
        let n = params.fft.frame_size;
        let centers = centers_for(sample_rate);
        let bin_width = sample_rate / n as f32;

        self.params = *params;
        self.frame_size = n;
        self.window_energy = window::hann(n).iter().map(|w| w * w).sum();
        self.ranges = band_bin_ranges(sample_rate, n);
        self.weights = (0..=n / 2)
            .map(|k| bin_weight(k as f32 * bin_width, &centers))
            .collect();
        self.mute_response = mute_responses(sample_rate, n)?;
        self.bin_gains.clear();
        self.bin_gains.resize(n / 2 + 1, 1.0);
        self.power.clear();
        self.power.resize(n / 2 + 1, 0.0);
        self.applied_db = [0.0; NUM_BANDS];
        self.muted = [false; NUM_BANDS];
        self.smoother = BandSmoother::new();
        self.smoother
            .set_times(params.attack_ms, params.release_ms, frame_rate);
        Ok(())
    }

    fn detect(&mut self, power: &[f32]) {
        let mut mean_squares = [0.0; NUM_BANDS];
        for (ms, range) in mean_squares.iter_mut().zip(&self.ranges) {
            *ms = band_mean_square(power, range.clone(), self.frame_size, self.window_energy);
        }
        self.smoother.push(&mean_squares);
        self.update_gains();
    }

    fn update_gains(&mut self) {
        let levels = normalize(&self.smoother.raw_levels());
        let mut changed = false;
        for band in 0..NUM_BANDS {
            let settings = &self.params.bands[band];
            if settings.mute != self.muted[band] {
                self.muted[band] = settings.mute;
                changed = true;
            }
            if settings.mute {
                continue;
            }
            let gain_db = correction_db(
                settings.target_db,
                linear_to_db(levels[band]),
                band,
                self.params.amount,
            );
            if (gain_db - self.applied_db[band]).abs() > GAIN_UPDATE_THRESHOLD_DB {
                self.applied_db[band] = gain_db;
                changed = true;
            }
        }
        if changed {
            self.synthesize_bin_gains();
        }
    }

    fn synthesize_bin_gains(&mut self) {
        let bins = self
            .bin_gains
            .iter_mut()
            .zip(&self.weights)
            .zip(&self.mute_response);
        for ((gain, weight), response) in bins {
            let lower = self.applied_db[weight.lower];
            let upper = self.applied_db[weight.upper];
            let stop: f32 = (0..NUM_BANDS)
                .filter(|&band| self.muted[band])
                .map(|band| response[band])
                .product();
            *gain = db_to_linear(lower + (upper - lower) * weight.t) * stop;
        }
    }
}

impl SpectralProcessor for MatchStage {
    fn process_spectrum(&mut self, bins: &mut [Complex32]) {
        if !self.keyed {
            let mut power = std::mem::take(&mut self.power);
            for (p, bin) in power.iter_mut().zip(bins.iter()) {
                *p = bin.norm_sqr();
            }
            self.detect(&power);
            self.power = power;
        }
        for (bin, gain) in bins.iter_mut().zip(&self.bin_gains) {
            let (magnitude, phase) = bin.to_polar();
            *bin = Complex32::from_polar(magnitude * gain, phase);
        }
    }
}

/// Spectrum matcher running inside an STFT
#[derive(Debug)]
pub struct SpectrumMatchFft {
    stft: Stft,
    stage: MatchStage,
    key_analyzer: SpectrumAnalyzer,
    sample_rate: f32,
}

impl SpectrumMatchFft {
    pub fn new() -> Result<Self> {
        let mut matcher = Self {
            stft: Stft::new(),
            stage: MatchStage::default(),
            key_analyzer: SpectrumAnalyzer::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        };
        matcher.init(DEFAULT_SAMPLE_RATE)?;
        Ok(matcher)
    }

    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        let sample_rate = clamp_param("sample_rate", sample_rate, 1000.0, 768_000.0)?;
        let params = self.stage.params;
        self.sample_rate = sample_rate;
        self.rebuild(&params)
    }

    fn rebuild(&mut self, params: &SpectrumMatchParams) -> Result<()> {
        self.stft.init(self.sample_rate, &params.fft)?;
        self.key_analyzer.init(self.sample_rate, &params.fft)?;
        let frame_rate = self.key_analyzer.frame_rate();
        self.stage.allocate(self.sample_rate, params, frame_rate)?;
        log::debug!(
            "spectrum match fft: frame {} hop {} at {} Hz",
            params.fft.frame_size,
            self.stft.hop(),
            self.sample_rate
        );
        Ok(())
    }

    /// Apply parameters; a frame change reallocates and restarts detection
    pub fn set(&mut self, params: &SpectrumMatchParams) -> Result<()> {
        let mut params = *params;
        params.clamp();
        params.validate()?;

        let current = self.stage.params;
        let frame_changed = params.fft.frame_size != current.fft.frame_size
            || params.fft.overlap != current.fft.overlap;
        if frame_changed {
            return self.rebuild(&params);
        }
        self.stft.set_bypass(params.fft.bypass);
        if params.attack_ms != current.attack_ms || params.release_ms != current.release_ms {
            let rate = self.key_analyzer.frame_rate();
            self.stage.smoother.set_times(params.attack_ms, params.release_ms, rate);
        }
        self.stage.params = params;
        Ok(())
    }

    pub fn params(&self) -> &SpectrumMatchParams {
        &self.stage.params
    }

    /// Detect on `key`, correct `input`
    #[inline]
    pub fn process_with_key(&mut self, input: f32, key: f32) -> f32 {
        if self.key_analyzer.process(key) {
            self.stage.detect(self.key_analyzer.power());
        }
        self.stage.keyed = true;
        self.stft.process_with(input, &mut self.stage)
    }

    pub fn band_levels(&self) -> [f32; NUM_BANDS] {
        normalize(&self.stage.smoother.raw_levels())
    }

    pub fn applied_gains_db(&self) -> [f32; NUM_BANDS] {
        self.stage.applied_db
    }

    /// Current per-bin gains, DC to Nyquist
    pub fn bin_gains(&self) -> &[f32] {
        &self.stage.bin_gains
    }
}

impl Processor for SpectrumMatchFft {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.stage.keyed = false;
        self.stft.process_with(input, &mut self.stage)
    }

    fn release(&mut self) {
        self.stft.release();
        self.key_analyzer.release();
        self.stage.smoother.release();
        self.stage.applied_db = [0.0; NUM_BANDS];
        self.stage.muted = [false; NUM_BANDS];
        self.stage.bin_gains.fill(1.0);
    }

    fn latency_samples(&self) -> usize {
        self.stft.latency_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{band_energy_db, calculate_rms, sine_wave, white_noise};
    use crate::matching::{BAND_CENTERS_HZ, BAND_EDGES_HZ};
    use approx::assert_abs_diff_eq;

    fn matcher() -> SpectrumMatchFft {
        let mut matcher = SpectrumMatchFft::new().unwrap();
        matcher.init(48000.0).unwrap();
        matcher
    }

    #[test]
    fn test_latency_is_one_frame() {
        let matcher = matcher();
        assert_eq!(matcher.latency_samples(), 1024);
    }

    #[test]
    fn test_tone_raises_only_its_band() {
        let mut matcher = matcher();
        let mut tone = sine_wave(BAND_CENTERS_HZ[3], 48000.0, 48000);
        matcher.process_block(&mut tone);
        let levels = matcher.band_levels();
        for band in (0..NUM_BANDS).filter(|&band| band != 3) {
            assert!(levels[band] < 1.5, "band {} at {}", band, levels[band]);
            assert!(levels[3] > 2.0 * levels[band], "{:?}", levels);
        }
    }

    #[test]
    fn test_zero_amount_is_a_pure_delay() {
        let mut matcher = matcher();
        matcher
            .set(&SpectrumMatchParams {
                amount: 0.0,
                ..Default::default()
            })
            .unwrap();
        let input = white_noise(8192, 0.5, 6);
        let mut output = input.clone();
        matcher.process_block(&mut output);
        for (y, x) in output[2048..].iter().zip(&input[1024..]) {
            assert_abs_diff_eq!(y, x, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_loud_band_is_cut() {
        let mut matcher = matcher();
        let mut tone = sine_wave(1000.0, 48000.0, 24000);
        matcher.process_block(&mut tone);
        assert!(matcher.applied_gains_db()[3] < -6.0);
    }

    #[test]
    fn test_muted_band_is_silenced() {
        const SR: f32 = 48000.0;
        let mut matcher = matcher();
        let mut params = SpectrumMatchParams {
            amount: 0.0,
            ..Default::default()
        };
        params.bands[3].mute = true;
        matcher.set(&params).unwrap();
        let latency = matcher.latency_samples();

        let input = white_noise(SR as usize * 2, 0.5, 23);
        let mut output = input.clone();
        matcher.process_block(&mut output);

        // Compare the settled second, aligned for latency
        let settled = SR as usize;
        let output = &output[settled + latency..];
        let input = &input[settled..input.len() - latency];
        let energy = |samples: &[f32], low: f32, high: f32| {
            band_energy_db(samples, SR, low, high).unwrap()
        };

        let (low, high) = mute_edges(3, SR);
        let drop = energy(output, low, high) - energy(input, low, high);
        assert!(drop < -40.0, "muted band down {} dB", drop);

        let (low, high) = (BAND_EDGES_HZ[1], BAND_EDGES_HZ[2]);
        let kept = energy(output, low, high) - energy(input, low, high);
        assert!(kept.abs() < 1.0, "band 1 moved {} dB", kept);
    }

    #[test]
    fn test_muted_tone_is_silenced() {
        let mut matcher = matcher();
        let mut params = SpectrumMatchParams {
            amount: 0.0,
            ..Default::default()
        };
        params.bands[3].mute = true;
        matcher.set(&params).unwrap();

        let mut tone = sine_wave(1124.68, 48000.0, 24000);
        matcher.process_block(&mut tone);
        assert!(calculate_rms(&tone[12000..]) < 1e-3);
    }

    #[test]
    fn test_mute_response_matches_band_stop() {
        let mut matcher = matcher();
        let mut params = SpectrumMatchParams {
            amount: 0.0,
            ..Default::default()
        };
        params.bands[3].mute = true;
        matcher.set(&params).unwrap();
        let mut silence = vec![0.0; 2048];
        matcher.process_block(&mut silence);

        // 1125 Hz and 93.75 Hz at 46.875 Hz per bin
        let gains = matcher.bin_gains();
        assert!(linear_to_db(gains[24]) < -45.0);
        assert_abs_diff_eq!(gains[2], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_bin_weights_interpolate_between_centers() {
        let centers = centers_for(48000.0);
        let at_center = bin_weight(centers[2], &centers);
        assert_eq!((at_center.lower, at_center.upper), (2, 3));
        assert_abs_diff_eq!(at_center.t, 0.0, epsilon = 1e-6);

        let midway = bin_weight((centers[2] * centers[3]).sqrt(), &centers);
        assert_abs_diff_eq!(midway.t, 0.5, epsilon = 1e-4);

        assert_eq!((bin_weight(5.0, &centers).lower, bin_weight(5.0, &centers).t), (0, 0.0));
        assert_eq!(bin_weight(22000.0, &centers).lower, NUM_BANDS - 1);
    }

    #[test]
    fn test_side_chain_uses_key() {
        let mut matcher = matcher();
        let key = sine_wave(100.0, 48000.0, 24000);
        for x in &key {
            matcher.process_with_key(0.0, *x);
        }
        let levels = matcher.band_levels();
        assert!(levels[1] > levels[3]);
    }
}
