//! Band level detectors
//!
//! Both detectors estimate each band's mean square in the same units
//! (Parseval-equivalent power of the band content) and smooth it with
//! per-band branching followers. Levels are reported as RMS.

use super::bands::{band_times, centers_for, normalize, BAND_EDGES_HZ, BAND_Q, NUM_BANDS};
use crate::dsp::{BiquadFilter, BranchingFollower, EnvelopeFollower, Processor};
use crate::error::Result;
use crate::spectral::{band_mean_square, bin_range, SpectrumAnalyzer, StftParams};
use std::ops::Range;

/// Ratio of a band's width to the equivalent noise bandwidth of a
/// second-order band-pass spanning it
pub const NOISE_BANDWIDTH_CORRECTION: f32 = 2.0 / std::f32::consts::PI;

/// Common surface of the detectors
pub trait BandDetector: Send {
    /// Feed one key sample
    fn process(&mut self, key: f32);

    /// Smoothed band RMS levels, unnormalized
    fn raw_levels(&self) -> [f32; NUM_BANDS];

    /// Jump to the given raw levels
    fn seed(&mut self, levels: &[f32; NUM_BANDS]);

    /// Retune follower times from base milliseconds
    fn set_times(&mut self, attack_ms: f32, release_ms: f32);

    /// Clear all state
    fn release(&mut self);

    /// Levels divided by their mean
    fn levels(&self) -> [f32; NUM_BANDS] {
        normalize(&self.raw_levels())
    }
}

/// Per-band mean-square smoothing shared by every detection path
#[derive(Debug, Clone, Default)]
pub struct BandSmoother {
    followers: [BranchingFollower; NUM_BANDS],
}

impl BandSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// `rate` is how often `push` is called per second
    pub fn set_times(&mut self, attack_ms: f32, release_ms: f32, rate: f32) {
        for (band, follower) in self.followers.iter_mut().enumerate() {
            let (attack, release) = band_times(band, attack_ms, release_ms);
            follower.set_times(attack, release, rate);
        }
    }

    #[inline]
    pub fn push(&mut self, mean_squares: &[f32; NUM_BANDS]) {
        for (follower, ms) in self.followers.iter_mut().zip(mean_squares) {
            follower.process(*ms);
        }
    }

    pub fn raw_levels(&self) -> [f32; NUM_BANDS] {
        let mut levels = [0.0; NUM_BANDS];
        for (level, follower) in levels.iter_mut().zip(&self.followers) {
            *level = follower.level().sqrt();
        }
        levels
    }

    pub fn seed(&mut self, levels: &[f32; NUM_BANDS]) {
        for (follower, level) in self.followers.iter_mut().zip(levels) {
            follower.reset_to(level * level);
        }
    }

    pub fn release(&mut self) {
        for follower in self.followers.iter_mut() {
            follower.release();
        }
    }
}

/// Band-pass biquad, square and follower per band
#[derive(Debug, Clone)]
pub struct TimeDomainDetector {
    filters: [BiquadFilter; NUM_BANDS],
    smoother: BandSmoother,
    sample_rate: f32,
}

impl TimeDomainDetector {
    pub fn new(sample_rate: f32, attack_ms: f32, release_ms: f32) -> Result<Self> {
        let mut filters: [BiquadFilter; NUM_BANDS] = Default::default();
        for (filter, center) in filters.iter_mut().zip(centers_for(sample_rate)) {
            filter.init(sample_rate)?;
            filter.set_band_pass_peak_gain(center, BAND_Q)?;
        }
        let mut smoother = BandSmoother::new();
        smoother.set_times(attack_ms, release_ms, sample_rate);
        Ok(Self {
            filters,
            smoother,
            sample_rate,
        })
    }
}

impl BandDetector for TimeDomainDetector {
    #[inline]
    fn process(&mut self, key: f32) {
        let mut mean_squares = [0.0; NUM_BANDS];
        for (ms, filter) in mean_squares.iter_mut().zip(self.filters.iter_mut()) {
            let y = filter.process(key);
            *ms = y * y * NOISE_BANDWIDTH_CORRECTION;
        }
        self.smoother.push(&mean_squares);
    }

    fn raw_levels(&self) -> [f32; NUM_BANDS] {
        self.smoother.raw_levels()
    }

    fn seed(&mut self, levels: &[f32; NUM_BANDS]) {
        self.smoother.seed(levels);
    }

    fn set_times(&mut self, attack_ms: f32, release_ms: f32) {
        self.smoother.set_times(attack_ms, release_ms, self.sample_rate);
    }

    fn release(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset();
        }
        self.smoother.release();
    }
}

/// Bin ranges of each band for a frame
pub fn band_bin_ranges(sample_rate: f32, frame_size: usize) -> [Range<usize>; NUM_BANDS] {
    std::array::from_fn(|band| {
        bin_range(
            BAND_EDGES_HZ[band],
            BAND_EDGES_HZ[band + 1],
            sample_rate,
            frame_size,
        )
    })
}

/// Analyzer bins grouped into bands, smoothed at the hop rate
#[derive(Debug)]
pub struct FrequencyDomainDetector {
    analyzer: SpectrumAnalyzer,
    ranges: [Range<usize>; NUM_BANDS],
    smoother: BandSmoother,
}

impl FrequencyDomainDetector {
    pub fn new(
        sample_rate: f32,
        params: &StftParams,
        attack_ms: f32,
        release_ms: f32,
    ) -> Result<Self> {
        let mut analyzer = SpectrumAnalyzer::new();
        analyzer.init(sample_rate, params)?;
        let mut smoother = BandSmoother::new();
        smoother.set_times(attack_ms, release_ms, analyzer.frame_rate());
        Ok(Self {
            ranges: band_bin_ranges(sample_rate, analyzer.frame_size()),
            analyzer,
            smoother,
        })
    }
}

impl BandDetector for FrequencyDomainDetector {
    #[inline]
    fn process(&mut self, key: f32) {
        if !self.analyzer.process(key) {
            return;
        }
        let power = self.analyzer.power();
        let frame_size = self.analyzer.frame_size();
        let window_energy = self.analyzer.window_energy();
        let mut mean_squares = [0.0; NUM_BANDS];
        for (ms, range) in mean_squares.iter_mut().zip(&self.ranges) {
            *ms = band_mean_square(power, range.clone(), frame_size, window_energy);
        }
        self.smoother.push(&mean_squares);
    }

    fn raw_levels(&self) -> [f32; NUM_BANDS] {
        self.smoother.raw_levels()
    }

    fn seed(&mut self, levels: &[f32; NUM_BANDS]) {
        self.smoother.seed(levels);
    }

    fn set_times(&mut self, attack_ms: f32, release_ms: f32) {
        let rate = self.analyzer.frame_rate();
        self.smoother.set_times(attack_ms, release_ms, rate);
    }

    fn release(&mut self) {
        self.analyzer.release();
        self.smoother.release();
    }
}

/// Either detector, switchable at runtime
#[derive(Debug)]
pub enum Detector {
    TimeDomain(TimeDomainDetector),
    FrequencyDomain(FrequencyDomainDetector),
}

impl Detector {
    fn inner(&self) -> &dyn BandDetector {
        match self {
            Detector::TimeDomain(detector) => detector,
            Detector::FrequencyDomain(detector) => detector,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BandDetector {
        match self {
            Detector::TimeDomain(detector) => detector,
            Detector::FrequencyDomain(detector) => detector,
        }
    }
}

impl BandDetector for Detector {
    #[inline]
    fn process(&mut self, key: f32) {
        match self {
            Detector::TimeDomain(detector) => detector.process(key),
            Detector::FrequencyDomain(detector) => detector.process(key),
        }
    }

    fn raw_levels(&self) -> [f32; NUM_BANDS] {
        self.inner().raw_levels()
    }

    fn seed(&mut self, levels: &[f32; NUM_BANDS]) {
        self.inner_mut().seed(levels)
    }

    fn set_times(&mut self, attack_ms: f32, release_ms: f32) {
        self.inner_mut().set_times(attack_ms, release_ms)
    }

    fn release(&mut self) {
        self.inner_mut().release()
    }
}
