//! Biquad spectrum matcher
//!
//! Detects the key signal's band balance and drives a cascade of peak
//! filters towards the per-band targets. Zero latency.

use super::bands::{DetectorKind, SpectrumMatchParams, NUM_BANDS};
use super::detector::{BandDetector, Detector, FrequencyDomainDetector, TimeDomainDetector};
use super::gain::BandGainStage;
use crate::dsp::math::DEFAULT_SAMPLE_RATE;
use crate::dsp::Processor;
use crate::error::{clamp_param, Result};

/// Spectrum matcher with switchable detector
#[derive(Debug)]
pub struct SpectrumMatch {
    params: SpectrumMatchParams,
    detector: Detector,
    gains: BandGainStage,
    sample_rate: f32,
}

impl SpectrumMatch {
    /// Create a matcher at the default sample rate
    pub fn new() -> Result<Self> {
        let params = SpectrumMatchParams::default();
        Ok(Self {
            detector: build_detector(DEFAULT_SAMPLE_RATE, &params)?,
            gains: BandGainStage::new(DEFAULT_SAMPLE_RATE)?,
            params,
            sample_rate: DEFAULT_SAMPLE_RATE,
        })
    }

    /// Rebuild filters and detector for `sample_rate`
    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        let sample_rate = clamp_param("sample_rate", sample_rate, 1000.0, 768_000.0)?;
        self.detector = build_detector(sample_rate, &self.params)?;
        self.gains = BandGainStage::new(sample_rate)?;
        self.sample_rate = sample_rate;
        log::debug!("spectrum match: init at {} Hz", sample_rate);
        Ok(())
    }

    /// Apply parameters; a detector change is seeded from the current levels
    pub fn set(&mut self, params: &SpectrumMatchParams) -> Result<()> {
        let mut params = *params;
        params.clamp();
        params.validate()?;

        let frame_changed =
            params.fft != self.params.fft && params.detector == DetectorKind::FrequencyDomain;
        let times_changed =
            params.attack_ms != self.params.attack_ms || params.release_ms != self.params.release_ms;
        if params.detector != self.params.detector || frame_changed {
            let levels = self.detector.raw_levels();
            let mut detector = build_detector(self.sample_rate, &params)?;
            detector.seed(&levels);
            self.detector = detector;
            log::debug!("spectrum match: detector switched to {:?}", params.detector);
        } else if times_changed {
            self.detector.set_times(params.attack_ms, params.release_ms);
        }

        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> &SpectrumMatchParams {
        &self.params
    }

    /// Detect on `key`, correct `input`
    #[inline]
    pub fn process_with_key(&mut self, input: f32, key: f32) -> f32 {
        self.detector.process(key);
        let levels = self.detector.levels();
        self.gains.update(&levels, &self.params);
        self.gains.process(input)
    }

    /// Normalized band levels for meters
    pub fn band_levels(&self) -> [f32; NUM_BANDS] {
        self.detector.levels()
    }

    /// Correction per band in dB for meters
    pub fn applied_gains_db(&self) -> [f32; NUM_BANDS] {
        self.gains.applied_gains_db()
    }
}

fn build_detector(sample_rate: f32, params: &SpectrumMatchParams) -> Result<Detector> {
    Ok(match params.detector {
        DetectorKind::TimeDomain => Detector::TimeDomain(TimeDomainDetector::new(
            sample_rate,
            params.attack_ms,
            params.release_ms,
        )?),
        DetectorKind::FrequencyDomain => Detector::FrequencyDomain(FrequencyDomainDetector::new(
            sample_rate,
            &params.fft,
            params.attack_ms,
            params.release_ms,
        )?),
    })
}

impl Processor for SpectrumMatch {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.process_with_key(input, input)
    }

    fn release(&mut self) {
        self.detector.release();
        self.gains.release();
    }
}
