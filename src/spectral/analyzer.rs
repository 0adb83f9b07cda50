//! Forward-only spectrum analyzer
//!
//! Shares the STFT's input ring and windowing but never resynthesizes.
//! A fresh power spectrum is available every `hop` samples.

use super::fft::{FftBackend, RustFftBackend};
use super::fifo::FrameRing;
use super::stft::StftParams;
use super::window::fill_hann;
use crate::dsp::math::DEFAULT_SAMPLE_RATE;
use crate::error::{clamp_param, Result};
use rustfft::num_complex::Complex32;
use std::ops::Range;

/// Mean square of the signal content in `bins`, from a one-sided power
/// spectrum of a windowed frame (Parseval)
///
/// `window_energy` is the sum of the squared window.
pub fn band_mean_square(
    power: &[f32],
    bins: Range<usize>,
    frame_size: usize,
    window_energy: f32,
) -> f32 {
    let end = bins.end.min(power.len());
    let start = bins.start.min(end);
    let energy: f32 = power[start..end].iter().sum();
    2.0 * energy / (frame_size as f32 * window_energy)
}

/// Windowed FFT power spectrum, refreshed every hop
pub struct SpectrumAnalyzer {
    frame_size: usize,
    hop: usize,
    mask: usize,
    pos: usize,
    hop_counter: usize,
    sample_rate: f32,
    input: FrameRing,
    window: Vec<f32>,
    window_energy: f32,
    frame: Vec<f32>,
    spectrum: Vec<Complex32>,
    /// `|X_k|^2`, DC to Nyquist
    power: Vec<f32>,
    fft: Box<dyn FftBackend>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_size", &self.frame_size)
            .field("hop", &self.hop)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let params = StftParams::default();
        let mut analyzer = Self {
            frame_size: 0,
            hop: 0,
            mask: 0,
            pos: 0,
            hop_counter: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            input: FrameRing::default(),
            window: Vec::new(),
            window_energy: 0.0,
            frame: Vec::new(),
            spectrum: Vec::new(),
            power: Vec::new(),
            fft: Box::new(RustFftBackend::new(params.frame_size)),
        };
        analyzer.allocate(&params);
        analyzer
    }

    /// Allocate for `params`; `bypass` is ignored
    pub fn init(&mut self, sample_rate: f32, params: &StftParams) -> Result<()> {
        params.validate()?;
        self.sample_rate = clamp_param("sample_rate", sample_rate, 1000.0, 768_000.0)?;
        if self.fft.len() != params.frame_size {
            self.fft = Box::new(RustFftBackend::new(params.frame_size));
        }
        self.allocate(params);
        Ok(())
    }

    fn allocate(&mut self, params: &StftParams) {
        let n = params.frame_size;
        self.frame_size = n;
        self.hop = params.hop();
        self.mask = n - 1;
        self.pos = 0;
        self.hop_counter = 0;
        self.input.resize(n);
        self.window.resize(n, 0.0);
        fill_hann(&mut self.window);
        self.window_energy = self.window.iter().map(|w| w * w).sum();
        self.frame.resize(n, 0.0);
        self.spectrum.resize(n, Complex32::new(0.0, 0.0));
        self.power.clear();
        self.power.resize(n / 2 + 1, 0.0);
    }

    /// Feed one sample; returns true when a new spectrum was computed
    #[inline]
    pub fn process(&mut self, input: f32) -> bool {
        self.input.write(self.pos, input);
        self.pos = (self.pos + 1) & self.mask;
        self.hop_counter += 1;
        if self.hop_counter < self.hop {
            return false;
        }
        self.hop_counter = 0;
        self.analyze();
        true
    }

    fn analyze(&mut self) {
        self.input.copy_from(self.pos, &mut self.frame);
        for ((bin, x), w) in self.spectrum.iter_mut().zip(&self.frame).zip(&self.window) {
            *bin = Complex32::new(x * w, 0.0);
        }
        self.fft.forward(&mut self.spectrum);
        for (p, bin) in self.power.iter_mut().zip(&self.spectrum) {
            *p = bin.norm_sqr();
        }
    }

    /// One-sided power spectrum of the latest frame
    pub fn power(&self) -> &[f32] {
        &self.power
    }

    /// Magnitude of bin `k`
    pub fn magnitude(&self, k: usize) -> f32 {
        self.power.get(k).map_or(0.0, |p| p.sqrt())
    }

    /// Mean square of the content between `low_hz` and `high_hz`
    pub fn band_mean_square(&self, low_hz: f32, high_hz: f32) -> f32 {
        band_mean_square(
            &self.power,
            self.bin_range(low_hz, high_hz),
            self.frame_size,
            self.window_energy,
        )
    }

    /// Bins whose center lies in `[low_hz, high_hz)`
    pub fn bin_range(&self, low_hz: f32, high_hz: f32) -> Range<usize> {
        bin_range(low_hz, high_hz, self.sample_rate, self.frame_size)
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn window_energy(&self) -> f32 {
        self.window_energy
    }

    /// Rate at which new spectra appear
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate / self.hop as f32
    }

    /// Zero the ring and the last spectrum
    pub fn release(&mut self) {
        self.input.clear();
        self.power.fill(0.0);
        self.pos = 0;
        self.hop_counter = 0;
    }
}

/// Bins whose center lies in `[low_hz, high_hz)`, clipped to Nyquist
pub fn bin_range(low_hz: f32, high_hz: f32, sample_rate: f32, frame_size: usize) -> Range<usize> {
    let bin_width = sample_rate / frame_size as f32;
    let nyquist_bin = frame_size / 2 + 1;
    let start = ((low_hz / bin_width).ceil().max(0.0) as usize).min(nyquist_bin);
    let end = ((high_hz / bin_width).ceil().max(0.0) as usize).clamp(start, nyquist_bin);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sine_wave;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_spectrum_every_hop() {
        let mut analyzer = SpectrumAnalyzer::new();
        analyzer.init(48000.0, &StftParams::default()).unwrap();
        let ready: Vec<bool> = (0..1024).map(|_| analyzer.process(0.0)).collect();
        assert_eq!(ready.iter().filter(|r| **r).count(), 4);
        assert!(ready[255] && ready[511]);
        assert_abs_diff_eq!(analyzer.frame_rate(), 187.5);
    }

    #[test]
    fn test_sine_mean_square() {
        let mut analyzer = SpectrumAnalyzer::new();
        analyzer.init(48000.0, &StftParams::default()).unwrap();
        for x in sine_wave(1000.0, 48000.0, 4096) {
            analyzer.process(0.5 * x);
        }
        // 0.5 amplitude sine: mean square 0.125
        assert_abs_diff_eq!(analyzer.band_mean_square(500.0, 2000.0), 0.125, epsilon = 1e-3);
        assert!(analyzer.band_mean_square(4000.0, 20000.0) < 1e-5);

        let peak_bin = (1000.0_f32 / (48000.0 / 1024.0)).round() as usize;
        assert!(analyzer.magnitude(peak_bin) > analyzer.magnitude(peak_bin + 10));
    }

    #[test]
    fn test_bin_range_clipping() {
        assert_eq!(bin_range(0.0, 100.0, 1024.0, 1024), 0..100);
        assert_eq!(bin_range(100.5, 200.0, 1024.0, 1024), 101..200);
        assert_eq!(bin_range(400.0, 10_000.0, 1024.0, 1024), 400..513);
        assert_eq!(bin_range(9000.0, 10_000.0, 1024.0, 1024), 513..513);
    }
}
