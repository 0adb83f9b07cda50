//! Signal generators and level measurements
//!
//! Test and probe helpers: synthetic signals for driving processors
//! and simple level statistics for checking what comes out.

use crate::dsp::math::{linear_to_db, SILENCE_DB};
use crate::error::Result;
use crate::spectral::{SpectrumAnalyzer, StftParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Calculate the RMS level of a slice (linear)
///
/// Returns 0.0 for an empty slice.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Calculate the RMS level of a slice in dB (floored at silence)
pub fn calculate_rms_db(samples: &[f32]) -> f32 {
    linear_to_db(calculate_rms(samples))
}

/// Largest absolute sample value (linear)
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Largest absolute sample value in dB
pub fn calculate_peak_db(samples: &[f32]) -> f32 {
    linear_to_db(calculate_peak(samples))
}

/// Gain from `input` to `output` in dB, by RMS
pub fn gain_db(input: &[f32], output: &[f32]) -> f32 {
    calculate_rms_db(output) - calculate_rms_db(input)
}

/// Unit-amplitude sine of `num_samples` samples
pub fn sine_wave(frequency: f32, sample_rate: f32, num_samples: usize) -> Vec<f32> {
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..num_samples)
        .map(|i| (angular_freq * i as f64).sin() as f32)
        .collect()
}

/// Uniform white noise in `[-amplitude, amplitude]`, reproducible per seed
pub fn white_noise(num_samples: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_samples)
        .map(|_| amplitude * rng.random_range(-1.0_f32..=1.0))
        .collect()
}

/// Unit impulse followed by silence
pub fn impulse(num_samples: usize) -> Vec<f32> {
    let mut signal = vec![0.0; num_samples];
    if let Some(first) = signal.first_mut() {
        *first = 1.0;
    }
    signal
}

/// Impulses every `period` samples
pub fn impulse_train(num_samples: usize, period: usize) -> Vec<f32> {
    let period = period.max(1);
    (0..num_samples)
        .map(|i| if i % period == 0 { 1.0 } else { 0.0 })
        .collect()
}

/// Time for a decaying response to fall 60 dB below its peak, in seconds
///
/// Uses Schroeder backward integration of the squared response. Returns
/// `None` when the response never falls that far.
pub fn estimate_rt60(response: &[f32], sample_rate: f32) -> Option<f32> {
    let mut energy: Vec<f64> = response.iter().map(|&y| (y as f64) * (y as f64)).collect();
    for i in (0..energy.len().saturating_sub(1)).rev() {
        energy[i] += energy[i + 1];
    }
    let total = *energy.first()?;
    if total <= 0.0 {
        return None;
    }
    let threshold = total * 1.0e-6;
    energy
        .iter()
        .position(|&e| e < threshold)
        .map(|i| i as f32 / sample_rate)
}

/// Frame length used by [`band_energy_db`]
const BAND_ENERGY_FRAME: usize = 4096;

/// Mean square between `low_hz` and `high_hz` in dB, averaged over frames
///
/// Welch estimate over 4096-sample Hann frames at 75% overlap. Returns
/// [`SILENCE_DB`] when the signal is shorter than one frame or silent.
pub fn band_energy_db(samples: &[f32], sample_rate: f32, low_hz: f32, high_hz: f32) -> Result<f32> {
    let mut analyzer = SpectrumAnalyzer::new();
    analyzer.init(
        sample_rate,
        &StftParams {
            frame_size: BAND_ENERGY_FRAME,
            overlap: 4,
            bypass: false,
        },
    )?;

    let mut total = 0.0_f64;
    let mut frames = 0usize;
    for (i, &x) in samples.iter().enumerate() {
        // Skip frames that still hold the zeroed ring
        if analyzer.process(x) && i + 1 >= BAND_ENERGY_FRAME {
            total += analyzer.band_mean_square(low_hz, high_hz) as f64;
            frames += 1;
        }
    }
    if frames == 0 || total <= 0.0 {
        return Ok(SILENCE_DB);
    }
    Ok(((10.0 * (total / frames as f64).log10()) as f32).max(SILENCE_DB))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sine_rms() {
        let sine = sine_wave(1000.0, 48000.0, 48000);
        assert_abs_diff_eq!(calculate_rms(&sine), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-4);
        assert_abs_diff_eq!(calculate_peak(&sine), 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(calculate_rms_db(&sine), -3.0103, epsilon = 1e-3);
    }

    #[test]
    fn test_empty_and_silent() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_peak(&[]), 0.0);
        assert!(calculate_rms_db(&[0.0; 16]) <= -120.0);
    }

    #[test]
    fn test_white_noise_is_seeded() {
        let a = white_noise(1024, 0.5, 42);
        let b = white_noise(1024, 0.5, 42);
        let c = white_noise(1024, 0.5, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|x| x.abs() <= 0.5));
        // Uniform on [-a, a]: rms a / sqrt(3)
        let rms = calculate_rms(&white_noise(96000, 0.5, 1));
        assert_abs_diff_eq!(rms, 0.5 / 3.0_f32.sqrt(), epsilon = 5e-3);
    }

    #[test]
    fn test_impulse_train() {
        let train = impulse_train(10, 4);
        assert_eq!(train, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(impulse(3), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_band_energy_of_tone() {
        let sine = sine_wave(1000.0, 48000.0, 48000);
        let inside = band_energy_db(&sine, 48000.0, 632.46, 2000.0).unwrap();
        let outside = band_energy_db(&sine, 48000.0, 4000.0, 8000.0).unwrap();
        // Unit sine: mean square 0.5
        assert_abs_diff_eq!(inside, -3.0103, epsilon = 0.2);
        assert!(outside < -60.0);
        assert_eq!(band_energy_db(&sine[..100], 48000.0, 632.46, 2000.0).unwrap(), SILENCE_DB);
    }

    #[test]
    fn test_rt60_of_exponential_decay() {
        // -60 dB after 0.5 s
        let sample_rate = 1000.0;
        let per_sample = 10.0_f32.powf(-3.0 / 500.0);
        let response: Vec<f32> = (0..2000).map(|n| per_sample.powi(n)).collect();
        let rt60 = estimate_rt60(&response, sample_rate).unwrap();
        assert_abs_diff_eq!(rt60, 0.5, epsilon = 0.01);
        assert_eq!(estimate_rt60(&[0.0; 8], sample_rate), None);
    }
}
