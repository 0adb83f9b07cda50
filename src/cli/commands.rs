//! CLI Command Implementations
//!
//! Each command builds its component from the effective config, renders a
//! synthetic signal and returns the measurements as JSON.

use std::path::Path;

use anyhow::Context;
use log::info;
use serde_json::{json, Value};

use crate::analysis::{
    calculate_peak, calculate_rms, estimate_rt60, gain_db, impulse, sine_wave, white_noise,
};
use crate::config::FxConfig;
use crate::dsp::{
    BiquadFilter, BranchingFollower, Clipper, EnvelopeFollower, HoldFollower, PeakDetector,
    Processor, RmsFollower, TransientShaper,
};
use crate::matching::{SpectrumMatch, SpectrumMatchFft, BAND_CENTERS_HZ};
use crate::reverb::TankReverb;
use crate::spectral::Stft;

/// Seed for the white noise probes
const NOISE_SEED: u64 = 0x5eed;

/// Load the config file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<FxConfig> {
    let Some(path) = path else {
        return Ok(FxConfig::default());
    };
    info!("Loading config: {}", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    FxConfig::from_json_str(&content)
        .with_context(|| format!("invalid config {}", path.display()))
}

fn num_samples(seconds: f32, sample_rate: f32) -> usize {
    (seconds.max(0.0) * sample_rate) as usize
}

/// Design the configured biquad and measure it at each probe frequency.
pub fn filter(config: &FxConfig, probes: &[f32]) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    let mut filter = BiquadFilter::with_topology(config.biquad.topology);
    filter.init(sample_rate)?;
    filter.set(&config.biquad)?;
    info!(
        "Filter: {:?} at {} Hz, Q {}",
        config.biquad.kind, config.biquad.frequency, config.biquad.q
    );

    let coeffs = filter.coefficients();
    let mut response = Vec::with_capacity(probes.len());
    for &frequency in probes {
        let input = sine_wave(frequency, sample_rate, num_samples(0.5, sample_rate));
        let mut output = input.clone();
        filter.reset();
        filter.process_block(&mut output);

        // Skip the settling half
        let settled = input.len() / 2;
        response.push(json!({
            "frequency": frequency,
            "magnitude_db": filter.magnitude_db_at(frequency),
            "measured_db": gain_db(&input[settled..], &output[settled..]),
        }));
    }

    Ok(json!({
        "kind": config.biquad.kind,
        "topology": filter.topology(),
        "sample_rate": sample_rate,
        "coefficients": {
            "b0": coeffs.b0,
            "b1": coeffs.b1,
            "b2": coeffs.b2,
            "a1": coeffs.a1,
            "a2": coeffs.a2,
        },
        "stable": coeffs.is_stable(),
        "response": response,
    }))
}

/// Render an impulse through the configured tank.
pub fn reverb(config: &FxConfig, seconds: f32) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    let mut reverb = TankReverb::new()?;
    reverb.init(sample_rate)?;
    reverb.set(&config.reverb)?;
    info!("Reverb: {} tank, size {}", reverb.tank_type(), config.reverb.size);

    let mut output = impulse(num_samples(seconds, sample_rate));
    reverb.process_block(&mut output);

    Ok(json!({
        "tank": reverb.tank_type(),
        "size": reverb.params().size,
        "damping": reverb.params().damping,
        "output_gain": reverb.output_gain(),
        "decay_estimate_seconds": reverb.decay_estimate_seconds(),
        "measured_rt60_seconds": estimate_rt60(&output, sample_rate),
        "peak": calculate_peak(&output),
        "finite": output.iter().all(|y| y.is_finite()),
    }))
}

/// Round-trip white noise through the STFT with unity bin gains.
pub fn stft(config: &FxConfig, seconds: f32) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    let mut stft = Stft::new();
    stft.init(sample_rate, &config.stft)?;
    info!("STFT: frame {} hop {}", stft.frame_size(), stft.hop());

    let latency = stft.latency_samples();
    let len = num_samples(seconds, sample_rate).max(latency * 4);
    let input = white_noise(len, 0.5, NOISE_SEED);
    let mut output = input.clone();
    stft.process_block(&mut output);

    // Compare once the first output frame is fully overlapped
    let error: Vec<f32> = output[2 * latency..]
        .iter()
        .zip(&input[latency..])
        .map(|(y, x)| y - x)
        .collect();

    Ok(json!({
        "frame_size": stft.frame_size(),
        "hop": stft.hop(),
        "latency_samples": latency,
        "rms_error": calculate_rms(&error),
    }))
}

/// Feed the spectrum matcher and report what it detected and applied.
pub fn spectrum_match(
    config: &FxConfig,
    use_fft: bool,
    tone: Option<f32>,
    seconds: f32,
) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    let len = num_samples(seconds, sample_rate);
    let mut signal = match tone {
        Some(frequency) => sine_wave(frequency, sample_rate, len),
        None => white_noise(len, 0.5, NOISE_SEED),
    };

    let (levels, gains, latency) = if use_fft {
        let mut matcher = SpectrumMatchFft::new()?;
        matcher.init(sample_rate)?;
        matcher.set(&config.spectrum_match)?;
        matcher.process_block(&mut signal);
        (matcher.band_levels(), matcher.applied_gains_db(), matcher.latency_samples())
    } else {
        let mut matcher = SpectrumMatch::new()?;
        matcher.init(sample_rate)?;
        matcher.set(&config.spectrum_match)?;
        matcher.process_block(&mut signal);
        (matcher.band_levels(), matcher.applied_gains_db(), matcher.latency_samples())
    };
    info!("Match: {} samples through the {} path", len, if use_fft { "fft" } else { "biquad" });

    let bands: Vec<Value> = BAND_CENTERS_HZ
        .iter()
        .zip(levels.iter().zip(&gains))
        .map(|(center, (level, gain))| {
            json!({ "center_hz": center, "level": level, "applied_db": gain })
        })
        .collect();

    Ok(json!({
        "detector": config.spectrum_match.detector,
        "path": if use_fft { "fft" } else { "biquad" },
        "latency_samples": latency,
        "bands": bands,
    }))
}

/// 220 Hz sine at `amplitude` between `onset` and `end`, silence elsewhere
fn tone_burst(sample_rate: f32, len: usize, onset: usize, end: usize, amplitude: f32) -> Vec<f32> {
    let mut burst = sine_wave(220.0, sample_rate, len);
    for (i, x) in burst.iter_mut().enumerate() {
        *x = if (onset..end).contains(&i) { *x * amplitude } else { 0.0 };
    }
    burst
}

/// Milliseconds from `start` until `done` first holds, if it ever does
fn time_until(
    levels: &[f32],
    start: usize,
    sample_rate: f32,
    done: impl Fn(f32) -> bool,
) -> Option<f32> {
    levels[start..]
        .iter()
        .position(|level| done(*level))
        .map(|n| n as f32 * 1000.0 / sample_rate)
}

/// Track a tone burst with every follower and report its timing.
pub fn envelope(config: &FxConfig, seconds: f32) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    let params = config.envelope;
    params.validate()?;
    info!(
        "Envelope: attack {} ms, release {} ms, hold {} ms",
        params.attack_ms, params.release_ms, params.hold_ms
    );

    let len = num_samples(seconds, sample_rate).max(4);
    let (onset, end) = (len / 4, len / 2);
    let burst = tone_burst(sample_rate, len, onset, end, 0.5);

    let followers: Vec<(&str, Box<dyn EnvelopeFollower>)> = vec![
        ("branching", Box::new(BranchingFollower::from_params(&params, sample_rate))),
        ("hold", Box::new(HoldFollower::from_params(&params, sample_rate))),
        ("peak", Box::new(PeakDetector::from_params(&params, sample_rate))),
        ("rms", Box::new(RmsFollower::from_params(&params, sample_rate))),
    ];

    let mut reports = Vec::with_capacity(followers.len());
    for (name, mut follower) in followers {
        let levels: Vec<f32> = burst.iter().map(|x| follower.process(*x)).collect();
        let sustain = levels[end - 1];
        reports.push(json!({
            "follower": name,
            "sustain_level": sustain,
            "attack_ms": time_until(&levels, onset, sample_rate, |l| l >= 0.9 * sustain),
            "release_ms": time_until(&levels, end, sample_rate, |l| l <= 0.1 * sustain),
        }));
    }

    Ok(json!({
        "attack_ms": params.attack_ms,
        "release_ms": params.release_ms,
        "hold_ms": params.hold_ms,
        "followers": reports,
    }))
}

/// Run a tone burst through the transient shaper and report its gains.
pub fn transient(config: &FxConfig, seconds: f32) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    let mut shaper = TransientShaper::new();
    shaper.init(sample_rate)?;
    shaper.set(&config.transient)?;
    info!("Transient: attack {}", shaper.params().attack);

    let len = num_samples(seconds, sample_rate).max(4);
    let (onset, end) = (len / 4, len / 2);
    let input = tone_burst(sample_rate, len, onset, end, 0.5);
    let mut gains = Vec::with_capacity(len);
    let mut output = Vec::with_capacity(len);
    for x in &input {
        output.push(shaper.process(*x));
        gains.push(shaper.gain_db());
    }

    let burst = &gains[onset..end];
    Ok(json!({
        "attack": shaper.params().attack,
        "max_gain_db": burst.iter().copied().fold(f32::MIN, f32::max),
        "min_gain_db": burst.iter().copied().fold(f32::MAX, f32::min),
        "sustain_gain_db": burst.last().copied().unwrap_or(0.0),
        "onset_peak_in": calculate_peak(&input[onset..end]),
        "onset_peak_out": calculate_peak(&output[onset..end]),
        "finite": output.iter().all(|y| y.is_finite()),
    }))
}

/// Drive a 1 kHz sine into the clipper.
pub fn clip(config: &FxConfig, amplitude: f32, seconds: f32) -> anyhow::Result<Value> {
    let sample_rate = config.sample_rate;
    config.clipper.validate()?;
    let mut clipper = Clipper::new();
    clipper.set(&config.clipper)?;
    info!(
        "Clip: {} at {} dB drive, ceiling {}",
        clipper.mode().as_str(),
        config.clipper.drive_db,
        config.clipper.ceiling
    );

    let input: Vec<f32> = sine_wave(1000.0, sample_rate, num_samples(seconds, sample_rate))
        .into_iter()
        .map(|x| x * amplitude)
        .collect();
    let mut output = input.clone();
    clipper.process_block(&mut output);

    let ceiling = config.clipper.ceiling;
    let clipped = output.iter().filter(|y| y.abs() >= 0.999 * ceiling).count();
    Ok(json!({
        "mode": clipper.mode(),
        "drive_db": config.clipper.drive_db,
        "ceiling": ceiling,
        "peak_in": calculate_peak(&input),
        "peak_out": calculate_peak(&output),
        "rms_in": calculate_rms(&input),
        "rms_out": calculate_rms(&output),
        "clipped_fraction": clipped as f32 / output.len().max(1) as f32,
    }))
}

/// The effective configuration, as JSON.
pub fn print_config(config: &FxConfig) -> anyhow::Result<Value> {
    Ok(config.to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{ClipMode, FilterKind};

    fn as_f32(value: &Value) -> f32 {
        value.as_f64().unwrap() as f32
    }

    #[test]
    fn test_filter_report() {
        let mut config = FxConfig::default();
        config.biquad.kind = FilterKind::LowPass;
        config.biquad.frequency = 1000.0;
        let report = filter(&config, &[100.0, 10_000.0]).unwrap();

        assert_eq!(report["stable"], json!(true));
        let response = report["response"].as_array().unwrap();
        assert!(as_f32(&response[0]["measured_db"]) > -0.5);
        assert!(as_f32(&response[1]["measured_db"]) < -20.0);
    }

    #[test]
    fn test_reverb_report() {
        let report = reverb(&FxConfig::default(), 2.0).unwrap();
        assert_eq!(report["tank"], json!("schroeder"));
        assert_eq!(report["finite"], json!(true));
        assert!(as_f32(&report["decay_estimate_seconds"]) > 0.0);
    }

    #[test]
    fn test_stft_report() {
        let report = stft(&FxConfig::default(), 0.5).unwrap();
        assert_eq!(report["latency_samples"], json!(1024));
        assert!(as_f32(&report["rms_error"]) < 1e-4);
    }

    #[test]
    fn test_match_report() {
        let report = spectrum_match(&FxConfig::default(), true, Some(1000.0), 1.0).unwrap();
        assert_eq!(report["bands"].as_array().unwrap().len(), 6);
        assert_eq!(report["path"], json!("fft"));
    }

    #[test]
    fn test_envelope_report() {
        let mut config = FxConfig::default();
        config.envelope.attack_ms = 5.0;
        config.envelope.release_ms = 20.0;
        let report = envelope(&config, 1.0).unwrap();

        let followers = report["followers"].as_array().unwrap();
        assert_eq!(followers.len(), 4);
        let branching = &followers[0];
        assert_eq!(branching["follower"], json!("branching"));
        assert!(as_f32(&branching["sustain_level"]) > 0.3);
        // Peak detector attacks at once; the others take a few ms
        assert!(as_f32(&followers[2]["attack_ms"]) < 5.0);
        assert!(as_f32(&branching["release_ms"]) > 20.0);
    }

    #[test]
    fn test_transient_report() {
        let mut config = FxConfig::default();
        config.transient.attack = 1.0;
        let report = transient(&config, 1.0).unwrap();

        assert_eq!(report["finite"], json!(true));
        assert!(as_f32(&report["max_gain_db"]) > 3.0);
        // Zero crossings sit below the slow envelope
        assert!(as_f32(&report["min_gain_db"]) < 0.0);
        assert!(as_f32(&report["onset_peak_out"]) > as_f32(&report["onset_peak_in"]));
    }

    #[test]
    fn test_clip_report() {
        let mut config = FxConfig::default();
        config.clipper.mode = ClipMode::Soft;
        config.clipper.drive_db = 12.0;
        config.clipper.ceiling = 0.5;
        let report = clip(&config, 1.0, 0.1).unwrap();

        assert_eq!(report["mode"], json!("soft"));
        assert!(as_f32(&report["peak_out"]) <= 0.5 + 1e-6);
        assert!(as_f32(&report["rms_out"]) < as_f32(&report["rms_in"]));
        assert!(as_f32(&report["clipped_fraction"]) > 0.0);
    }

    #[test]
    fn test_clip_rejects_bad_ceiling() {
        let mut config = FxConfig::default();
        config.clipper.ceiling = 2.0;
        assert!(clip(&config, 1.0, 0.1).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(Path::new("/nonexistent/fx.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
        assert_eq!(load_config(None).unwrap(), FxConfig::default());
    }
}
