//! CLI Module
//!
//! Command-line probe for the DSP core. Every subcommand renders a
//! synthetic signal through one component and prints JSON measurements.

pub mod commands;

use crate::dsp::{ClipMode, FilterKind};
use crate::matching::DetectorKind;
use crate::reverb::TankType;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// fxcore probe - render test signals through the DSP core
#[derive(Parser, Debug)]
#[command(name = "fxcore-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config seeding every component (flags override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Design a biquad and measure its response at probe frequencies
    #[command(name = "filter")]
    Filter {
        /// Response shape (low_pass, high_pass, peak, low_shelf, ...)
        #[arg(short, long, value_parser = parse_named::<FilterKind>)]
        kind: Option<FilterKind>,

        /// Corner/center frequency in Hz
        #[arg(short, long)]
        frequency: Option<f32>,

        /// Q factor
        #[arg(short, long)]
        q: Option<f32>,

        /// Gain in dB for peak and shelf shapes
        #[arg(short, long, allow_hyphen_values = true)]
        gain_db: Option<f32>,

        /// Probe frequencies in Hz
        #[arg(short, long, value_delimiter = ',', default_value = "100,1000,10000")]
        probe: Vec<f32>,
    },

    /// Render an impulse through a reverb tank
    #[command(name = "reverb")]
    Reverb {
        /// Topology name or index
        #[arg(short, long)]
        tank: Option<TankType>,

        /// Room size (0 to 1)
        #[arg(short, long)]
        size: Option<f32>,

        /// Loop damping (0 to 1)
        #[arg(short, long)]
        damping: Option<f32>,

        /// Rendered length in seconds
        #[arg(long, default_value_t = 4.0)]
        seconds: f32,
    },

    /// Round-trip white noise through the STFT at unity gain
    #[command(name = "stft")]
    Stft {
        /// Frame size (power of two)
        #[arg(short, long)]
        frame_size: Option<usize>,

        /// Frames overlapping each sample (power of two, at least 4)
        #[arg(short, long)]
        overlap: Option<usize>,

        /// Rendered length in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
    },

    /// Feed noise or a tone to the spectrum matcher and report the bands
    #[command(name = "match")]
    Match {
        /// Detector (time_domain or frequency_domain)
        #[arg(short, long, value_parser = parse_named::<DetectorKind>)]
        detector: Option<DetectorKind>,

        /// Correct per bin inside the STFT instead of with biquads
        #[arg(long)]
        fft: bool,

        /// Sine frequency in Hz; white noise when absent
        #[arg(short, long)]
        tone: Option<f32>,

        /// Rendered length in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f32,
    },

    /// Track a tone burst with every envelope follower
    #[command(name = "envelope")]
    Envelope {
        /// Attack time in ms
        #[arg(short, long)]
        attack_ms: Option<f32>,

        /// Release time in ms
        #[arg(short, long)]
        release_ms: Option<f32>,

        /// Hold time in ms
        #[arg(long)]
        hold_ms: Option<f32>,

        /// Rendered length in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
    },

    /// Run a tone burst through the transient shaper
    #[command(name = "transient")]
    Transient {
        /// Attack emphasis (-1 to 1)
        #[arg(short, long, allow_hyphen_values = true)]
        attack: Option<f32>,

        /// Rendered length in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
    },

    /// Drive a sine into the clipper
    #[command(name = "clip")]
    Clip {
        /// Curve (hard, soft, cubic)
        #[arg(short, long)]
        mode: Option<ClipMode>,

        /// Drive in dB
        #[arg(short, long)]
        drive_db: Option<f32>,

        /// Output ceiling (linear)
        #[arg(long)]
        ceiling: Option<f32>,

        /// Input sine amplitude
        #[arg(long, default_value_t = 1.0)]
        amplitude: f32,

        /// Rendered length in seconds
        #[arg(long, default_value_t = 0.5)]
        seconds: f32,
    },

    /// Print the effective configuration
    #[command(name = "config")]
    PrintConfig,
}

/// Parse a value by its serde name
fn parse_named<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|e| format!("unknown value '{}': {}", value, e))
}
