//! Bundled configuration
//!
//! One serde document carrying the sample rate and the parameters of
//! every component. Missing fields fall back to defaults, so a config
//! file only needs the values it changes.

use crate::dsp::{BiquadParams, ClipperParams, EnvelopeParams, TransientParams};
use crate::error::{FxError, Result};
use crate::matching::SpectrumMatchParams;
use crate::reverb::TankParams;
use crate::spectral::StftParams;
use serde::{Deserialize, Serialize};

/// Lowest sample rate the components accept
pub const MIN_SAMPLE_RATE: f32 = 1000.0;
/// Highest sample rate the components accept
pub const MAX_SAMPLE_RATE: f32 = 768_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub sample_rate: f32,
    pub biquad: BiquadParams,
    pub envelope: EnvelopeParams,
    pub stft: StftParams,
    pub spectrum_match: SpectrumMatchParams,
    pub reverb: TankParams,
    pub transient: TransientParams,
    pub clipper: ClipperParams,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            biquad: BiquadParams::default(),
            envelope: EnvelopeParams::default(),
            stft: StftParams::default(),
            spectrum_match: SpectrumMatchParams::default(),
            reverb: TankParams::default(),
            transient: TransientParams::default(),
            clipper: ClipperParams::default(),
        }
    }
}

impl FxConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FxConfig = serde_json::from_str(json)?;
        config.validate()?;
        log::debug!("config: loaded at {} Hz", config.sample_rate);
        Ok(config)
    }

    /// Parse from an already decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: FxConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(FxError::invalid_parameter(
                "sample_rate",
                self.sample_rate,
                MIN_SAMPLE_RATE,
                MAX_SAMPLE_RATE,
            ));
        }
        self.biquad.validate()?;
        self.envelope.validate()?;
        self.stft.validate()?;
        self.spectrum_match.validate()?;
        self.reverb.validate()?;
        self.transient.validate()?;
        self.clipper.validate()
    }

    /// Clamp every section into range
    pub fn clamp(&mut self) {
        if self.sample_rate.is_finite() {
            self.sample_rate = self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        }
        self.biquad.clamp();
        self.envelope.clamp();
        self.stft.clamp();
        self.spectrum_match.clamp();
        self.reverb.clamp();
        self.transient.clamp();
        self.clipper.clamp();
    }
}
