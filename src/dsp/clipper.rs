//! Scalar clipper
//!
//! Reference implementation of the clipping curves. Input is driven into
//! the curve, normalized to the ceiling, shaped and scaled back, so every
//! mode peaks at exactly `ceiling`.

use super::math::db_to_linear;
use super::processor::Processor;
use crate::error::{clamp_param, FxError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MIN_DRIVE_DB: f32 = 0.0;
pub const MAX_DRIVE_DB: f32 = 36.0;
pub const MIN_CEILING: f32 = 0.01;
pub const MAX_CEILING: f32 = 1.0;

/// Clipping curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipMode {
    /// Brick-wall clamp
    #[default]
    Hard,
    /// `tanh`
    Soft,
    /// `1.5 (u - u^3 / 3)`, flat beyond |u| = 1
    Cubic,
}

impl ClipMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipMode::Hard => "hard",
            ClipMode::Soft => "soft",
            ClipMode::Cubic => "cubic",
        }
    }
}

impl FromStr for ClipMode {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hard" => Ok(ClipMode::Hard),
            "soft" | "tanh" => Ok(ClipMode::Soft),
            "cubic" => Ok(ClipMode::Cubic),
            other => Err(FxError::invalid_config(format!("unknown clip mode '{}'", other))),
        }
    }
}

/// Shape one sample
///
/// `drive` is a linear gain applied before the curve.
#[inline]
pub fn clip_sample(mode: ClipMode, input: f32, drive: f32, ceiling: f32) -> f32 {
    let u = input * drive / ceiling;
    let shaped = match mode {
        ClipMode::Hard => u.clamp(-1.0, 1.0),
        ClipMode::Soft => u.tanh(),
        ClipMode::Cubic => {
            if u.abs() >= 1.0 {
                u.signum()
            } else {
                1.5 * (u - u * u * u / 3.0)
            }
        }
    };
    shaped * ceiling
}

/// Clipper parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipperParams {
    pub mode: ClipMode,
    /// Drive in dB (0 to 36)
    pub drive_db: f32,
    /// Output ceiling, linear (0.01 to 1)
    pub ceiling: f32,
}

impl Default for ClipperParams {
    fn default() -> Self {
        Self {
            mode: ClipMode::Hard,
            drive_db: 0.0,
            ceiling: 1.0,
        }
    }
}

impl ClipperParams {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DRIVE_DB..=MAX_DRIVE_DB).contains(&self.drive_db) {
            return Err(FxError::invalid_parameter(
                "drive_db",
                self.drive_db,
                MIN_DRIVE_DB,
                MAX_DRIVE_DB,
            ));
        }
        if !(MIN_CEILING..=MAX_CEILING).contains(&self.ceiling) {
            return Err(FxError::invalid_parameter(
                "ceiling",
                self.ceiling,
                MIN_CEILING,
                MAX_CEILING,
            ));
        }
        Ok(())
    }

    pub fn clamp(&mut self) {
        self.drive_db = self.drive_db.clamp(MIN_DRIVE_DB, MAX_DRIVE_DB);
        self.ceiling = self.ceiling.clamp(MIN_CEILING, MAX_CEILING);
    }
}

/// Stateless clipper with cached linear drive
#[derive(Debug, Clone)]
pub struct Clipper {
    mode: ClipMode,
    drive: f32,
    ceiling: f32,
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipper {
    pub fn new() -> Self {
        Self {
            mode: ClipMode::Hard,
            drive: 1.0,
            ceiling: 1.0,
        }
    }

    pub fn set(&mut self, params: &ClipperParams) -> Result<()> {
        let drive_db = clamp_param("drive_db", params.drive_db, MIN_DRIVE_DB, MAX_DRIVE_DB)?;
        let ceiling = clamp_param("ceiling", params.ceiling, MIN_CEILING, MAX_CEILING)?;
        self.mode = params.mode;
        self.drive = db_to_linear(drive_db);
        self.ceiling = ceiling;
        Ok(())
    }

    pub fn mode(&self) -> ClipMode {
        self.mode
    }
}

impl Processor for Clipper {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        clip_sample(self.mode, input, self.drive, self.ceiling)
    }

    fn process_block(&mut self, buffer: &mut [f32]) {
        let (mode, drive, ceiling) = (self.mode, self.drive, self.ceiling);
        for sample in buffer.iter_mut() {
            *sample = clip_sample(mode, *sample, drive, ceiling);
        }
    }

    fn release(&mut self) {
        *self = Self::new();
    }
}
