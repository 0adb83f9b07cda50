//! Transient shaper
//!
//! Two branching followers run on the input: a fast one that catches
//! onsets and a slow one that tracks the sustain. Their ratio rises above
//! one at an attack and falls below one in the tail, so raising it to a
//! power emphasises (positive `attack`) or softens (negative) transients.

use super::envelope::{BranchingFollower, EnvelopeFollower};
use super::math::{db_to_linear, DEFAULT_SAMPLE_RATE};
use super::processor::Processor;
use crate::error::{clamp_param, FxError, Result};
use serde::{Deserialize, Serialize};

/// Keeps the follower ratio finite on silence
const RATIO_EPSILON: f32 = 1.0e-6;
/// Gain limit in either direction
pub const MAX_GAIN_DB: f32 = 24.0;

/// Transient shaper parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientParams {
    /// Attack emphasis exponent (-1 to 1)
    pub attack: f32,
    /// Fast follower time in ms (0.1 to 50)
    pub fast_ms: f32,
    /// Slow follower time in ms (5 to 500)
    pub slow_ms: f32,
}

impl Default for TransientParams {
    fn default() -> Self {
        Self {
            attack: 0.0,
            fast_ms: 1.0,
            slow_ms: 50.0,
        }
    }
}

impl TransientParams {
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.attack) {
            return Err(FxError::invalid_parameter("attack", self.attack, -1.0, 1.0));
        }
        if !(0.1..=50.0).contains(&self.fast_ms) {
            return Err(FxError::invalid_parameter("fast_ms", self.fast_ms, 0.1, 50.0));
        }
        if !(5.0..=500.0).contains(&self.slow_ms) {
            return Err(FxError::invalid_parameter("slow_ms", self.slow_ms, 5.0, 500.0));
        }
        Ok(())
    }

    pub fn clamp(&mut self) {
        self.attack = self.attack.clamp(-1.0, 1.0);
        self.fast_ms = self.fast_ms.clamp(0.1, 50.0);
        self.slow_ms = self.slow_ms.clamp(5.0, 500.0);
    }
}

/// Envelope-ratio transient shaper
#[derive(Debug, Clone)]
pub struct TransientShaper {
    params: TransientParams,
    fast: BranchingFollower,
    slow: BranchingFollower,
    sample_rate: f32,
    /// Last applied gain in dB, for meters
    gain_db: f32,
}

impl Default for TransientShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl TransientShaper {
    pub fn new() -> Self {
        Self {
            params: TransientParams::default(),
            fast: BranchingFollower::new(),
            slow: BranchingFollower::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            gain_db: 0.0,
        }
    }

    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        self.sample_rate = clamp_param("sample_rate", sample_rate, 1000.0, 768_000.0)?;
        self.fast.release();
        self.slow.release();
        self.update_times();
        Ok(())
    }

    /// Set parameters (clamped into range)
    pub fn set(&mut self, params: &TransientParams) -> Result<()> {
        let mut params = *params;
        params.attack = clamp_param("attack", params.attack, -1.0, 1.0)?;
        params.fast_ms = clamp_param("fast_ms", params.fast_ms, 0.1, 50.0)?;
        params.slow_ms = clamp_param("slow_ms", params.slow_ms, 5.0, 500.0)?;
        self.params = params;
        self.update_times();
        log::debug!(
            "transient shaper: attack {} fast {} ms slow {} ms",
            params.attack,
            params.fast_ms,
            params.slow_ms
        );
        Ok(())
    }

    pub fn params(&self) -> &TransientParams {
        &self.params
    }

    /// Gain applied to the most recent sample, in dB
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    fn update_times(&mut self) {
        // Both followers attack fast; they differ in how quickly they let go
        let fast = self.params.fast_ms * 0.001;
        let slow = self.params.slow_ms * 0.001;
        self.fast.set_times(fast * 0.1, fast, self.sample_rate);
        self.slow.set_times(slow, slow, self.sample_rate);
    }
}

impl Processor for TransientShaper {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let fast = self.fast.process(input);
        let slow = self.slow.process(input);
        let ratio = (fast + RATIO_EPSILON) / (slow + RATIO_EPSILON);

        // ratio^k expressed in dB
        let gain_db = (20.0 * ratio.log10() * self.params.attack).clamp(-MAX_GAIN_DB, MAX_GAIN_DB);
        self.gain_db = gain_db;
        input * db_to_linear(gain_db)
    }

    fn release(&mut self) {
        self.fast.release();
        self.slow.release();
        self.gain_db = 0.0;
    }
}
