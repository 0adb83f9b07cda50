//! Envelope followers
//!
//! Each follower tracks the level of a signal with one-pole smoothing:
//! `coeff = exp(-1 / (time_constant * sample_rate))`. The attack pole is
//! used while the input rises above the running level, the release pole
//! otherwise.

use super::math::{flush_denormal, time_to_coefficient};
use crate::error::{FxError, Result};
use serde::{Deserialize, Serialize};

/// Common interface of the follower family
pub trait EnvelopeFollower: Send {
    /// Feed one sample, return the updated level (always >= 0)
    fn process(&mut self, input: f32) -> f32;

    /// Current level without advancing
    fn level(&self) -> f32;

    /// Set attack and release time constants in seconds
    ///
    /// `sample_rate` is the rate `process` is called at, which for
    /// hop-rate detectors is lower than the audio rate.
    fn set_times(&mut self, attack_seconds: f32, release_seconds: f32, sample_rate: f32);

    /// Jump to a level (used to seed a detector without a ramp)
    fn reset_to(&mut self, level: f32);

    /// Return to silence, keeping times
    fn release(&mut self) {
        self.reset_to(0.0);
    }
}

/// Follower timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeParams {
    /// Attack time in ms (0 to 1000)
    pub attack_ms: f32,
    /// Release time in ms (0 to 5000)
    pub release_ms: f32,
    /// Hold time in ms (0 to 1000), used by hold and peak followers
    pub hold_ms: f32,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack_ms: 10.0,
            release_ms: 50.0,
            hold_ms: 0.0,
        }
    }
}

impl EnvelopeParams {
    /// Validate parameters are within range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1000.0).contains(&self.attack_ms) {
            return Err(FxError::invalid_parameter("attack_ms", self.attack_ms, 0.0, 1000.0));
        }
        if !(0.0..=5000.0).contains(&self.release_ms) {
            return Err(FxError::invalid_parameter("release_ms", self.release_ms, 0.0, 5000.0));
        }
        if !(0.0..=1000.0).contains(&self.hold_ms) {
            return Err(FxError::invalid_parameter("hold_ms", self.hold_ms, 0.0, 1000.0));
        }
        Ok(())
    }

    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.attack_ms = self.attack_ms.clamp(0.0, 1000.0);
        self.release_ms = self.release_ms.clamp(0.0, 5000.0);
        self.hold_ms = self.hold_ms.clamp(0.0, 1000.0);
    }

    /// Hold window in whole samples
    pub fn hold_samples(&self, sample_rate: f32) -> usize {
        (self.hold_ms * 0.001 * sample_rate).round() as usize
    }
}

/// Attack/release pole pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Poles {
    attack: f32,
    release: f32,
}

impl Poles {
    fn from_times(attack_seconds: f32, release_seconds: f32, sample_rate: f32) -> Self {
        Self {
            attack: time_to_coefficient(attack_seconds, sample_rate),
            release: time_to_coefficient(release_seconds, sample_rate),
        }
    }

    #[inline]
    fn attack(&self, level: f32, target: f32) -> f32 {
        self.attack * level + (1.0 - self.attack) * target
    }

    #[inline]
    fn release(&self, level: f32, target: f32) -> f32 {
        flush_denormal(self.release * level + (1.0 - self.release) * target)
    }
}

/// Attack pole on rising input, release pole otherwise
#[derive(Debug, Clone, Default)]
pub struct BranchingFollower {
    poles: Poles,
    level: f32,
}

impl BranchingFollower {
    /// Create a follower that tracks its input instantly until times are set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a follower from millisecond params
    pub fn from_params(params: &EnvelopeParams, sample_rate: f32) -> Self {
        let mut follower = Self::new();
        follower.set_times(params.attack_ms * 0.001, params.release_ms * 0.001, sample_rate);
        follower
    }
}

impl EnvelopeFollower for BranchingFollower {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let x = input.abs();
        self.level = if x > self.level {
            self.poles.attack(self.level, x)
        } else {
            self.poles.release(self.level, x)
        };
        self.level
    }

    fn level(&self) -> f32 {
        self.level
    }

    fn set_times(&mut self, attack_seconds: f32, release_seconds: f32, sample_rate: f32) {
        self.poles = Poles::from_times(attack_seconds, release_seconds, sample_rate);
    }

    fn reset_to(&mut self, level: f32) {
        self.level = level.abs();
    }
}

/// Branching follower that holds its level for a while after each rise
#[derive(Debug, Clone, Default)]
pub struct HoldFollower {
    poles: Poles,
    level: f32,
    hold_samples: usize,
    hold_counter: usize,
}

impl HoldFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &EnvelopeParams, sample_rate: f32) -> Self {
        let mut follower = Self::new();
        follower.set_times(params.attack_ms * 0.001, params.release_ms * 0.001, sample_rate);
        follower.set_hold(params.hold_samples(sample_rate));
        follower
    }

    /// Hold window in samples
    pub fn set_hold(&mut self, samples: usize) {
        self.hold_samples = samples;
        self.hold_counter = self.hold_counter.min(samples);
    }
}

impl EnvelopeFollower for HoldFollower {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let x = input.abs();
        if x > self.level {
            self.level = self.poles.attack(self.level, x);
            self.hold_counter = self.hold_samples;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
        } else {
            self.level = self.poles.release(self.level, x);
        }
        self.level
    }

    fn level(&self) -> f32 {
        self.level
    }

    fn set_times(&mut self, attack_seconds: f32, release_seconds: f32, sample_rate: f32) {
        self.poles = Poles::from_times(attack_seconds, release_seconds, sample_rate);
    }

    fn reset_to(&mut self, level: f32) {
        self.level = level.abs();
        self.hold_counter = 0;
    }
}

/// Instant attack to new maxima, optional hold, exponential release
///
/// The attack time passed to `set_times` is ignored.
#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    release: f32,
    level: f32,
    hold_samples: usize,
    hold_counter: usize,
}

impl PeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &EnvelopeParams, sample_rate: f32) -> Self {
        let mut detector = Self::new();
        detector.set_times(0.0, params.release_ms * 0.001, sample_rate);
        detector.set_hold(params.hold_samples(sample_rate));
        detector
    }

    pub fn set_hold(&mut self, samples: usize) {
        self.hold_samples = samples;
        self.hold_counter = self.hold_counter.min(samples);
    }
}

impl EnvelopeFollower for PeakDetector {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let x = input.abs();
        if x >= self.level {
            self.level = x;
            self.hold_counter = self.hold_samples;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
        } else {
            self.level = flush_denormal(self.release * self.level + (1.0 - self.release) * x);
        }
        self.level
    }

    fn level(&self) -> f32 {
        self.level
    }

    fn set_times(&mut self, _attack_seconds: f32, release_seconds: f32, sample_rate: f32) {
        self.release = time_to_coefficient(release_seconds, sample_rate);
    }

    fn reset_to(&mut self, level: f32) {
        self.level = level.abs();
        self.hold_counter = 0;
    }
}

/// Branching smoother over the squared input; reports the root
#[derive(Debug, Clone, Default)]
pub struct RmsFollower {
    poles: Poles,
    mean_square: f32,
}

impl RmsFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &EnvelopeParams, sample_rate: f32) -> Self {
        let mut follower = Self::new();
        follower.set_times(params.attack_ms * 0.001, params.release_ms * 0.001, sample_rate);
        follower
    }

    /// Smoothed mean square
    pub fn mean_square(&self) -> f32 {
        self.mean_square
    }
}

impl EnvelopeFollower for RmsFollower {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let x2 = input * input;
        self.mean_square = if x2 > self.mean_square {
            self.poles.attack(self.mean_square, x2)
        } else {
            self.poles.release(self.mean_square, x2)
        };
        self.mean_square.sqrt()
    }

    fn level(&self) -> f32 {
        self.mean_square.sqrt()
    }

    fn set_times(&mut self, attack_seconds: f32, release_seconds: f32, sample_rate: f32) {
        self.poles = Poles::from_times(attack_seconds, release_seconds, sample_rate);
    }

    fn reset_to(&mut self, level: f32) {
        self.mean_square = level * level;
    }
}
