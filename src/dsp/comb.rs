//! Comb and allpass elements built on [`DelayLine`]
//!
//! Both elements are sized once with `init(max_delay)` and retuned with
//! `set(...)`, which never allocates. Delays are in whole samples.

use super::delay_line::DelayLine;
use super::one_pole::OnePoleLowPass;
use super::processor::Processor;
use crate::error::{ensure_finite, FxError, Result};

/// Reject coefficients outside the open interval (-1, 1)
pub(crate) fn check_stable(stage: &str, value: f32) -> Result<f32> {
    let value = ensure_finite(stage, value, -1.0, 1.0)?;
    if value.abs() >= 1.0 {
        return Err(FxError::UnstableCoefficient {
            stage: stage.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Feedback comb with a one-pole damper in the loop
///
/// ```text
/// v[n] = x[n] + g * lp(v[n - D])
/// y[n] = v[n - D]
/// ```
#[derive(Debug, Clone)]
pub struct CombFilter {
    line: DelayLine,
    delay: usize,
    feedback: f32,
    damper: OnePoleLowPass,
}

impl Default for CombFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CombFilter {
    pub fn new() -> Self {
        Self {
            line: DelayLine::new(),
            delay: 1,
            feedback: 0.0,
            damper: OnePoleLowPass::new(),
        }
    }

    /// Allocate for delays up to `max_delay` samples
    pub fn init(&mut self, max_delay: usize) {
        self.line.init(max_delay);
        self.delay = self.delay.min(self.line.len());
        self.damper.reset();
    }

    /// Retune delay, feedback and loop damping
    ///
    /// The delay is clamped to the allocated length. Feedback must lie
    /// strictly inside (-1, 1).
    pub fn set(&mut self, delay: usize, feedback: f32, damping: f32) -> Result<()> {
        let feedback = check_stable("comb feedback", feedback)?;
        self.damper.set_damping(damping)?;
        self.delay = delay.clamp(1, self.line.len());
        self.feedback = feedback;
        Ok(())
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }
}

impl Processor for CombFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.line.read_delay(self.delay - 1);
        let fed_back = self.damper.process(output);
        self.line.write(input + self.feedback * fed_back);
        output
    }

    /// Clears the line and damper; delay, feedback and damping are kept
    fn release(&mut self) {
        self.line.clear();
        self.damper.release();
    }

    fn latency_samples(&self) -> usize {
        self.delay
    }
}

/// Schroeder allpass section
///
/// ```text
/// v[n] = x[n] + g * v[n - D]
/// y[n] = v[n - D] - g * v[n]
/// ```
///
/// A negative `g` flips the sign convention, as used by the decay
/// diffusers of a figure-eight tank.
#[derive(Debug, Clone)]
pub struct AllPassFilter {
    line: DelayLine,
    delay: usize,
    gain: f32,
}

impl Default for AllPassFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AllPassFilter {
    pub fn new() -> Self {
        Self {
            line: DelayLine::new(),
            delay: 1,
            gain: 0.0,
        }
    }

    /// Allocate for delays up to `max_delay` samples
    pub fn init(&mut self, max_delay: usize) {
        self.line.init(max_delay);
        self.delay = self.delay.min(self.line.len());
    }

    pub fn set(&mut self, delay: usize, gain: f32) -> Result<()> {
        let gain = check_stable("allpass gain", gain)?;
        self.delay = delay.clamp(1, self.line.len());
        self.gain = gain;
        Ok(())
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Internal state `v` written `n` samples before the most recent one
    #[inline]
    pub fn tap(&self, n: usize) -> f32 {
        self.line.read_delay(n)
    }
}

impl Processor for AllPassFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line.read_delay(self.delay - 1);
        let v = input + self.gain * delayed;
        self.line.write(v);
        delayed - self.gain * v
    }

    /// Clears the line; delay and gain are kept
    fn release(&mut self) {
        self.line.clear();
    }
}
