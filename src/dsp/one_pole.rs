//! One-pole damping low-pass
//!
//! `y[n] = (1 - d) * x[n] + d * y[n - 1]`, with `d` in `[0, 1)`. Used in
//! comb feedback paths and as the reverb input bandwidth filter.

use super::math::flush_denormal;
use super::processor::Processor;
use crate::error::{ensure_finite, FxError, Result};

/// Largest accepted damping coefficient
pub const MAX_DAMPING: f32 = 0.9999;

/// One-pole low-pass with unity DC gain
#[derive(Debug, Clone, Default)]
pub struct OnePoleLowPass {
    /// Pole position `d`
    damping: f32,
    /// Previous output
    z1: f32,
}

impl OnePoleLowPass {
    /// Create a pass-through filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter with the given damping
    pub fn with_damping(damping: f32) -> Result<Self> {
        let mut filter = Self::new();
        filter.set_damping(damping)?;
        Ok(filter)
    }

    /// Set the pole position; 0 passes the input through
    pub fn set_damping(&mut self, damping: f32) -> Result<()> {
        let damping = ensure_finite("damping", damping, 0.0, MAX_DAMPING)?;
        if !(0.0..=MAX_DAMPING).contains(&damping) {
            return Err(FxError::UnstableCoefficient {
                stage: "one-pole damping".to_string(),
                value: damping,
            });
        }
        self.damping = damping;
        Ok(())
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Clear the history
    pub fn reset(&mut self) {
        self.z1 = 0.0;
    }
}

impl Processor for OnePoleLowPass {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.z1 = flush_denormal((1.0 - self.damping) * input + self.damping * self.z1);
        self.z1
    }

    /// Clears the history; the damping is kept
    fn release(&mut self) {
        self.z1 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_zero_damping_passes_through() {
        let mut filter = OnePoleLowPass::new();
        assert_eq!(filter.process(0.3), 0.3);
        assert_eq!(filter.process(-0.8), -0.8);
    }

    #[test]
    fn test_unity_dc_gain() {
        let mut filter = OnePoleLowPass::with_damping(0.7).unwrap();
        let mut y = 0.0;
        for _ in 0..200 {
            y = filter.process(1.0);
        }
        assert_abs_diff_eq!(y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_attenuates_nyquist() {
        let mut filter = OnePoleLowPass::with_damping(0.5).unwrap();
        let mut y = 0.0;
        for i in 0..200 {
            y = filter.process(if i % 2 == 0 { 1.0 } else { -1.0 });
        }
        // |H(-1)| = (1 - d) / (1 + d)
        assert_abs_diff_eq!(y.abs(), 1.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_release_keeps_damping() {
        let mut filter = OnePoleLowPass::with_damping(0.5).unwrap();
        filter.process(1.0);
        filter.release();
        assert_eq!(filter.damping(), 0.5);
        assert_eq!(filter.process(1.0), 0.5);
    }

    #[test]
    fn test_rejects_unstable_damping() {
        let mut filter = OnePoleLowPass::new();
        assert!(matches!(
            filter.set_damping(1.0),
            Err(FxError::UnstableCoefficient { .. })
        ));
        assert!(filter.set_damping(-0.1).is_err());
        assert!(filter.set_damping(f32::NAN).is_err());
        assert_eq!(filter.damping(), 0.0);
    }
}
