//! FFT primitive behind a trait so the engine does not depend on a
//! particular transform library.

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Complex in-place FFT of a fixed length
///
/// Neither direction normalizes; callers scale the inverse by `1 / len`.
pub trait FftBackend: Send {
    /// Transform length
    fn len(&self) -> usize;

    /// Forward transform in place
    fn forward(&mut self, buffer: &mut [Complex32]);

    /// Inverse transform in place, unscaled
    fn inverse(&mut self, buffer: &mut [Complex32]);
}

/// `rustfft` planner output with a preallocated scratch buffer
pub struct RustFftBackend {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
    len: usize,
}

impl RustFftBackend {
    /// Plan forward and inverse transforms of `len` points
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            forward,
            inverse,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
            len,
        }
    }
}

impl fmt::Debug for RustFftBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustFftBackend").field("len", &self.len).finish()
    }
}

impl FftBackend for RustFftBackend {
    fn len(&self) -> usize {
        self.len
    }

    fn forward(&mut self, buffer: &mut [Complex32]) {
        self.forward.process_with_scratch(buffer, &mut self.scratch);
    }

    fn inverse(&mut self, buffer: &mut [Complex32]) {
        self.inverse.process_with_scratch(buffer, &mut self.scratch);
    }
}
