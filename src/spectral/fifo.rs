//! Power-of-two sample ring addressed by an external position
//!
//! The STFT and the analyzer keep one position counter and use it for
//! both their input and output rings. Frames are copied out (or added
//! back) in chronological order starting at the oldest slot, splitting the
//! copy at the wrap point instead of masking every index.

#[derive(Debug, Clone, Default)]
pub(crate) struct FrameRing {
    buffer: Vec<f32>,
}

impl FrameRing {
    /// Zeroed ring of `size` samples, reusing the allocation if possible
    pub fn resize(&mut self, size: usize) {
        debug_assert!(size.is_power_of_two());
        if self.buffer.len() == size {
            self.buffer.fill(0.0);
        } else {
            self.buffer = vec![0.0; size];
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }

    #[inline]
    pub fn write(&mut self, pos: usize, sample: f32) {
        self.buffer[pos] = sample;
    }

    /// Read the sample at `pos` and zero the slot
    #[inline]
    pub fn take(&mut self, pos: usize) -> f32 {
        std::mem::take(&mut self.buffer[pos])
    }

    /// Copy the ring into `out` starting at slot `start`
    pub fn copy_from(&self, start: usize, out: &mut [f32]) {
        let (tail, head) = self.buffer.split_at(start);
        let split = head.len();
        out[..split].copy_from_slice(head);
        out[split..].copy_from_slice(tail);
    }

    /// Add `frame` into the ring starting at slot `start`
    pub fn add_from(&mut self, start: usize, frame: &[f32]) {
        let (tail, head) = self.buffer.split_at_mut(start);
        let split = head.len();
        for (dst, src) in head.iter_mut().zip(&frame[..split]) {
            *dst += src;
        }
        for (dst, src) in tail.iter_mut().zip(&frame[split..]) {
            *dst += src;
        }
    }
}
