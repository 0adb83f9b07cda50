//! Processor trait definition
//!
//! Uniform per-sample contract shared by every processing component.

/// Base trait for all per-sample DSP components
///
/// `init`/`set` are inherent methods on each component because their
/// sizing and musical parameters differ. Everything the audio thread
/// touches lives here and must not allocate, lock or fail.
pub trait Processor: Send {
    /// Process a single sample
    fn process(&mut self, input: f32) -> f32;

    /// Process a block of samples in-place
    fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Reset to the pre-init zero state without freeing allocations
    fn release(&mut self);

    /// Processing latency in samples
    fn latency_samples(&self) -> usize {
        0
    }
}

impl<P: Processor + ?Sized> Processor for Box<P> {
    fn process(&mut self, input: f32) -> f32 {
        (**self).process(input)
    }

    fn process_block(&mut self, buffer: &mut [f32]) {
        (**self).process_block(buffer)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn latency_samples(&self) -> usize {
        (**self).latency_samples()
    }
}
