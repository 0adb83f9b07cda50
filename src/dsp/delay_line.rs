//! Delay Line (power-of-two ring buffer)
//!
//! A delay line stores past samples and reads them back after a given
//! number of writes. The buffer length is always a power of two so that
//! wrapping is a single bit-mask instead of a modulo or a branch.
//!
//! ## Indexing
//!
//! `head` points at the slot the next `write()` fills, which is also the
//! oldest stored sample. The most recent sample sits at `head - 1`, so a
//! delay of `n` writes is read from `(head - 1 - n) & mask`.
//!
//! ## Fractional reads
//!
//! Four interpolators trade CPU for smoothness when the delay is
//! modulated (chorus, flanger, pitch shifting):
//!
//! | Reader | Points | Notes |
//! |---|---|---|
//! | `read_delay_linear` | 2 | cheap, audible aliasing when modulated |
//! | `read_delay_cubic_hermite` | 4 | Catmull-Rom, passes through samples |
//! | `read_delay_cubic_optimal` | 4 | Niemitalo's optimal 2x polynomial |
//! | `read_delay_cubic_watte` | 4 | Watte tri-linear, 2nd order |
//!
//! Delays at or beyond the buffer length alias through the mask. Size the
//! buffer for the longest delay the caller will ever request.

use super::processor::Processor;

/// Ring buffer delay line with power-of-two length
#[derive(Debug, Clone)]
pub struct DelayLine {
    /// Sample storage, length is a power of two
    buffer: Vec<f32>,
    /// Slot the next write fills
    head: usize,
    /// `buffer.len() - 1`
    mask: usize,
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayLine {
    /// Create an uninitialized single-slot delay line
    pub fn new() -> Self {
        Self {
            buffer: vec![0.0; 1],
            head: 0,
            mask: 0,
        }
    }

    /// Create a delay line holding at least `size` samples
    pub fn with_size(size: usize) -> Self {
        let mut line = Self::new();
        line.init(size);
        line
    }

    /// Allocate storage for at least `size` samples and zero it
    ///
    /// The length is rounded up to the next power of two. An existing
    /// allocation of the same rounded length is reused.
    pub fn init(&mut self, size: usize) {
        let size = size.max(1).next_power_of_two();
        if self.buffer.len() != size {
            self.buffer = vec![0.0; size];
        } else {
            self.buffer.fill(0.0);
        }
        self.mask = size - 1;
        self.head = 0;
    }

    /// Buffer length (a power of two)
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Always false: a delay line holds at least one slot
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Largest delay `read_delay` can reach without aliasing
    pub fn max_delay(&self) -> usize {
        self.mask
    }

    /// Store a sample at the head and advance the head
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.head] = sample;
        self.head = (self.head + 1) & self.mask;
    }

    /// Oldest stored sample (the one the next write overwrites)
    #[inline]
    pub fn read(&self) -> f32 {
        self.buffer[self.head]
    }

    /// Sample written `delay` writes before the most recent one
    #[inline]
    pub fn read_delay(&self, delay: usize) -> f32 {
        debug_assert!(delay <= self.mask, "delay {} aliases in a {}-slot line", delay, self.len());
        self.buffer[self.index(delay)]
    }

    /// Linear interpolation between the two samples around `delay`
    ///
    /// Equals `read_delay(delay as usize)` exactly at integer delays.
    #[inline]
    pub fn read_delay_linear(&self, delay: f32) -> f32 {
        let (whole, frac) = Self::split(delay);
        let x0 = self.buffer[self.index(whole)];
        let x1 = self.buffer[self.index(whole + 1)];
        x0 + frac * (x1 - x0)
    }

    /// 4-point, 3rd-order Hermite (Catmull-Rom) interpolation
    #[inline]
    pub fn read_delay_cubic_hermite(&self, delay: f32) -> f32 {
        let (whole, frac) = Self::split(delay);
        let [xm1, x0, x1, x2] = self.neighbours(whole);

        let c0 = x0;
        let c1 = 0.5 * (x1 - xm1);
        let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
        let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);
        ((c3 * frac + c2) * frac + c1) * frac + c0
    }

    /// 4-point, 3rd-order optimal polynomial (2x oversampled input)
    #[inline]
    pub fn read_delay_cubic_optimal(&self, delay: f32) -> f32 {
        let (whole, frac) = Self::split(delay);
        let [xm1, x0, x1, x2] = self.neighbours(whole);

        let z = frac - 0.5;
        let even1 = x1 + x0;
        let odd1 = x1 - x0;
        let even2 = x2 + xm1;
        let odd2 = x2 - xm1;

        let c0 = even1 * 0.458_689_7 + even2 * 0.041_314_02;
        let c1 = odd1 * 0.480_680_25 + odd2 * 0.175_779_26;
        let c2 = even1 * -0.246_185 + even2 * 0.246_140_27;
        let c3 = odd1 * -0.360_309_25 + odd2 * 0.101_749_86;
        ((c3 * z + c2) * z + c1) * z + c0
    }

    /// 4-point, 2nd-order Watte tri-linear interpolation
    #[inline]
    pub fn read_delay_cubic_watte(&self, delay: f32) -> f32 {
        let (whole, frac) = Self::split(delay);
        let [xm1, x0, x1, x2] = self.neighbours(whole);

        let xm1_plus_x2 = xm1 + x2;
        let c0 = x0;
        let c1 = 1.5 * x1 - 0.5 * (x0 + xm1_plus_x2);
        let c2 = 0.5 * (xm1_plus_x2 - x0 - x1);
        (c2 * frac + c1) * frac + c0
    }

    /// Zero the buffer and the head, keeping the allocation
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }

    #[inline]
    fn index(&self, delay: usize) -> usize {
        self.head.wrapping_sub(1).wrapping_sub(delay) & self.mask
    }

    /// Samples at delays `whole - 1`, `whole`, `whole + 1`, `whole + 2`
    #[inline]
    fn neighbours(&self, whole: usize) -> [f32; 4] {
        let base = self.head.wrapping_sub(1).wrapping_sub(whole);
        [
            self.buffer[base.wrapping_add(1) & self.mask],
            self.buffer[base & self.mask],
            self.buffer[base.wrapping_sub(1) & self.mask],
            self.buffer[base.wrapping_sub(2) & self.mask],
        ]
    }

    #[inline]
    fn split(delay: f32) -> (usize, f32) {
        debug_assert!(delay >= 0.0, "negative delay {}", delay);
        let delay = delay.max(0.0);
        let whole = delay.floor();
        (whole as usize, delay - whole)
    }
}

impl Processor for DelayLine {
    /// Fixed full-length delay: returns the oldest sample, then stores the input
    fn process(&mut self, input: f32) -> f32 {
        let output = self.read();
        self.write(input);
        output
    }

    fn release(&mut self) {
        self.clear();
    }

    fn latency_samples(&self) -> usize {
        self.len()
    }
}
