//! Frequency-domain analysis and resynthesis
//!
//! The FFT is consumed through [`FftBackend`]; the shipped backend wraps
//! `rustfft`. [`Stft`] does full overlap-add resynthesis, and
//! [`SpectrumAnalyzer`] is its forward-only sibling for metering and
//! detection.

mod analyzer;
mod fft;
mod fifo;
mod stft;
pub mod window;

pub use analyzer::{band_mean_square, bin_range, SpectrumAnalyzer};
pub use fft::{FftBackend, RustFftBackend};
pub use rustfft::num_complex::Complex32;
pub use stft::{SpectralProcessor, Stft, StftParams, MAX_FRAME_SIZE, MIN_FRAME_SIZE, MIN_OVERLAP};
