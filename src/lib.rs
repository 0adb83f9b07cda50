//! fxcore - Real-time DSP core for audio effect plugins
//!
//! fxcore holds the signal processing shared by a bundle of effects:
//! 1. Time-domain primitives - delay lines, biquads, envelope followers,
//!    comb/allpass elements, a transient shaper and a clipper
//! 2. Frequency-domain engine - STFT analysis/resynthesis and a
//!    forward-only spectrum analyzer
//! 3. Effects built on both - six-band spectrum matching and four
//!    feedback delay network reverbs
//!
//! # Lifecycle
//!
//! Every component follows the same sequence: construct, `init` (the
//! allocation point), `set` (retune, cheap enough per block), `process`
//! (per sample, never allocates, locks or fails) and `release` (zero the
//! state, keep the buffers). Errors only come out of `init` and `set`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod error;
pub mod matching;
pub mod reverb;
pub mod spectral;

pub use config::FxConfig;
pub use dsp::Processor;
pub use error::{FxError, Result};
