//! Time-domain DSP primitives
//!
//! Leaf building blocks shared by every effect in the bundle. All of them
//! implement [`Processor`] (followers implement [`EnvelopeFollower`]) and
//! follow the same lifecycle: construct, `init` (allocation point), `set`
//! (coefficients and lengths), `process` (real-time), `release`.

mod band_stop;
mod biquad;
mod clipper;
mod comb;
mod delay_line;
mod envelope;
pub mod math;
mod one_pole;
mod processor;
mod transient;

pub use band_stop::{
    design_band_stop, BandStop, BAND_STOP_ATTENUATION_DB, BAND_STOP_SECTIONS, MAX_EDGE_RATIO,
};
pub use biquad::{
    BiquadCoefficients, BiquadFilter, BiquadParams, FilterKind, Topology, MAX_FREQUENCY_RATIO,
    MAX_GAIN_DB, MAX_Q, MIN_FREQUENCY, MIN_GAIN_DB, MIN_Q,
};
pub use clipper::{clip_sample, ClipMode, Clipper, ClipperParams};
pub use comb::{AllPassFilter, CombFilter};
pub(crate) use comb::check_stable;
pub use delay_line::DelayLine;
pub use envelope::{
    BranchingFollower, EnvelopeFollower, EnvelopeParams, HoldFollower, PeakDetector, RmsFollower,
};
pub use one_pole::OnePoleLowPass;
pub use processor::Processor;
pub use transient::{TransientParams, TransientShaper};
