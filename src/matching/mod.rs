//! Six-band spectrum matching
//!
//! Measures the relative loudness of six octave-pair bands (20 Hz to
//! 20 kHz), normalizes them so their mean is 1, and steers a per-band
//! correction towards user targets. [`SpectrumMatch`] corrects with a
//! biquad cascade and either detector; [`SpectrumMatchFft`] corrects
//! per bin inside an STFT.

mod bands;
mod detector;
mod fft_match;
mod gain;
mod pipeline;

pub use bands::{
    band_times, centers_for, correction_db, mute_edges, normalize, BandParams, DetectorKind,
    SpectrumMatchParams, ATTENUATION, BAND_CENTERS_HZ, BAND_EDGES_HZ, BAND_Q, LEVEL_EPSILON,
    MAX_CORRECTION_DB, NUM_BANDS,
};
pub use detector::{
    band_bin_ranges, BandDetector, BandSmoother, Detector, FrequencyDomainDetector,
    TimeDomainDetector, NOISE_BANDWIDTH_CORRECTION,
};
pub use fft_match::SpectrumMatchFft;
pub use gain::{BandGainStage, GAIN_UPDATE_THRESHOLD_DB};
pub use pipeline::SpectrumMatch;
