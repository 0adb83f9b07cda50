//! Biquad filter: coefficient design and four processing topologies
//!
//! Coefficients follow the Audio EQ Cookbook bilinear-transform formulas
//! and are normalized by `a0`:
//!
//! ```text
//! H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
//! ```
//!
//! The same transfer function can be run through four structures. Each
//! keeps its own history layout, so the topology is fixed per instance and
//! switching it clears the history.

use super::math::DEFAULT_SAMPLE_RATE;
use super::processor::Processor;
use crate::error::{clamp_param, FxError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lowest accepted corner/center frequency in Hz
pub const MIN_FREQUENCY: f32 = 1.0;
/// Highest accepted frequency as a fraction of the sample rate
pub const MAX_FREQUENCY_RATIO: f32 = 0.499;
/// Q range accepted by the setters
pub const MIN_Q: f32 = 0.025;
pub const MAX_Q: f32 = 40.0;
/// Gain range accepted by peak and shelf setters
pub const MIN_GAIN_DB: f32 = -48.0;
pub const MAX_GAIN_DB: f32 = 48.0;

/// Added ahead of the DF-II feedback sum to keep the recursion out of
/// subnormal range on sustained near-silence
const DENORMAL_GUARD: f32 = 1.0e-20;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Remove above frequency
    #[default]
    LowPass,
    /// Remove below frequency
    HighPass,
    /// Band-pass, peak gain equals Q
    BandPassSkirtGain,
    /// Band-pass, 0 dB peak gain
    BandPassPeakGain,
    /// Reject a narrow band
    Notch,
    /// Flat magnitude, phase rotation around frequency
    AllPass,
    /// Bell curve boost/cut
    Peak,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
}

impl FilterKind {
    /// Whether this shape uses the gain parameter
    pub fn uses_gain(self) -> bool {
        matches!(self, FilterKind::Peak | FilterKind::LowShelf | FilterKind::HighShelf)
    }
}

/// Processing structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Separate input and output histories; robust default
    #[default]
    DirectForm1,
    /// Single shared state; sensitive to coefficient quantization at low frequencies
    DirectForm2,
    /// All-pole section first, then all-zero section, both transposed
    DirectForm1Transposed,
    /// Two state variables fed by input and output
    DirectForm2Transposed,
}

/// Normalized biquad coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Pass-through coefficients
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Calculate coefficients using Audio EQ Cookbook formulas
    ///
    /// Inputs are assumed already clamped to their valid domain.
    pub fn design(kind: FilterKind, sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        let w0 = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q as f64);
        let q = q as f64;

        // Amplitude for peak and shelf shapes
        let a = 10.0_f64.powf(gain_db as f64 / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::BandPassSkirtGain => (
                q * alpha,
                0.0,
                -q * alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::BandPassPeakGain => (
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Notch => (
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::AllPass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterKind::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterKind::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        // Normalize by a0
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db_at(&self, frequency: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 as f64 + self.b1 as f64 * c1 + self.b2 as f64 * c2;
        let num_im = -(self.b1 as f64 * s1 + self.b2 as f64 * s2);
        let den_re = 1.0 + self.a1 as f64 * c1 + self.a2 as f64 * c2;
        let den_im = -(self.a1 as f64 * s1 + self.a2 as f64 * s2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        if den <= 0.0 || num <= 0.0 {
            return crate::dsp::math::SILENCE_DB;
        }
        (10.0 * (num / den).log10()) as f32
    }

    /// Whether the poles sit strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        // Jury conditions for 1 + a1 z^-1 + a2 z^-2
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

/// Biquad parameters, serializable for config bundles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiquadParams {
    pub kind: FilterKind,
    /// Corner/center frequency in Hz
    pub frequency: f32,
    /// Q factor
    pub q: f32,
    /// Gain in dB (peak and shelf shapes only)
    pub gain_db: f32,
    pub topology: Topology,
}

impl Default for BiquadParams {
    fn default() -> Self {
        Self {
            kind: FilterKind::LowPass,
            frequency: 1000.0,
            q: std::f32::consts::FRAC_1_SQRT_2,
            gain_db: 0.0,
            topology: Topology::DirectForm1,
        }
    }
}

impl BiquadParams {
    /// Validate parameters against their ranges
    ///
    /// The upper frequency bound depends on the sample rate and is
    /// enforced by the filter itself.
    pub fn validate(&self) -> Result<()> {
        if !(self.frequency.is_finite() && self.frequency >= MIN_FREQUENCY) {
            return Err(FxError::invalid_parameter(
                "frequency",
                self.frequency,
                MIN_FREQUENCY,
                f32::MAX,
            ));
        }
        if !(MIN_Q..=MAX_Q).contains(&self.q) {
            return Err(FxError::invalid_parameter("q", self.q, MIN_Q, MAX_Q));
        }
        if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&self.gain_db) {
            return Err(FxError::invalid_parameter(
                "gain_db",
                self.gain_db,
                MIN_GAIN_DB,
                MAX_GAIN_DB,
            ));
        }
        Ok(())
    }

    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.frequency = self.frequency.max(MIN_FREQUENCY);
        self.q = self.q.clamp(MIN_Q, MAX_Q);
        self.gain_db = self.gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
    }
}

/// Second-order IIR filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoefficients,
    topology: Topology,
    /// History; meaning depends on topology:
    /// DF-I `[x1, x2, y1, y2]`, DF-II `[w1, w2, -, -]`,
    /// DF-I transposed `[p1, p2, z1, z2]`, DF-II transposed `[s1, s2, -, -]`
    state: [f32; 4],
    sample_rate: f32,
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BiquadFilter {
    /// Create a pass-through Direct-Form I filter at the default sample rate
    pub fn new() -> Self {
        Self::with_topology(Topology::DirectForm1)
    }

    /// Create a pass-through filter with the given topology
    pub fn with_topology(topology: Topology) -> Self {
        Self {
            coeffs: BiquadCoefficients::IDENTITY,
            topology,
            state: [0.0; 4],
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Set the sample rate used by the coefficient setters
    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        self.sample_rate = clamp_param("sample_rate", sample_rate, 1000.0, 768_000.0)?;
        self.state = [0.0; 4];
        Ok(())
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Switch topology; the history is cleared since layouts differ
    pub fn set_topology(&mut self, topology: Topology) {
        if topology != self.topology {
            self.topology = topology;
            self.state = [0.0; 4];
        }
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    /// Install precomputed coefficients, keeping the history
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    /// Configure from a params value
    pub fn set(&mut self, params: &BiquadParams) -> Result<()> {
        self.set_topology(params.topology);
        self.design(params.kind, params.frequency, params.q, params.gain_db)
    }

    pub fn set_low_pass(&mut self, frequency: f32, q: f32) -> Result<()> {
        self.design(FilterKind::LowPass, frequency, q, 0.0)
    }

    pub fn set_high_pass(&mut self, frequency: f32, q: f32) -> Result<()> {
        self.design(FilterKind::HighPass, frequency, q, 0.0)
    }

    /// Band-pass with constant skirt gain (peak gain = Q)
    pub fn set_band_pass_skirt_gain(&mut self, frequency: f32, q: f32) -> Result<()> {
        self.design(FilterKind::BandPassSkirtGain, frequency, q, 0.0)
    }

    /// Band-pass with constant 0 dB peak gain
    pub fn set_band_pass_peak_gain(&mut self, frequency: f32, q: f32) -> Result<()> {
        self.design(FilterKind::BandPassPeakGain, frequency, q, 0.0)
    }

    pub fn set_notch(&mut self, frequency: f32, q: f32) -> Result<()> {
        self.design(FilterKind::Notch, frequency, q, 0.0)
    }

    pub fn set_all_pass(&mut self, frequency: f32, q: f32) -> Result<()> {
        self.design(FilterKind::AllPass, frequency, q, 0.0)
    }

    pub fn set_peak(&mut self, frequency: f32, q: f32, gain_db: f32) -> Result<()> {
        self.design(FilterKind::Peak, frequency, q, gain_db)
    }

    pub fn set_low_shelf(&mut self, frequency: f32, q: f32, gain_db: f32) -> Result<()> {
        self.design(FilterKind::LowShelf, frequency, q, gain_db)
    }

    pub fn set_high_shelf(&mut self, frequency: f32, q: f32, gain_db: f32) -> Result<()> {
        self.design(FilterKind::HighShelf, frequency, q, gain_db)
    }

    /// Validate, clamp and install a cookbook design
    ///
    /// On error the previous coefficients stay in place.
    fn design(&mut self, kind: FilterKind, frequency: f32, q: f32, gain_db: f32) -> Result<()> {
        let max_frequency = self.sample_rate * MAX_FREQUENCY_RATIO;
        let frequency = clamp_param("frequency", frequency, MIN_FREQUENCY, max_frequency)?;
        let q = clamp_param("q", q, MIN_Q, MAX_Q)?;
        let gain_db = clamp_param("gain_db", gain_db, MIN_GAIN_DB, MAX_GAIN_DB)?;

        self.coeffs = BiquadCoefficients::design(kind, self.sample_rate, frequency, q, gain_db);
        Ok(())
    }

    /// Magnitude response of the current coefficients in dB
    pub fn magnitude_db_at(&self, frequency: f32) -> f32 {
        self.coeffs.magnitude_db_at(frequency, self.sample_rate)
    }

    /// Clear the history, keeping coefficients
    pub fn reset(&mut self) {
        self.state = [0.0; 4];
    }

    #[inline]
    fn process_df1(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let [x1, x2, y1, y2] = self.state;
        let y = c.b0 * x + c.b1 * x1 + c.b2 * x2 - c.a1 * y1 - c.a2 * y2;
        self.state = [x, x1, y, y1];
        y
    }

    #[inline]
    fn process_df2(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let [w1, w2, _, _] = self.state;
        let w = x + DENORMAL_GUARD - c.a1 * w1 - c.a2 * w2;
        let y = c.b0 * w + c.b1 * w1 + c.b2 * w2;
        self.state[0] = w;
        self.state[1] = w1;
        y
    }

    #[inline]
    fn process_df1_transposed(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let [p1, p2, z1, z2] = self.state;
        // All-pole section
        let w = x + p1;
        let p1 = -c.a1 * w + p2;
        let p2 = -c.a2 * w;
        // All-zero section
        let y = c.b0 * w + z1;
        let z1 = c.b1 * w + z2;
        let z2 = c.b2 * w;
        self.state = [p1, p2, z1, z2];
        y
    }

    #[inline]
    fn process_df2_transposed(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let [s1, s2, _, _] = self.state;
        let y = c.b0 * x + s1;
        self.state[0] = c.b1 * x - c.a1 * y + s2;
        self.state[1] = c.b2 * x - c.a2 * y;
        y
    }
}

impl Processor for BiquadFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        match self.topology {
            Topology::DirectForm1 => self.process_df1(input),
            Topology::DirectForm2 => self.process_df2(input),
            Topology::DirectForm1Transposed => self.process_df1_transposed(input),
            Topology::DirectForm2Transposed => self.process_df2_transposed(input),
        }
    }

    /// Zero coefficients and history, restore the default sample rate
    fn release(&mut self) {
        self.coeffs = BiquadCoefficients::default();
        self.state = [0.0; 4];
        self.sample_rate = DEFAULT_SAMPLE_RATE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{calculate_rms, sine_wave};
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    const ALL_TOPOLOGIES: [Topology; 4] = [
        Topology::DirectForm1,
        Topology::DirectForm2,
        Topology::DirectForm1Transposed,
        Topology::DirectForm2Transposed,
    ];

    fn settle(filter: &mut BiquadFilter, input: f32, samples: usize) -> f32 {
        let mut out = 0.0;
        for _ in 0..samples {
            out = filter.process(input);
        }
        out
    }

    fn gain_db(filter: &mut BiquadFilter, frequency: f32, sample_rate: f32) -> f32 {
        let input = sine_wave(frequency, sample_rate, 9600);
        let mut output = input.clone();
        filter.process_block(&mut output);
        // Skip the transient
        let rms_in = calculate_rms(&input[4800..]);
        let rms_out = calculate_rms(&output[4800..]);
        20.0 * (rms_out / rms_in).log10()
    }

    #[test_case(Topology::DirectForm1 ; "df1")]
    #[test_case(Topology::DirectForm2 ; "df2")]
    #[test_case(Topology::DirectForm1Transposed ; "df1 transposed")]
    #[test_case(Topology::DirectForm2Transposed ; "df2 transposed")]
    fn test_low_pass_unity_dc_gain(topology: Topology) {
        let mut filter = BiquadFilter::with_topology(topology);
        filter.init(48000.0).unwrap();
        filter.set_low_pass(1000.0, 0.707).unwrap();
        assert_abs_diff_eq!(settle(&mut filter, 1.0, 4800), 1.0, epsilon = 1e-4);
    }

    #[test_case(Topology::DirectForm1 ; "df1")]
    #[test_case(Topology::DirectForm2 ; "df2")]
    #[test_case(Topology::DirectForm1Transposed ; "df1 transposed")]
    #[test_case(Topology::DirectForm2Transposed ; "df2 transposed")]
    fn test_high_pass_blocks_dc(topology: Topology) {
        let mut filter = BiquadFilter::with_topology(topology);
        filter.init(48000.0).unwrap();
        filter.set_high_pass(1000.0, 0.707).unwrap();
        assert_abs_diff_eq!(settle(&mut filter, 1.0, 4800), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_topologies_agree() {
        let input = sine_wave(440.0, 48000.0, 2000);
        let mut outputs = Vec::new();
        for topology in ALL_TOPOLOGIES {
            let mut filter = BiquadFilter::with_topology(topology);
            filter.init(48000.0).unwrap();
            filter.set_peak(500.0, 1.2, 6.0).unwrap();
            let mut buffer = input.clone();
            filter.process_block(&mut buffer);
            outputs.push(buffer);
        }
        for other in &outputs[1..] {
            for (a, b) in outputs[0].iter().zip(other) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_low_pass_end_to_end() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();
        filter.set_low_pass(1000.0, 0.707).unwrap();

        let passband = gain_db(&mut filter, 100.0, 48000.0);
        assert!(passband > -0.5, "100 Hz attenuated by {} dB", passband);

        filter.reset();
        let stopband = gain_db(&mut filter, 10000.0, 48000.0);
        assert!(stopband < -20.0, "10 kHz only attenuated by {} dB", stopband);
    }

    #[test]
    fn test_peak_gain_at_center() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();
        filter.set_peak(1000.0, 1.0, 6.0).unwrap();
        assert_abs_diff_eq!(filter.magnitude_db_at(1000.0), 6.0, epsilon = 0.01);
        assert!(filter.magnitude_db_at(50.0).abs() < 0.5);
    }

    #[test]
    fn test_shelves() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();

        filter.set_low_shelf(200.0, 0.707, -12.0).unwrap();
        assert_abs_diff_eq!(filter.magnitude_db_at(10.0), -12.0, epsilon = 0.1);
        assert!(filter.magnitude_db_at(10000.0).abs() < 0.1);

        filter.set_high_shelf(5000.0, 0.707, 9.0).unwrap();
        assert_abs_diff_eq!(filter.magnitude_db_at(23000.0), 9.0, epsilon = 0.2);
        assert!(filter.magnitude_db_at(50.0).abs() < 0.1);
    }

    #[test]
    fn test_band_pass_variants() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();

        filter.set_band_pass_peak_gain(1000.0, 2.0).unwrap();
        assert_abs_diff_eq!(filter.magnitude_db_at(1000.0), 0.0, epsilon = 0.01);

        filter.set_band_pass_skirt_gain(1000.0, 2.0).unwrap();
        assert_abs_diff_eq!(filter.magnitude_db_at(1000.0), 20.0 * 2.0_f32.log10(), epsilon = 0.01);
    }

    #[test]
    fn test_notch_and_all_pass() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();

        filter.set_notch(1000.0, 1.0).unwrap();
        assert!(filter.magnitude_db_at(1000.0) < -60.0);

        filter.set_all_pass(1000.0, 1.0).unwrap();
        for f in [50.0, 1000.0, 12000.0] {
            assert_abs_diff_eq!(filter.magnitude_db_at(f), 0.0, epsilon = 0.01);
        }
    }

    #[test]
    fn test_out_of_range_parameters_clamped() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();
        filter.set_low_pass(1000.0, 0.0).unwrap();
        assert!(filter.coefficients().is_stable());
        filter.set_low_pass(-100.0, 0.707).unwrap();
        assert_eq!(
            filter.coefficients(),
            BiquadCoefficients::design(FilterKind::LowPass, 48000.0, MIN_FREQUENCY, 0.707, 0.0)
        );

        filter.set_low_pass(1.0e6, 1.0e6).unwrap();
        assert!(filter.coefficients().is_stable());
    }

    #[test]
    fn test_non_finite_parameters_rejected() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();
        filter.set_low_pass(1000.0, 0.707).unwrap();
        let before = filter.coefficients();

        assert!(filter.set_low_pass(f32::NAN, 0.707).is_err());
        assert!(filter.set_peak(1000.0, 1.0, f32::INFINITY).is_err());
        assert_eq!(filter.coefficients(), before);
    }

    #[test]
    fn test_df2_denormal_guard_on_silence() {
        let mut filter = BiquadFilter::with_topology(Topology::DirectForm2);
        filter.init(48000.0).unwrap();
        filter.set_low_pass(20.0, 0.707).unwrap();
        filter.process(1.0);
        for _ in 0..200_000 {
            let y = filter.process(0.0);
            assert!(y == 0.0 || y.is_normal() || y.abs() < 1.0e-15);
        }
    }

    #[test]
    fn test_set_topology_clears_history() {
        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();
        filter.set_low_pass(1000.0, 0.707).unwrap();
        settle(&mut filter, 1.0, 100);
        filter.set_topology(Topology::DirectForm2Transposed);
        // Fresh history: the first output is b0 * x
        let b0 = filter.coefficients().b0;
        assert_abs_diff_eq!(filter.process(1.0), b0);
    }

    #[test]
    fn test_release_zeroes_everything() {
        let mut filter = BiquadFilter::new();
        filter.init(96000.0).unwrap();
        filter.set_low_pass(1000.0, 0.707).unwrap();
        settle(&mut filter, 1.0, 10);

        filter.release();
        assert_eq!(filter.coefficients(), BiquadCoefficients::default());
        assert_eq!(filter.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(filter.process(1.0), 0.0);
    }

    #[test]
    fn test_params_roundtrip() {
        let params = BiquadParams {
            kind: FilterKind::Peak,
            frequency: 2500.0,
            q: 1.5,
            gain_db: -4.0,
            topology: Topology::DirectForm2Transposed,
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: BiquadParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
        assert!(back.validate().is_ok());

        let mut filter = BiquadFilter::new();
        filter.init(48000.0).unwrap();
        filter.set(&back).unwrap();
        assert_eq!(filter.topology(), Topology::DirectForm2Transposed);
        assert_abs_diff_eq!(filter.magnitude_db_at(2500.0), -4.0, epsilon = 0.01);
    }

    #[test]
    fn test_params_validate_and_clamp() {
        let mut params = BiquadParams {
            q: 100.0,
            gain_db: -60.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        params.clamp();
        assert!(params.validate().is_ok());
        assert_eq!(params.q, MAX_Q);
        assert_eq!(params.gain_db, MIN_GAIN_DB);
    }
}
