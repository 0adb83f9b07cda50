//! Topology descriptor tables
//!
//! Delay times are in milliseconds at size 1.0 and scale with
//! [`size_factor`]. Compensation breakpoints and the Griesinger taps are
//! empirical tunings and are kept exactly as measured.

use crate::dsp::math::{db_to_linear, lerp, remap};
use crate::error::{FxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comb feedback ceiling
pub const MAX_COMB_FEEDBACK: f32 = 0.995;

/// Share of the damping control applied to loop low-passes
pub const DAMPING_SCALE: f32 = 0.7;

/// Reverb topology selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankType {
    #[default]
    Schroeder,
    Moorer,
    Griesinger,
    Zazz,
}

impl TankType {
    pub const ALL: [TankType; 4] = [
        TankType::Schroeder,
        TankType::Moorer,
        TankType::Griesinger,
        TankType::Zazz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TankType::Schroeder => "schroeder",
            TankType::Moorer => "moorer",
            TankType::Griesinger => "griesinger",
            TankType::Zazz => "zazz",
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            TankType::Schroeder => 0,
            TankType::Moorer => 1,
            TankType::Griesinger => 2,
            TankType::Zazz => 3,
        }
    }

    pub fn descriptor(&self) -> &'static TankDescriptor {
        match self {
            TankType::Schroeder => &SCHROEDER,
            TankType::Moorer => &MOORER,
            TankType::Griesinger => &GRIESINGER,
            TankType::Zazz => &ZAZZ,
        }
    }
}

impl fmt::Display for TankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u32> for TankType {
    type Error = FxError;

    fn try_from(value: u32) -> Result<Self> {
        TankType::ALL
            .into_iter()
            .find(|kind| kind.index() == value)
            .ok_or_else(|| FxError::UnknownTankType {
                value: value.to_string(),
            })
    }
}

/// Accepts a name (any case) or an index
impl FromStr for TankType {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<u32>() {
            return TankType::try_from(index);
        }
        TankType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| FxError::UnknownTankType {
                value: s.to_string(),
            })
    }
}

/// Immutable description of one topology
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankDescriptor {
    pub kind: TankType,
    /// Parallel comb delays
    pub comb_ms: &'static [f32],
    /// Series allpass diffusers as `(ms, gain)`
    pub diffusers: &'static [(f32, f32)],
    /// Early reflection taps as `(ms, gain)`
    pub early_taps: &'static [(f32, f32)],
    /// Output compensation in dB at size 0 and size 1
    pub compensation_db: (f32, f32),
}

impl TankDescriptor {
    /// Output gain for `size`
    pub fn compensation(&self, size: f32) -> f32 {
        let (at_zero, at_one) = self.compensation_db;
        db_to_linear(lerp(at_zero, at_one, size.clamp(0.0, 1.0)))
    }

    /// Longest delay the topology asks for at size 1.0
    pub fn max_delay_ms(&self) -> f32 {
        self.comb_ms
            .iter()
            .chain(self.diffusers.iter().map(|(ms, _)| ms))
            .chain(self.early_taps.iter().map(|(ms, _)| ms))
            .fold(0.0, |max, ms| max.max(*ms))
    }
}

pub const SCHROEDER: TankDescriptor = TankDescriptor {
    kind: TankType::Schroeder,
    comb_ms: &[29.7, 37.1, 41.1, 43.7],
    diffusers: &[],
    early_taps: &[],
    compensation_db: (-3.0, -12.0),
};

pub const MOORER: TankDescriptor = TankDescriptor {
    kind: TankType::Moorer,
    comb_ms: &[50.0, 56.0, 61.0, 68.0, 72.0, 78.0],
    diffusers: &[(6.0, 0.7)],
    early_taps: &[
        (4.3, 0.841),
        (21.5, 0.504),
        (22.5, 0.491),
        (26.8, 0.379),
        (27.0, 0.380),
        (29.8, 0.346),
        (45.8, 0.289),
        (48.5, 0.272),
        (57.2, 0.192),
        (58.7, 0.193),
        (59.5, 0.217),
        (61.2, 0.181),
        (70.7, 0.180),
        (70.8, 0.181),
        (72.6, 0.176),
        (74.1, 0.142),
        (75.3, 0.167),
        (79.7, 0.134),
    ],
    compensation_db: (-6.0, -15.0),
};

/// Input diffusers only; the figure-eight loop lives in [`GRIESINGER_LOOP`]
pub const GRIESINGER: TankDescriptor = TankDescriptor {
    kind: TankType::Griesinger,
    comb_ms: &[],
    diffusers: &[(4.771, 0.75), (3.595, 0.75), (12.735, 0.625), (9.307, 0.625)],
    early_taps: &[],
    compensation_db: (0.0, -9.0),
};

pub const ZAZZ: TankDescriptor = TankDescriptor {
    kind: TankType::Zazz,
    comb_ms: &[53.9, 67.3, 83.9, 101.3],
    diffusers: &[],
    early_taps: &[],
    compensation_db: (-3.0, -13.5),
};

/// One half of the figure-eight loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopHalf {
    pub decay_diffuser: (f32, f32),
    pub first_delay_ms: f32,
    pub damped_diffuser: (f32, f32),
    pub second_delay_ms: f32,
}

impl LoopHalf {
    pub fn total_ms(&self) -> f32 {
        self.decay_diffuser.0 + self.first_delay_ms + self.damped_diffuser.0 + self.second_delay_ms
    }
}

/// Left and right halves
pub const GRIESINGER_LOOP: [LoopHalf; 2] = [
    LoopHalf {
        decay_diffuser: (22.580, -0.7),
        first_delay_ms: 149.625,
        damped_diffuser: (60.482, 0.5),
        second_delay_ms: 124.996,
    },
    LoopHalf {
        decay_diffuser: (30.510, -0.7),
        first_delay_ms: 141.696,
        damped_diffuser: (89.244, 0.5),
        second_delay_ms: 106.280,
    },
];

/// Point inside the loop an output tap reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapPoint {
    FirstDelay,
    Diffuser,
    SecondDelay,
}

/// Output tap: loop half, point, offset in ms, sign
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputTap {
    pub half: usize,
    pub point: TapPoint,
    pub ms: f32,
    pub sign: f32,
}

pub const GRIESINGER_TAPS: [OutputTap; 7] = [
    OutputTap { half: 1, point: TapPoint::FirstDelay, ms: 8.938, sign: 1.0 },
    OutputTap { half: 1, point: TapPoint::FirstDelay, ms: 99.929, sign: 1.0 },
    OutputTap { half: 1, point: TapPoint::Diffuser, ms: 64.279, sign: -1.0 },
    OutputTap { half: 1, point: TapPoint::SecondDelay, ms: 67.068, sign: 1.0 },
    OutputTap { half: 0, point: TapPoint::FirstDelay, ms: 66.866, sign: -1.0 },
    OutputTap { half: 0, point: TapPoint::Diffuser, ms: 6.283, sign: -1.0 },
    OutputTap { half: 0, point: TapPoint::SecondDelay, ms: 35.819, sign: -1.0 },
];

/// Summed tap scale
pub const GRIESINGER_OUTPUT_GAIN: f32 = 0.6;

/// Input bandwidth low-pass pole
pub const GRIESINGER_BANDWIDTH_DAMPING: f32 = 0.0005;

/// Delay scaling for the room size control
#[inline]
pub fn size_factor(size: f32) -> f32 {
    remap(size.clamp(0.0, 1.0), 0.0, 1.0, 0.25, 1.0)
}

/// Reverberation time of the comb topologies in seconds
#[inline]
pub fn rt60_seconds(size: f32) -> f32 {
    remap(size.clamp(0.0, 1.0), 0.0, 1.0, 0.1, 3.0)
}

/// Feedback that decays a comb of `delay` samples by 60 dB in `rt60` seconds
#[inline]
pub fn comb_feedback(delay: usize, rt60: f32, sample_rate: f32) -> f32 {
    10.0_f32
        .powf(-3.0 * delay as f32 / (rt60 * sample_rate))
        .min(MAX_COMB_FEEDBACK)
}

/// Loop decay of the figure-eight tank in dB per pass
#[inline]
pub fn griesinger_decay_db(size: f32) -> f32 {
    remap(size.clamp(0.0, 1.0), 0.0, 1.0, -60.0, -3.0)
}

/// Loop low-pass pole for the damping control
#[inline]
pub fn damping_coefficient(damping: f32) -> f32 {
    damping.clamp(0.0, 1.0) * DAMPING_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test_case("schroeder", TankType::Schroeder ; "name")]
    #[test_case("Griesinger", TankType::Griesinger ; "mixed case")]
    #[test_case(" zazz ", TankType::Zazz ; "padded")]
    #[test_case("1", TankType::Moorer ; "index")]
    fn test_parse_tank_type(input: &str, expected: TankType) {
        assert_eq!(input.parse::<TankType>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_tank_type() {
        let err = "plate".parse::<TankType>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_TANK_TYPE");
        assert!(TankType::try_from(4).is_err());
        assert!("7".parse::<TankType>().is_err());
    }

    #[test]
    fn test_size_mappings() {
        assert_abs_diff_eq!(size_factor(0.0), 0.25);
        assert_abs_diff_eq!(size_factor(1.0), 1.0);
        assert_abs_diff_eq!(rt60_seconds(0.5), 1.55, epsilon = 1e-6);
        assert_abs_diff_eq!(griesinger_decay_db(1.0), -3.0);
    }

    #[test]
    fn test_comb_feedback_reaches_minus_60_db() {
        let delay = 1426;
        let g = comb_feedback(delay, 1.5, 48000.0);
        let passes = 1.5 * 48000.0 / delay as f32;
        assert_abs_diff_eq!(20.0 * (g.powf(passes)).log10(), -60.0, epsilon = 0.01);
        assert_eq!(comb_feedback(5000, 1000.0, 48000.0), MAX_COMB_FEEDBACK);
    }

    #[test]
    fn test_compensation_breakpoints() {
        assert_abs_diff_eq!(SCHROEDER.compensation(0.0), db_to_linear(-3.0));
        assert_abs_diff_eq!(ZAZZ.compensation(1.0), db_to_linear(-13.5));
        assert_abs_diff_eq!(MOORER.compensation(0.5), db_to_linear(-10.5), epsilon = 1e-6);
    }

    #[test]
    fn test_tables_are_stable() {
        for descriptor in TankType::ALL.iter().map(|kind| kind.descriptor()) {
            assert!(descriptor.diffusers.iter().all(|(_, g)| g.abs() < 1.0));
        }
        for half in &GRIESINGER_LOOP {
            assert!(half.decay_diffuser.1.abs() < 1.0);
            assert!(half.damped_diffuser.1.abs() < 1.0);
        }
        assert_abs_diff_eq!(MOORER.max_delay_ms(), 79.7);
    }

    #[test]
    fn test_taps_fit_inside_their_lines() {
        for tap in &GRIESINGER_TAPS {
            let half = &GRIESINGER_LOOP[tap.half];
            let len = match tap.point {
                TapPoint::FirstDelay => half.first_delay_ms,
                TapPoint::Diffuser => half.damped_diffuser.0,
                TapPoint::SecondDelay => half.second_delay_ms,
            };
            assert!(tap.ms < len);
        }
    }
}
