//! Griesinger figure-eight tank
//!
//! ```text
//! x -> bandwidth lp -> 4 input diffusers -+-> left half --+
//!                                         |      ^        |
//!                                         |      +-- g ---|-- right half
//!                                         +-> right half -+
//! ```
//!
//! Each half runs a decay diffuser, a delay, a damping low-pass with the
//! decay gain, a second diffuser and a second delay. Each half feeds the
//! other. The output sums seven signed taps taken inside both halves.

use super::descriptor::{
    damping_coefficient, griesinger_decay_db, size_factor, LoopHalf, TankDescriptor, TapPoint,
    GRIESINGER, GRIESINGER_BANDWIDTH_DAMPING, GRIESINGER_LOOP, GRIESINGER_OUTPUT_GAIN,
    GRIESINGER_TAPS,
};
use super::TankTopology;
use crate::dsp::math::{db_to_linear, ms_to_samples, DEFAULT_SAMPLE_RATE};
use crate::dsp::{check_stable, AllPassFilter, DelayLine, OnePoleLowPass, Processor};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
struct Half {
    decay_diffuser: AllPassFilter,
    first: DelayLine,
    first_delay: usize,
    damper: OnePoleLowPass,
    damped_diffuser: AllPassFilter,
    second: DelayLine,
    second_delay: usize,
    /// Last output of the second delay
    output: f32,
}

impl Half {
    fn init(&mut self, layout: &LoopHalf, sample_rate: f32) {
        self.decay_diffuser
            .init(ms_to_samples(layout.decay_diffuser.0, sample_rate) + 1);
        self.first.init(ms_to_samples(layout.first_delay_ms, sample_rate) + 1);
        self.damped_diffuser
            .init(ms_to_samples(layout.damped_diffuser.0, sample_rate) + 1);
        self.second.init(ms_to_samples(layout.second_delay_ms, sample_rate) + 1);
        self.damper.reset();
        self.output = 0.0;
    }

    fn set(&mut self, layout: &LoopHalf, scale: f32, damping: f32, sample_rate: f32) -> Result<()> {
        let (ms, gain) = layout.decay_diffuser;
        self.decay_diffuser.set(ms_to_samples(ms * scale, sample_rate), gain)?;
        let (ms, gain) = layout.damped_diffuser;
        self.damped_diffuser.set(ms_to_samples(ms * scale, sample_rate), gain)?;
        self.damper.set_damping(damping)?;
        self.first_delay = ms_to_samples(layout.first_delay_ms * scale, sample_rate)
            .min(self.first.len());
        self.second_delay = ms_to_samples(layout.second_delay_ms * scale, sample_rate)
            .min(self.second.len());
        Ok(())
    }

    #[inline]
    fn process(&mut self, input: f32, decay: f32) -> f32 {
        let diffused = self.decay_diffuser.process(input);
        let delayed = self.first.read_delay(self.first_delay.saturating_sub(1));
        self.first.write(diffused);

        let damped = self.damper.process(delayed) * decay;
        let diffused = self.damped_diffuser.process(damped);
        self.output = self.second.read_delay(self.second_delay.saturating_sub(1));
        self.second.write(diffused);
        self.output
    }

    #[inline]
    fn tap(&self, point: TapPoint, offset: usize) -> f32 {
        match point {
            TapPoint::FirstDelay => self.first.read_delay(offset),
            TapPoint::Diffuser => self.damped_diffuser.tap(offset),
            TapPoint::SecondDelay => self.second.read_delay(offset),
        }
    }

    fn release(&mut self) {
        self.decay_diffuser.release();
        self.first.clear();
        self.damper.release();
        self.damped_diffuser.release();
        self.second.clear();
        self.output = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct GriesingerTank {
    bandwidth: OnePoleLowPass,
    input_diffusers: Vec<AllPassFilter>,
    halves: [Half; 2],
    /// Output tap offsets in samples, parallel to the tap table
    taps: [usize; GRIESINGER_TAPS.len()],
    decay: f32,
    loop_seconds: f32,
    /// Ring-down of the slowest decay diffuser, as heard at the taps
    diffuser_seconds: f32,
    sample_rate: f32,
}

impl Default for GriesingerTank {
    fn default() -> Self {
        Self::new()
    }
}

impl GriesingerTank {
    pub fn new() -> Self {
        Self {
            bandwidth: OnePoleLowPass::new(),
            input_diffusers: GRIESINGER
                .diffusers
                .iter()
                .map(|_| AllPassFilter::new())
                .collect(),
            halves: Default::default(),
            taps: [0; GRIESINGER_TAPS.len()],
            decay: 0.0,
            loop_seconds: 0.0,
            diffuser_seconds: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Loop gain, applied at each half's damper and again on the cross-feed
    pub fn decay(&self) -> f32 {
        self.decay
    }
}

impl TankTopology for GriesingerTank {
    fn descriptor(&self) -> &'static TankDescriptor {
        &GRIESINGER
    }

    fn init(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.bandwidth.reset();
        for (diffuser, (ms, _)) in self.input_diffusers.iter_mut().zip(GRIESINGER.diffusers) {
            diffuser.init(ms_to_samples(*ms, sample_rate) + 1);
        }
        for (half, layout) in self.halves.iter_mut().zip(&GRIESINGER_LOOP) {
            half.init(layout, sample_rate);
        }
    }

    fn set(&mut self, size: f32, damping: f32) -> Result<()> {
        let scale = size_factor(size);
        let decay = check_stable("griesinger decay", db_to_linear(griesinger_decay_db(size)))?;
        let damping = damping_coefficient(damping);

        self.bandwidth.set_damping(GRIESINGER_BANDWIDTH_DAMPING)?;
        for (diffuser, (ms, gain)) in self.input_diffusers.iter_mut().zip(GRIESINGER.diffusers) {
            diffuser.set(ms_to_samples(ms * scale, self.sample_rate), *gain)?;
        }
        for (half, layout) in self.halves.iter_mut().zip(&GRIESINGER_LOOP) {
            half.set(layout, scale, damping, self.sample_rate)?;
        }
        for (offset, tap) in self.taps.iter_mut().zip(&GRIESINGER_TAPS) {
            let half = &self.halves[tap.half];
            let limit = match tap.point {
                TapPoint::FirstDelay => half.first_delay,
                TapPoint::Diffuser => half.damped_diffuser.delay(),
                TapPoint::SecondDelay => half.second_delay,
            };
            *offset = ms_to_samples(tap.ms * scale, self.sample_rate).min(limit - 1);
        }

        self.decay = decay;
        let loop_ms: f32 = GRIESINGER_LOOP.iter().map(LoopHalf::total_ms).sum();
        self.loop_seconds = loop_ms * scale * 0.001;

        let ring = GRIESINGER_LOOP
            .iter()
            .map(|half| ring_seconds(half.decay_diffuser.0 * scale, half.decay_diffuser.1))
            .fold(0.0, f32::max);
        let onset_ms = GRIESINGER_TAPS
            .iter()
            .filter(|tap| tap.point == TapPoint::FirstDelay)
            .map(|tap| tap.ms)
            .fold(0.0, f32::max);
        self.diffuser_seconds = ring + onset_ms * scale * 0.001;
        log::debug!(
            "griesinger tank: decay {:.4}, loop {:.1} ms at {} Hz",
            decay,
            loop_ms * scale,
            self.sample_rate
        );
        Ok(())
    }

    /// The slower of two tails. A lap through both halves applies the
    /// decay gain four times and reaches the taps after half a lap. The
    /// decay diffusers feed the first-delay taps before any decay gain, so
    /// at small sizes their own ring-down outlasts the loop.
    fn decay_estimate_seconds(&self) -> f32 {
        let lap_db = -4.0 * 20.0 * self.decay.max(1.0e-6).log10();
        let looped = if lap_db > 0.0 {
            self.loop_seconds * (60.0 / lap_db + 0.5)
        } else {
            0.0
        };
        looped.max(self.diffuser_seconds)
    }
}

/// Seconds for an allpass of `delay_ms` and `gain` to ring down by 60 dB
fn ring_seconds(delay_ms: f32, gain: f32) -> f32 {
    let pass_db = -20.0 * gain.abs().max(1.0e-6).log10();
    delay_ms * 0.001 * 60.0 / pass_db
}

impl Processor for GriesingerTank {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let band_limited = self.bandwidth.process(input);
        let diffused = self
            .input_diffusers
            .iter_mut()
            .fold(band_limited, |x, diffuser| diffuser.process(x));

        let [left, right] = &mut self.halves;
        let left_in = diffused + self.decay * right.output;
        let right_in = diffused + self.decay * left.output;
        left.process(left_in, self.decay);
        right.process(right_in, self.decay);

        let sum: f32 = GRIESINGER_TAPS
            .iter()
            .zip(&self.taps)
            .map(|(tap, offset)| tap.sign * self.halves[tap.half].tap(tap.point, *offset))
            .sum();
        sum * GRIESINGER_OUTPUT_GAIN
    }

    fn release(&mut self) {
        self.bandwidth.release();
        for diffuser in &mut self.input_diffusers {
            diffuser.release();
        }
        for half in &mut self.halves {
            half.release();
        }
    }
}
