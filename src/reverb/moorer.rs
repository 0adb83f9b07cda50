//! Moorer tank
//!
//! An 18-tap early reflection bank read from one delay buffer, then six
//! damped combs fed from the last tap and a single allpass diffuser.

use super::descriptor::{
    comb_feedback, damping_coefficient, rt60_seconds, size_factor, TankDescriptor, MOORER,
};
use super::TankTopology;
use crate::dsp::math::{ms_to_samples, DEFAULT_SAMPLE_RATE};
use crate::dsp::{AllPassFilter, CombFilter, DelayLine, Processor};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct MoorerTank {
    early: DelayLine,
    /// Tap offsets in samples, parallel to the descriptor's gains
    taps: Vec<usize>,
    combs: Vec<CombFilter>,
    diffuser: AllPassFilter,
    sample_rate: f32,
    rt60: f32,
}

impl Default for MoorerTank {
    fn default() -> Self {
        Self::new()
    }
}

impl MoorerTank {
    pub fn new() -> Self {
        Self {
            early: DelayLine::new(),
            taps: vec![0; MOORER.early_taps.len()],
            combs: MOORER.comb_ms.iter().map(|_| CombFilter::new()).collect(),
            diffuser: AllPassFilter::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            rt60: rt60_seconds(0.0),
        }
    }

    /// Tap offsets currently in use, in samples
    pub fn tap_offsets(&self) -> &[usize] {
        &self.taps
    }
}

impl TankTopology for MoorerTank {
    fn descriptor(&self) -> &'static TankDescriptor {
        &MOORER
    }

    fn init(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let longest_tap = MOORER
            .early_taps
            .iter()
            .fold(0.0_f32, |max, (ms, _)| max.max(*ms));
        self.early.init(ms_to_samples(longest_tap, sample_rate) + 1);
        for (comb, ms) in self.combs.iter_mut().zip(MOORER.comb_ms) {
            comb.init(ms_to_samples(*ms, sample_rate) + 1);
        }
        for (ms, _) in MOORER.diffusers {
            self.diffuser.init(ms_to_samples(*ms, sample_rate) + 1);
        }
    }

    fn set(&mut self, size: f32, damping: f32) -> Result<()> {
        let scale = size_factor(size);
        let rt60 = rt60_seconds(size);
        let damping = damping_coefficient(damping);

        let max_tap = self.early.max_delay();
        for (tap, (ms, _)) in self.taps.iter_mut().zip(MOORER.early_taps) {
            *tap = ms_to_samples(ms * scale, self.sample_rate).min(max_tap);
        }
        for (comb, ms) in self.combs.iter_mut().zip(MOORER.comb_ms) {
            let delay = ms_to_samples(ms * scale, self.sample_rate);
            comb.set(delay, comb_feedback(delay, rt60, self.sample_rate), damping)?;
        }
        for (ms, gain) in MOORER.diffusers {
            self.diffuser
                .set(ms_to_samples(ms * scale, self.sample_rate), *gain)?;
        }
        self.rt60 = rt60;
        Ok(())
    }

    fn decay_estimate_seconds(&self) -> f32 {
        self.rt60
    }
}

impl Processor for MoorerTank {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.early.write(input);
        let early: f32 = self
            .taps
            .iter()
            .zip(MOORER.early_taps)
            .map(|(tap, (_, gain))| gain * self.early.read_delay(*tap))
            .sum();

        let last_tap = self.taps.last().map_or(0.0, |tap| self.early.read_delay(*tap));
        let late: f32 = self.combs.iter_mut().map(|comb| comb.process(last_tap)).sum();
        let late = self.diffuser.process(late / self.combs.len() as f32);

        early + late
    }

    fn release(&mut self) {
        self.early.clear();
        for comb in &mut self.combs {
            comb.release();
        }
        self.diffuser.release();
    }
}
