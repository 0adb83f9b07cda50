//! Parallel damped comb bank
//!
//! Shared by the Schroeder and Zazz tanks, which differ only in their
//! delay tables.

use super::descriptor::{
    comb_feedback, damping_coefficient, rt60_seconds, size_factor, TankDescriptor,
};
use super::TankTopology;
use crate::dsp::math::{ms_to_samples, DEFAULT_SAMPLE_RATE};
use crate::dsp::{CombFilter, Processor};
use crate::error::Result;

#[derive(Debug, Clone)]
pub(crate) struct CombBank {
    descriptor: &'static TankDescriptor,
    combs: Vec<CombFilter>,
    sample_rate: f32,
    rt60: f32,
}

impl CombBank {
    pub(crate) fn new(descriptor: &'static TankDescriptor) -> Self {
        Self {
            descriptor,
            combs: descriptor.comb_ms.iter().map(|_| CombFilter::new()).collect(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            rt60: rt60_seconds(0.0),
        }
    }
}

impl TankTopology for CombBank {
    fn descriptor(&self) -> &'static TankDescriptor {
        self.descriptor
    }

    fn init(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for (comb, ms) in self.combs.iter_mut().zip(self.descriptor.comb_ms) {
            comb.init(ms_to_samples(*ms, sample_rate) + 1);
        }
    }

    fn set(&mut self, size: f32, damping: f32) -> Result<()> {
        let scale = size_factor(size);
        let rt60 = rt60_seconds(size);
        let damping = damping_coefficient(damping);
        for (comb, ms) in self.combs.iter_mut().zip(self.descriptor.comb_ms) {
            let delay = ms_to_samples(ms * scale, self.sample_rate);
            comb.set(delay, comb_feedback(delay, rt60, self.sample_rate), damping)?;
        }
        self.rt60 = rt60;
        Ok(())
    }

    fn decay_estimate_seconds(&self) -> f32 {
        self.rt60
    }
}

impl Processor for CombBank {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let sum: f32 = self.combs.iter_mut().map(|comb| comb.process(input)).sum();
        sum / self.combs.len() as f32
    }

    fn release(&mut self) {
        for comb in &mut self.combs {
            comb.release();
        }
    }
}
