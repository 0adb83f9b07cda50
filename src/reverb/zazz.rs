//! Zazz tank
//!
//! Four damped combs on long, non-harmonic delays (53.9 to 101.3 ms at full size).

use super::comb_bank::CombBank;
use super::descriptor::{TankDescriptor, ZAZZ};
use super::TankTopology;
use crate::dsp::Processor;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ZazzTank {
    bank: CombBank,
}

impl Default for ZazzTank {
    fn default() -> Self {
        Self::new()
    }
}

impl ZazzTank {
    pub fn new() -> Self {
        Self {
            bank: CombBank::new(&ZAZZ),
        }
    }
}

impl TankTopology for ZazzTank {
    fn descriptor(&self) -> &'static TankDescriptor {
        self.bank.descriptor()
    }

    fn init(&mut self, sample_rate: f32) {
        self.bank.init(sample_rate);
    }

    fn set(&mut self, size: f32, damping: f32) -> Result<()> {
        self.bank.set(size, damping)
    }

    fn decay_estimate_seconds(&self) -> f32 {
        self.bank.decay_estimate_seconds()
    }
}

impl Processor for ZazzTank {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.bank.process(input)
    }

    fn release(&mut self) {
        self.bank.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::math::ms_to_samples;

    #[test]
    fn test_first_echo_scales_with_size() {
        for (size, scale) in [(0.0, 0.25), (1.0, 1.0)] {
            let mut tank = ZazzTank::new();
            tank.init(44100.0);
            tank.set(size, 0.2).unwrap();
            let first = ms_to_samples(53.9 * scale, 44100.0);
            let response: Vec<f32> = (0..=first)
                .map(|n| tank.process(if n == 0 { 1.0 } else { 0.0 }))
                .collect();
            assert_eq!(response[first - 1], 0.0);
            assert!(response[first] > 0.0);
        }
    }
}
