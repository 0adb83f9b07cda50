//! Schroeder tank
//!
//! Four parallel damped combs, summed and scaled by a quarter (29.7 to 43.7 ms at full size).

use super::comb_bank::CombBank;
use super::descriptor::{TankDescriptor, SCHROEDER};
use super::TankTopology;
use crate::dsp::Processor;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SchroederTank {
    bank: CombBank,
}

impl Default for SchroederTank {
    fn default() -> Self {
        Self::new()
    }
}

impl SchroederTank {
    pub fn new() -> Self {
        Self {
            bank: CombBank::new(&SCHROEDER),
        }
    }
}

impl TankTopology for SchroederTank {
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

impl Processor for SchroederTank {
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
    fn test_first_echo_at_shortest_comb() {
        let mut tank = SchroederTank::new();
        tank.init(48000.0);
        tank.set(1.0, 0.0).unwrap();

        let first = ms_to_samples(29.7, 48000.0);
        let response: Vec<f32> = (0..first + 1)
            .map(|n| tank.process(if n == 0 { 1.0 } else { 0.0 }))
            .collect();
        assert!(response[..first].iter().all(|y| *y == 0.0));
        assert!((response[first] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_size_shortens_decay() {
        let mut tank = SchroederTank::new();
        tank.init(48000.0);
        tank.set(0.0, 0.5).unwrap();
        let short = tank.decay_estimate_seconds();
        tank.set(1.0, 0.5).unwrap();
        assert!(tank.decay_estimate_seconds() > short);
    }
}
