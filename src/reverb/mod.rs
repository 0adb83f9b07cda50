//! Feedback delay network reverbs
//!
//! Four topologies share one [`TankTopology`] capability and are
//! dispatched through the closed [`Tank`] enum. [`TankReverb`] adds the
//! per-topology output compensation and the wet/dry mix.
//!
//! Every topology allocates its delay lines at full size in `init`;
//! `set` only retunes lengths and coefficients inside those buffers.
//! Switching topology in `set` allocates the new tank.

mod comb_bank;
mod descriptor;
mod griesinger;
mod moorer;
mod schroeder;
mod zazz;

pub use descriptor::{
    comb_feedback, damping_coefficient, griesinger_decay_db, rt60_seconds, size_factor, LoopHalf,
    OutputTap, TankDescriptor, TankType, TapPoint, DAMPING_SCALE, GRIESINGER, GRIESINGER_LOOP,
    GRIESINGER_TAPS, MAX_COMB_FEEDBACK, MOORER, SCHROEDER, ZAZZ,
};
pub use griesinger::GriesingerTank;
pub use moorer::MoorerTank;
pub use schroeder::SchroederTank;
pub use zazz::ZazzTank;

use crate::dsp::math::DEFAULT_SAMPLE_RATE;
use crate::dsp::Processor;
use crate::error::{clamp_param, FxError, Result};
use serde::{Deserialize, Serialize};

/// What every reverb topology provides on top of [`Processor`]
pub trait TankTopology: Processor {
    fn descriptor(&self) -> &'static TankDescriptor;

    /// Allocate every line at full size for `sample_rate`
    fn init(&mut self, sample_rate: f32);

    /// Retune for `size` and `damping`, both in [0, 1]
    fn set(&mut self, size: f32, damping: f32) -> Result<()>;

    /// Approximate time for the tail to fall by 60 dB
    fn decay_estimate_seconds(&self) -> f32;
}

/// Reverb topology
#[derive(Debug, Clone)]
pub enum Tank {
    Schroeder(SchroederTank),
    Moorer(MoorerTank),
    Griesinger(GriesingerTank),
    Zazz(ZazzTank),
}

impl Tank {
    pub fn new(kind: TankType) -> Self {
        match kind {
            TankType::Schroeder => Tank::Schroeder(SchroederTank::new()),
            TankType::Moorer => Tank::Moorer(MoorerTank::new()),
            TankType::Griesinger => Tank::Griesinger(GriesingerTank::new()),
            TankType::Zazz => Tank::Zazz(ZazzTank::new()),
        }
    }

    pub fn kind(&self) -> TankType {
        self.descriptor().kind
    }

    fn inner(&self) -> &dyn TankTopology {
        match self {
            Tank::Schroeder(tank) => tank,
            Tank::Moorer(tank) => tank,
            Tank::Griesinger(tank) => tank,
            Tank::Zazz(tank) => tank,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TankTopology {
        match self {
            Tank::Schroeder(tank) => tank,
            Tank::Moorer(tank) => tank,
            Tank::Griesinger(tank) => tank,
            Tank::Zazz(tank) => tank,
        }
    }
}

impl TankTopology for Tank {
    fn descriptor(&self) -> &'static TankDescriptor {
        self.inner().descriptor()
    }

    fn init(&mut self, sample_rate: f32) {
        self.inner_mut().init(sample_rate);
    }

    fn set(&mut self, size: f32, damping: f32) -> Result<()> {
        self.inner_mut().set(size, damping)
    }

    fn decay_estimate_seconds(&self) -> f32 {
        self.inner().decay_estimate_seconds()
    }
}

impl Processor for Tank {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        match self {
            Tank::Schroeder(tank) => tank.process(input),
            Tank::Moorer(tank) => tank.process(input),
            Tank::Griesinger(tank) => tank.process(input),
            Tank::Zazz(tank) => tank.process(input),
        }
    }

    fn release(&mut self) {
        self.inner_mut().release();
    }
}

/// Reverb parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankParams {
    pub tank: TankType,
    /// Room size: 0 (small, short) to 1 (large, long)
    pub size: f32,
    /// Loop damping: 0 (bright) to 1 (dark)
    pub damping: f32,
    /// Wet share of the output: 0 (dry) to 1 (wet only)
    pub mix: f32,
}

impl Default for TankParams {
    fn default() -> Self {
        Self {
            tank: TankType::default(),
            size: 0.5,
            damping: 0.5,
            mix: 1.0,
        }
    }
}

impl TankParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("size", self.size), ("damping", self.damping), ("mix", self.mix)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FxError::invalid_parameter(name, value, 0.0, 1.0));
            }
        }
        Ok(())
    }

    /// Clamp finite values into range; non-finite values are left for
    /// `validate` to reject
    pub fn clamp(&mut self) {
        for value in [&mut self.size, &mut self.damping, &mut self.mix] {
            if value.is_finite() {
                *value = value.clamp(0.0, 1.0);
            }
        }
    }
}

/// Reverb with output compensation and wet/dry mix
#[derive(Debug, Clone)]
pub struct TankReverb {
    tank: Tank,
    params: TankParams,
    compensation: f32,
    sample_rate: f32,
}

impl TankReverb {
    /// Create a reverb at the default sample rate with default params
    pub fn new() -> Result<Self> {
        let params = TankParams::default();
        let mut tank = Tank::new(params.tank);
        tank.init(DEFAULT_SAMPLE_RATE);
        tank.set(params.size, params.damping)?;
        Ok(Self {
            compensation: params.tank.descriptor().compensation(params.size),
            tank,
            params,
            sample_rate: DEFAULT_SAMPLE_RATE,
        })
    }

    /// Reallocate every line for `sample_rate`
    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        self.sample_rate = clamp_param("sample_rate", sample_rate, 1000.0, 768_000.0)?;
        self.tank.init(self.sample_rate);
        self.tank.set(self.params.size, self.params.damping)?;
        log::debug!(
            "reverb: {} tank init at {} Hz",
            self.params.tank,
            self.sample_rate
        );
        Ok(())
    }

    /// Apply parameters; a new topology is allocated and initialized
    pub fn set(&mut self, params: &TankParams) -> Result<()> {
        let mut params = *params;
        params.clamp();
        params.validate()?;

        if params.tank != self.tank.kind() {
            let mut tank = Tank::new(params.tank);
            tank.init(self.sample_rate);
            tank.set(params.size, params.damping)?;
            self.tank = tank;
            log::debug!("reverb: switched to {} tank", params.tank);
        } else {
            self.tank.set(params.size, params.damping)?;
        }

        self.compensation = params.tank.descriptor().compensation(params.size);
        self.params = params;
        Ok(())
    }

    /// Select topology, size and damping, keeping the current mix
    pub fn set_tank(&mut self, tank: TankType, size: f32, damping: f32) -> Result<()> {
        self.set(&TankParams {
            tank,
            size,
            damping,
            ..self.params
        })
    }

    pub fn params(&self) -> &TankParams {
        &self.params
    }

    pub fn tank_type(&self) -> TankType {
        self.tank.kind()
    }

    /// Linear output compensation for the current size
    pub fn output_gain(&self) -> f32 {
        self.compensation
    }

    pub fn decay_estimate_seconds(&self) -> f32 {
        self.tank.decay_estimate_seconds()
    }
}

impl Processor for TankReverb {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let wet = self.tank.process(input) * self.compensation;
        input + self.params.mix * (wet - input)
    }

    /// Clears the tails; the current tuning is kept
    fn release(&mut self) {
        self.tank.release();
    }
}
