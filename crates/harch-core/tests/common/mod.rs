//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use harch_core::config::TransferTiming;
use harch_core::{CatchTime, PairPhysics, Purification, SimConfig};
use rand::RngCore;

/// Fidelity-only physics with linear decay and a fixed purification gain.
#[derive(Debug, Clone)]
pub struct LinearPhysics {
    pub decay_per_ns: f64,
    pub source_fidelity: f64,
    pub purify_succeeds: bool,
}

impl LinearPhysics {
    pub fn noiseless() -> Self {
        Self {
            decay_per_ns: 0.0,
            source_fidelity: 0.9,
            purify_succeeds: true,
        }
    }

    pub fn always_failing() -> Self {
        Self {
            purify_succeeds: false,
            ..Self::noiseless()
        }
    }
}

impl PairPhysics for LinearPhysics {
    type State = f64;

    fn decohere(&self, state: &f64, duration_ns: u64) -> f64 {
        (state - self.decay_per_ns * duration_ns as f64).max(0.25)
    }

    fn fidelity(&self, state: &f64) -> f64 {
        *state
    }

    fn purify(&self, control: &f64, target: &f64, _rng: &mut dyn RngCore) -> Purification<f64> {
        if self.purify_succeeds {
            Purification::success((control.max(*target) + 0.02).min(1.0), 1.0)
        } else {
            Purification::failure(0.0)
        }
    }

    fn generate(&self, _rng: &mut dyn RngCore) -> f64 {
        self.source_fidelity
    }
}

/// A configuration where every operation takes one 1 ns tick.
pub fn fast_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.cycles = 100;
    config.input.catch_time = CatchTime::Fixed { ns: 1 };
    config.memory.load_ns = 1;
    config.memory.read_ns = 1;
    config.distilled_memory.load_ns = 1;
    config.distilled_memory.read_ns = 1;
    config.distillation.distill_ns = 1;
    config.timing = TransferTiming {
        input_to_memory_ns: 1,
        memory_to_distill_ns: 1,
        distill_to_memory_ns: 1,
        swap_in_ns: 1,
        swap_out_ns: 1,
        readout_ns: 1,
    };
    config
}
