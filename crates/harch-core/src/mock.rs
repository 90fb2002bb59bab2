//! Deterministic scalar physics for unit tests.

use rand::RngCore;

use crate::physics::{PairPhysics, Purification};

/// A pair is just its fidelity; decay is linear and purification is fixed.
#[derive(Debug, Clone)]
pub(crate) struct ScalarPhysics {
    pub decay_per_ns: f64,
    pub source_fidelity: f64,
    pub purify_succeeds: bool,
}

impl ScalarPhysics {
    pub(crate) fn ideal() -> Self {
        Self {
            decay_per_ns: 0.0,
            source_fidelity: 0.9,
            purify_succeeds: true,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            purify_succeeds: false,
            ..Self::ideal()
        }
    }
}

impl PairPhysics for ScalarPhysics {
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
