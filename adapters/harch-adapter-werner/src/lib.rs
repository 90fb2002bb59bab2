//! Closed-form Werner-state physics for the Harch distillation controller.
//!
//! A Werner pair is fully described by its fidelity `F` with the reference
//! Bell state. Idle time depolarises it toward the maximally mixed state,
//! `F(t) = 1/4 + (F - 1/4)·exp(-t/T)`, and purification follows the BBPSSW
//! recurrence. This is orders of magnitude cheaper than the density-matrix
//! model and is exact for depolarising noise.

use harch_core::{PairPhysics, Purification};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fidelity of the maximally mixed two-qubit state.
pub const MIXED_FIDELITY: f64 = 0.25;

/// Errors raised while configuring the Werner model.
#[derive(Debug, Error)]
pub enum WernerError {
    /// Non-positive or non-finite coherence time.
    #[error("Invalid coherence time {0} ns: must be positive")]
    InvalidCoherence(f64),

    /// A fidelity outside `[0.25, 1]`.
    #[error("Invalid source fidelity {0}: must be within [0.25, 1]")]
    InvalidFidelity(f64),
}

/// A Werner pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WernerState {
    /// Overlap with the reference Bell state.
    pub fidelity: f64,
}

/// Model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WernerParams {
    /// Depolarising time constant.
    pub coherence_ns: f64,
    /// Fidelity of freshly heralded pairs.
    pub source_fidelity: f64,
}

impl Default for WernerParams {
    fn default() -> Self {
        Self {
            coherence_ns: 1_000.0,
            source_fidelity: 0.95,
        }
    }
}

/// BBPSSW success probability for two Werner pairs.
pub fn success_probability(f1: f64, f2: f64) -> f64 {
    let (e1, e2) = ((1.0 - f1) / 3.0, (1.0 - f2) / 3.0);
    f1 * f2 + f1 * e2 + e1 * f2 + 5.0 * e1 * e2
}

/// BBPSSW output fidelity, given success.
pub fn purified_fidelity(f1: f64, f2: f64) -> f64 {
    let (e1, e2) = ((1.0 - f1) / 3.0, (1.0 - f2) / 3.0);
    (f1 * f2 + e1 * e2) / success_probability(f1, f2)
}

/// Werner pair model.
#[derive(Debug, Clone)]
pub struct WernerPhysics {
    params: WernerParams,
}

impl WernerPhysics {
    /// Validate `params` and build the model.
    pub fn new(params: WernerParams) -> Result<Self, WernerError> {
        if !(params.coherence_ns.is_finite() && params.coherence_ns > 0.0) {
            return Err(WernerError::InvalidCoherence(params.coherence_ns));
        }
        if !(MIXED_FIDELITY..=1.0).contains(&params.source_fidelity) {
            return Err(WernerError::InvalidFidelity(params.source_fidelity));
        }
        Ok(Self { params })
    }

    /// The parameters in use.
    pub fn params(&self) -> &WernerParams {
        &self.params
    }
}

impl PairPhysics for WernerPhysics {
    type State = WernerState;

    fn decohere(&self, state: &WernerState, duration_ns: u64) -> WernerState {
        if duration_ns == 0 {
            return *state;
        }
        let decay = (-(duration_ns as f64) / self.params.coherence_ns).exp();
        WernerState {
            fidelity: MIXED_FIDELITY + (state.fidelity - MIXED_FIDELITY) * decay,
        }
    }

    fn fidelity(&self, state: &WernerState) -> f64 {
        state.fidelity
    }

    fn purify(
        &self,
        control: &WernerState,
        target: &WernerState,
        rng: &mut dyn RngCore,
    ) -> Purification<WernerState> {
        let p = success_probability(control.fidelity, target.fidelity);
        if rng.gen_bool(p.clamp(0.0, 1.0)) {
            let fidelity = purified_fidelity(control.fidelity, target.fidelity);
            Purification::success(WernerState { fidelity }, p)
        } else {
            Purification::failure(p)
        }
    }

    fn generate(&self, _rng: &mut dyn RngCore) -> WernerState {
        WernerState {
            fidelity: self.params.source_fidelity,
        }
    }
}
