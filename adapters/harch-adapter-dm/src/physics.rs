//! [`PairPhysics`] backed by 4×4 density matrices.

use harch_core::{PairPhysics, Purification};
use ndarray::Array1;
use num_complex::Complex64;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::density::{BellState, DensityMatrix, gates};
use crate::error::{DmError, DmResult};
use crate::noise::Coherence;
use crate::protocol::qpa_round;

/// Device and source parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmParams {
    /// Coherence of the qubits holding a pair.
    pub coherence: Coherence,
    /// Target state fidelities are measured against.
    pub reference: BellState,
    /// Fidelity of freshly heralded pairs.
    pub source_fidelity: f64,
}

impl Default for DmParams {
    fn default() -> Self {
        Self {
            coherence: Coherence::default(),
            reference: BellState::PhiPlus,
            source_fidelity: 1.0,
        }
    }
}

/// Density-matrix pair model with T1/T2 relaxation and QPA purification.
#[derive(Debug, Clone)]
pub struct DmPhysics {
    params: DmParams,
    reference: Array1<Complex64>,
}

impl DmPhysics {
    /// Validate `params` and build the model.
    pub fn new(params: DmParams) -> DmResult<Self> {
        params.coherence.validate()?;
        if !(0.25..=1.0).contains(&params.source_fidelity) {
            return Err(DmError::InvalidFidelity(params.source_fidelity));
        }
        Ok(Self {
            reference: params.reference.vector(),
            params,
        })
    }

    /// The parameters in use.
    pub fn params(&self) -> &DmParams {
        &self.params
    }

    /// A pair prepared by H and CNOT on |00⟩, depolarised to the source fidelity.
    pub fn source_pair(&self) -> DensityMatrix {
        let mut rho = DensityMatrix::basis(2, 0);
        rho.apply_1q(&gates::h(), 1);
        rho.apply_cx(1, 0);
        if self.params.source_fidelity < 1.0 {
            let p = (4.0 * self.params.source_fidelity - 1.0) / 3.0;
            rho = rho.mix(&DensityMatrix::maximally_mixed(2), p);
        }
        rho
    }
}

impl PairPhysics for DmPhysics {
    type State = DensityMatrix;

    fn decohere(&self, state: &DensityMatrix, duration_ns: u64) -> DensityMatrix {
        let mut rho = state.clone();
        self.params.coherence.relax(&mut rho, duration_ns);
        rho
    }

    fn fidelity(&self, state: &DensityMatrix) -> f64 {
        state.fidelity_with(&self.reference)
    }

    fn purify(
        &self,
        control: &DensityMatrix,
        target: &DensityMatrix,
        rng: &mut dyn RngCore,
    ) -> Purification<DensityMatrix> {
        let round = qpa_round(control, target, rng);
        if round.success {
            Purification::success(round.state, round.success_probability)
        } else {
            Purification::failure(round.success_probability)
        }
    }

    fn generate(&self, _rng: &mut dyn RngCore) -> DensityMatrix {
        self.source_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harch_core::Outcome;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_invalid_source_fidelity() {
        let params = DmParams {
            source_fidelity: 0.1,
            ..DmParams::default()
        };
        assert!(matches!(DmPhysics::new(params), Err(DmError::InvalidFidelity(_))));
    }

    #[test]
    fn test_generate_hits_source_fidelity() {
        let physics = DmPhysics::new(DmParams {
            source_fidelity: 0.85,
            ..DmParams::default()
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let pair = physics.generate(&mut rng);
        assert!((physics.fidelity(&pair) - 0.85).abs() < 1e-10);
    }

    #[test]
    fn test_zero_duration_decohere_is_identity() {
        let physics = DmPhysics::new(DmParams::default()).unwrap();
        let pair = physics.source_pair();
        assert_eq!(physics.decohere(&pair, 0), pair);
    }

    #[test]
    fn test_decay_lowers_fidelity() {
        let physics = DmPhysics::new(DmParams::default()).unwrap();
        let pair = physics.source_pair();
        let aged = physics.decohere(&pair, 300);
        assert!(physics.fidelity(&aged) < physics.fidelity(&pair));
    }

    #[test]
    fn test_purify_reports_probability() {
        let physics = DmPhysics::new(DmParams {
            source_fidelity: 0.9,
            ..DmParams::default()
        })
        .unwrap();
        let pair = physics.source_pair();
        let mut rng = StdRng::seed_from_u64(5);
        let result = physics.purify(&pair, &pair, &mut rng);
        assert!(result.success_probability > 0.8);
        match result.outcome {
            Outcome::Success => assert!(physics.fidelity(result.state.as_ref().unwrap()) > 0.9),
            Outcome::Failure => assert!(result.state.is_none()),
        }
    }
}
