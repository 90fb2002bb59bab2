//! The DEJMPS/QPA purification circuit.
//!
//! Two pairs ρ₁ (control, kept) and ρ₂ (target, measured) are combined as
//! ρ₁ ⊗ ρ₂ with ρ₂ on qubits 0 and 1. The circuit applies √X to qubits 0 and
//! 2, (√X)† to qubits 1 and 3, then CNOTs 2→0 and 3→1. Qubits 0 and 1 are
//! measured; equal results herald success and the surviving pair is the
//! state left on qubits 2 and 3.

use rand::RngCore;
use tracing::trace;

use crate::density::{DensityMatrix, gates};

/// Result of one purification round.
#[derive(Debug, Clone)]
pub struct QpaRound {
    /// Measured bits of qubits 0 and 1, qubit 0 in bit 0.
    pub outcome: usize,
    /// Whether the bits agreed.
    pub success: bool,
    /// Probability that the bits agree.
    pub success_probability: f64,
    /// Post-measurement state of the kept pair.
    pub state: DensityMatrix,
}

/// Joint state after the circuit, before measurement.
pub fn qpa_circuit(control: &DensityMatrix, target: &DensityMatrix) -> DensityMatrix {
    let mut rho = control.tensor(target);
    rho.apply_1q(&gates::sx(), 0);
    rho.apply_1q(&gates::sxdg(), 1);
    rho.apply_1q(&gates::sx(), 2);
    rho.apply_1q(&gates::sxdg(), 3);
    rho.apply_cx(2, 0);
    rho.apply_cx(3, 1);
    rho
}

/// Probability that the measured bits agree.
pub fn success_probability(evolved: &DensityMatrix) -> f64 {
    let probs = evolved.low_qubit_probabilities(2);
    probs[0b00] + probs[0b11]
}

/// Run the circuit and sample the measurement.
pub fn qpa_round(
    control: &DensityMatrix,
    target: &DensityMatrix,
    rng: &mut dyn RngCore,
) -> QpaRound {
    let evolved = qpa_circuit(control, target);
    let success_probability = success_probability(&evolved);
    let (outcome, state) = evolved.measure_low(2, rng);
    let success = outcome == 0b00 || outcome == 0b11;
    trace!(outcome, success, success_probability, "QPA round");
    QpaRound {
        outcome,
        success,
        success_probability,
        state,
    }
}
