//! Error types for the density-matrix adapter.

use thiserror::Error;

/// Errors raised while configuring the density-matrix model.
#[derive(Debug, Error)]
pub enum DmError {
    /// Coherence times that no physical device has.
    #[error("Invalid coherence times T1={t1_ns} ns, T2={t2_ns} ns: {reason}")]
    InvalidCoherence {
        /// Relaxation time.
        t1_ns: f64,
        /// Dephasing time.
        t2_ns: f64,
        /// Why they were rejected.
        reason: &'static str,
    },

    /// A fidelity outside `[0.25, 1]`.
    #[error("Invalid source fidelity {0}: must be within [0.25, 1]")]
    InvalidFidelity(f64),

    /// A matrix that is not a multi-qubit density operator.
    #[error("Invalid density matrix: {0}")]
    InvalidMatrix(String),
}

/// Result type for density-matrix operations.
pub type DmResult<T> = Result<T, DmError>;
