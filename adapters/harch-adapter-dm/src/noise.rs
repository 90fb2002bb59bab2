//! T1/T2 relaxation of stored pairs.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::density::{DensityMatrix, Op1};
use crate::error::{DmError, DmResult};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Relaxation and dephasing times of one device, in nanoseconds.
///
/// `t2_ns` is the total coherence time and must not exceed `2 * t1_ns`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coherence {
    /// Energy relaxation time.
    pub t1_ns: f64,
    /// Phase coherence time.
    pub t2_ns: f64,
}

impl Default for Coherence {
    /// 1 µs for both, the reference transmon.
    fn default() -> Self {
        Self {
            t1_ns: 1_000.0,
            t2_ns: 1_000.0,
        }
    }
}

impl Coherence {
    /// Validated coherence times.
    pub fn new(t1_ns: f64, t2_ns: f64) -> DmResult<Self> {
        let coherence = Self { t1_ns, t2_ns };
        coherence.validate()?;
        Ok(coherence)
    }

    /// Check the times describe a physical device.
    pub fn validate(&self) -> DmResult<()> {
        let invalid = |reason| DmError::InvalidCoherence {
            t1_ns: self.t1_ns,
            t2_ns: self.t2_ns,
            reason,
        };
        if !(self.t1_ns > 0.0 && self.t2_ns > 0.0) {
            return Err(invalid("times must be positive"));
        }
        if self.t2_ns > 2.0 * self.t1_ns + 1e-9 {
            return Err(invalid("T2 cannot exceed 2*T1"));
        }
        Ok(())
    }

    /// Amplitude damping parameter after `t_ns`.
    pub fn gamma(&self, t_ns: f64) -> f64 {
        1.0 - (-t_ns / self.t1_ns).exp()
    }

    /// Pure dephasing parameter after `t_ns`.
    ///
    /// Chosen so coherences decay as `exp(-t/T2)` once combined with
    /// amplitude damping.
    pub fn lambda(&self, t_ns: f64) -> f64 {
        let rate = (1.0 / self.t2_ns - 0.5 / self.t1_ns).max(0.0);
        1.0 - (-2.0 * t_ns * rate).exp()
    }

    /// Kraus operators of amplitude damping.
    pub fn amplitude_damping(gamma: f64) -> [Op1; 2] {
        let keep = Complex64::new((1.0 - gamma).sqrt(), 0.0);
        let decay = Complex64::new(gamma.sqrt(), 0.0);
        [[[ONE, ZERO], [ZERO, keep]], [[ZERO, decay], [ZERO, ZERO]]]
    }

    /// Kraus operators of phase damping.
    pub fn phase_damping(lambda: f64) -> [Op1; 2] {
        let keep = Complex64::new((1.0 - lambda).sqrt(), 0.0);
        let dephase = Complex64::new(lambda.sqrt(), 0.0);
        [[[ONE, ZERO], [ZERO, keep]], [[ZERO, ZERO], [ZERO, dephase]]]
    }

    /// Let every qubit of `rho` relax for `t_ns`.
    pub fn relax(&self, rho: &mut DensityMatrix, t_ns: u64) {
        if t_ns == 0 {
            return;
        }
        let t = t_ns as f64;
        let ad = Self::amplitude_damping(self.gamma(t));
        let lambda = self.lambda(t);
        for qubit in 0..rho.num_qubits() {
            rho.apply_kraus_1q(&ad, qubit);
            if lambda > 0.0 {
                rho.apply_kraus_1q(&Self::phase_damping(lambda), qubit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::BellState;

    #[test]
    fn test_invalid_times_rejected() {
        assert!(Coherence::new(0.0, 1.0).is_err());
        assert!(Coherence::new(100.0, 300.0).is_err());
        assert!(Coherence::new(100.0, 200.0).is_ok());
    }

    #[test]
    fn test_zero_time_is_identity() {
        let c = Coherence::default();
        let mut rho = DensityMatrix::werner(0.9, BellState::PhiPlus);
        let before = rho.clone();
        c.relax(&mut rho, 0);
        assert_eq!(rho, before);
    }

    #[test]
    fn test_excited_population_decays_with_t1() {
        let c = Coherence::new(100.0, 200.0).unwrap();
        let mut rho = DensityMatrix::basis(1, 1);
        c.relax(&mut rho, 100);
        let excited = rho.as_array()[[1, 1]].re;
        assert!((excited - (-1.0f64).exp()).abs() < 1e-10);
        assert!((rho.trace() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_coherence_decays_with_t2() {
        let c = Coherence::new(1_000.0, 500.0).unwrap();
        let mut rho = DensityMatrix::basis(1, 0);
        rho.apply_1q(&crate::density::gates::h(), 0);
        c.relax(&mut rho, 250);
        let off = rho.as_array()[[0, 1]].norm();
        assert!((off - 0.5 * (-0.5f64).exp()).abs() < 1e-10);
    }

    #[test]
    fn test_bell_fidelity_decreases() {
        let c = Coherence::default();
        let phi = BellState::PhiPlus.vector();
        let mut rho = DensityMatrix::bell(BellState::PhiPlus);
        let mut last = 1.0;
        for _ in 0..5 {
            c.relax(&mut rho, 100);
            let f = rho.fidelity_with(&phi);
            assert!(f < last);
            last = f;
        }
        assert!(rho.is_hermitian(1e-10));
    }

    proptest::proptest! {
        #[test]
        fn relax_keeps_a_valid_state(
            t1 in 50.0f64..10_000.0,
            ratio in 0.1f64..2.0,
            t in 0u64..20_000,
            f in 0.25f64..=1.0,
        ) {
            let c = Coherence::new(t1, t1 * ratio).unwrap();
            let mut rho = DensityMatrix::werner(f, BellState::PhiPlus);
            c.relax(&mut rho, t);
            proptest::prop_assert!((rho.trace() - 1.0).abs() < 1e-9);
            proptest::prop_assert!(rho.is_hermitian(1e-9));
        }
    }
}
