//! Dense density operators for a few qubits.
//!
//! Basis index `i` encodes qubit `k` in bit `k`, so qubit 0 is the least
//! significant bit. `kron(a, b)` places `b` on the low qubits.

use std::f64::consts::FRAC_1_SQRT_2;

use ndarray::{Array1, Array2, linalg::kron};
use num_complex::Complex64;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{DmError, DmResult};

/// A 2×2 operator in row-major order.
pub type Op1 = [[Complex64; 2]; 2];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// The four Bell states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BellState {
    /// (|00⟩ + |11⟩)/√2.
    #[default]
    PhiPlus,
    /// (|00⟩ − |11⟩)/√2.
    PhiMinus,
    /// (|01⟩ + |10⟩)/√2.
    PsiPlus,
    /// (|01⟩ − |10⟩)/√2.
    PsiMinus,
}

impl BellState {
    /// State vector in the computational basis.
    pub fn vector(self) -> Array1<Complex64> {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        let amplitudes = match self {
            BellState::PhiPlus => [h, ZERO, ZERO, h],
            BellState::PhiMinus => [h, ZERO, ZERO, -h],
            BellState::PsiPlus => [ZERO, h, h, ZERO],
            BellState::PsiMinus => [ZERO, h, -h, ZERO],
        };
        Array1::from_vec(amplitudes.to_vec())
    }
}

/// Single-qubit gates.
pub mod gates {
    use super::{ONE, Op1, ZERO};
    use num_complex::Complex64;

    /// √X.
    pub fn sx() -> Op1 {
        let a = Complex64::new(0.5, 0.5);
        let b = Complex64::new(0.5, -0.5);
        [[a, b], [b, a]]
    }

    /// (√X)†.
    pub fn sxdg() -> Op1 {
        let a = Complex64::new(0.5, -0.5);
        let b = Complex64::new(0.5, 0.5);
        [[a, b], [b, a]]
    }

    /// Hadamard.
    pub fn h() -> Op1 {
        let s = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
        [[s, s], [s, -s]]
    }

    /// Identity.
    pub fn id() -> Op1 {
        [[ONE, ZERO], [ZERO, ONE]]
    }
}

/// A density operator on `num_qubits` qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityMatrix {
    data: Array2<Complex64>,
    num_qubits: usize,
}

impl DensityMatrix {
    /// Wrap a square matrix whose side is a power of two.
    pub fn from_array(data: Array2<Complex64>) -> DmResult<Self> {
        let (rows, cols) = data.dim();
        if rows != cols || !rows.is_power_of_two() {
            return Err(DmError::InvalidMatrix(format!("{rows}x{cols} is not a qubit operator")));
        }
        let trace: f64 = (0..rows).map(|i| data[[i, i]].re).sum();
        if (trace - 1.0).abs() > 1e-9 {
            return Err(DmError::InvalidMatrix(format!("trace is {trace}")));
        }
        Ok(Self {
            num_qubits: rows.trailing_zeros() as usize,
            data,
        })
    }

    /// |ψ⟩⟨ψ| for a normalised state vector.
    pub fn pure(psi: &Array1<Complex64>) -> Self {
        let n = psi.len();
        let data = Array2::from_shape_fn((n, n), |(i, j)| psi[i] * psi[j].conj());
        Self {
            num_qubits: n.trailing_zeros() as usize,
            data,
        }
    }

    /// The given Bell state.
    pub fn bell(state: BellState) -> Self {
        Self::pure(&state.vector())
    }

    /// `I/2^n`.
    pub fn maximally_mixed(num_qubits: usize) -> Self {
        let n = 1 << num_qubits;
        let p = Complex64::new(1.0 / n as f64, 0.0);
        Self {
            data: Array2::from_diag(&Array1::from_elem(n, p)),
            num_qubits,
        }
    }

    /// Werner state with overlap `fidelity` on `reference`.
    pub fn werner(fidelity: f64, reference: BellState) -> Self {
        let bell = Self::bell(reference);
        let mixed = Self::maximally_mixed(2);
        // ρ = p|B⟩⟨B| + (1−p)I/4 has ⟨B|ρ|B⟩ = p + (1−p)/4.
        let p = (4.0 * fidelity - 1.0) / 3.0;
        bell.mix(&mixed, p)
    }

    /// `p·self + (1−p)·other`.
    pub fn mix(&self, other: &DensityMatrix, p: f64) -> Self {
        Self {
            data: &self.data * Complex64::new(p, 0.0) + &other.data * Complex64::new(1.0 - p, 0.0),
            num_qubits: self.num_qubits,
        }
    }

    /// The computational basis state |i⟩⟨i|.
    pub fn basis(num_qubits: usize, index: usize) -> Self {
        let n = 1 << num_qubits;
        let mut data = Array2::from_elem((n, n), ZERO);
        data[[index, index]] = ONE;
        Self { data, num_qubits }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Matrix side length.
    pub fn dim(&self) -> usize {
        self.data.nrows()
    }

    /// Raw matrix.
    pub fn as_array(&self) -> &Array2<Complex64> {
        &self.data
    }

    /// Real part of the trace.
    pub fn trace(&self) -> f64 {
        self.data.diag().iter().map(|c| c.re).sum()
    }

    /// Whether `ρ = ρ†` within `tol`.
    pub fn is_hermitian(&self, tol: f64) -> bool {
        let n = self.dim();
        (0..n).all(|i| (0..n).all(|j| (self.data[[i, j]] - self.data[[j, i]].conj()).norm() <= tol))
    }

    /// `self ⊗ low`, with `low` on the low qubits.
    pub fn tensor(&self, low: &DensityMatrix) -> Self {
        Self {
            data: kron(&self.data, &low.data),
            num_qubits: self.num_qubits + low.num_qubits,
        }
    }

    /// `⟨ψ|ρ|ψ⟩` for a pure reference.
    pub fn fidelity_with(&self, psi: &Array1<Complex64>) -> f64 {
        let rho_psi = self.data.dot(psi);
        psi.iter()
            .zip(rho_psi.iter())
            .map(|(a, b)| a.conj() * b)
            .sum::<Complex64>()
            .re
    }

    /// Apply `u` to `qubit`: ρ → UρU†.
    pub fn apply_1q(&mut self, u: &Op1, qubit: usize) {
        self.left_1q(u, qubit);
        self.right_1q_dagger(u, qubit);
    }

    /// ρ → Uρ.
    fn left_1q(&mut self, u: &Op1, qubit: usize) {
        let mask = 1 << qubit;
        let n = self.dim();
        for c in 0..n {
            for i in (0..n).filter(|i| i & mask == 0) {
                let j = i | mask;
                let a = self.data[[i, c]];
                let b = self.data[[j, c]];
                self.data[[i, c]] = u[0][0] * a + u[0][1] * b;
                self.data[[j, c]] = u[1][0] * a + u[1][1] * b;
            }
        }
    }

    /// ρ → ρU†.
    fn right_1q_dagger(&mut self, u: &Op1, qubit: usize) {
        let mask = 1 << qubit;
        let n = self.dim();
        for r in 0..n {
            for i in (0..n).filter(|i| i & mask == 0) {
                let j = i | mask;
                let a = self.data[[r, i]];
                let b = self.data[[r, j]];
                self.data[[r, i]] = a * u[0][0].conj() + b * u[0][1].conj();
                self.data[[r, j]] = a * u[1][0].conj() + b * u[1][1].conj();
            }
        }
    }

    /// Controlled-NOT.
    pub fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let n = self.dim();
        let flipped: Vec<(usize, usize)> = (0..n)
            .filter(|i| (i & ctrl_mask != 0) && (i & tgt_mask == 0))
            .map(|i| (i, i | tgt_mask))
            .collect();
        for &(i, j) in &flipped {
            for c in 0..n {
                self.data.swap([i, c], [j, c]);
            }
        }
        for &(i, j) in &flipped {
            for r in 0..n {
                self.data.swap([r, i], [r, j]);
            }
        }
    }

    /// Single-qubit channel ρ → Σ KρK†.
    pub fn apply_kraus_1q(&mut self, kraus: &[Op1], qubit: usize) {
        let mut total = Array2::from_elem(self.data.dim(), ZERO);
        for k in kraus {
            let mut term = self.clone();
            term.apply_1q(k, qubit);
            total += &term.data;
        }
        self.data = total;
    }

    /// Probability of each outcome when the `low` lowest qubits are measured.
    pub fn low_qubit_probabilities(&self, low: usize) -> Vec<f64> {
        let outcomes = 1 << low;
        let mut probs = vec![0.0; outcomes];
        for i in 0..self.dim() {
            probs[i & (outcomes - 1)] += self.data[[i, i]].re;
        }
        probs
    }

    /// Measure the `low` lowest qubits, sampling with `rng`, and return the
    /// outcome with the normalised state of the remaining qubits.
    pub fn measure_low(&self, low: usize, rng: &mut dyn RngCore) -> (usize, DensityMatrix) {
        let probs = self.low_qubit_probabilities(low);
        let mut draw = rng.gen_range(0.0..1.0);
        let mut outcome = probs.len() - 1;
        for (m, &p) in probs.iter().enumerate() {
            if draw < p {
                outcome = m;
                break;
            }
            draw -= p;
        }
        (outcome, self.project_low(low, outcome))
    }

    /// Post-measurement state of the high qubits given `outcome` on the low ones.
    pub fn project_low(&self, low: usize, outcome: usize) -> DensityMatrix {
        let keep = self.num_qubits - low;
        let n = 1 << keep;
        let mut data = Array2::from_shape_fn((n, n), |(a, b)| {
            self.data[[(a << low) | outcome, (b << low) | outcome]]
        });
        let p: f64 = data.diag().iter().map(|c| c.re).sum();
        if p > 0.0 {
            data.mapv_inplace(|c| c / p);
        }
        DensityMatrix { data, num_qubits: keep }
    }

    /// Trace out the `low` lowest qubits.
    pub fn trace_out_low(&self, low: usize) -> DensityMatrix {
        let keep = self.num_qubits - low;
        let n = 1 << keep;
        let m = 1 << low;
        let data = Array2::from_shape_fn((n, n), |(a, b)| {
            (0..m)
                .map(|k| self.data[[(a << low) | k, (b << low) | k]])
                .sum::<Complex64>()
        });
        DensityMatrix { data, num_qubits: keep }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TOL: f64 = 1e-10;

    #[test]
    fn test_bell_fidelities() {
        let phi = DensityMatrix::bell(BellState::PhiPlus);
        assert!((phi.fidelity_with(&BellState::PhiPlus.vector()) - 1.0).abs() < TOL);
        assert!(phi.fidelity_with(&BellState::PsiMinus.vector()).abs() < TOL);
        assert!((phi.trace() - 1.0).abs() < TOL);
    }

    #[test]
    fn test_werner_has_requested_fidelity() {
        let rho = DensityMatrix::werner(0.8, BellState::PhiPlus);
        assert!((rho.fidelity_with(&BellState::PhiPlus.vector()) - 0.8).abs() < TOL);
        assert!(rho.is_hermitian(TOL));
    }

    #[test]
    fn test_h_then_cx_makes_bell_pair() {
        let mut rho = DensityMatrix::basis(2, 0);
        rho.apply_1q(&gates::h(), 0);
        rho.apply_cx(0, 1);
        assert!((rho.fidelity_with(&BellState::PhiPlus.vector()) - 1.0).abs() < TOL);
    }

    #[test]
    fn test_sx_sxdg_cancel() {
        let mut rho = DensityMatrix::werner(0.7, BellState::PsiPlus);
        let before = rho.clone();
        rho.apply_1q(&gates::sx(), 1);
        rho.apply_1q(&gates::sxdg(), 1);
        for (a, b) in rho.as_array().iter().zip(before.as_array().iter()) {
            assert!((a - b).norm() < TOL);
        }
    }

    #[test]
    fn test_tensor_places_low_operand_on_low_qubits() {
        // |1⟩ on qubit 0, |0⟩ on qubit 1.
        let high = DensityMatrix::basis(1, 0);
        let low = DensityMatrix::basis(1, 1);
        let rho = high.tensor(&low);
        assert_eq!(rho.num_qubits(), 2);
        assert!((rho.as_array()[[1, 1]].re - 1.0).abs() < TOL);
        assert_eq!(rho.low_qubit_probabilities(1), vec![0.0, 1.0]);
    }

    #[test]
    fn test_trace_out_recovers_factor() {
        let high = DensityMatrix::werner(0.9, BellState::PhiPlus);
        let low = DensityMatrix::bell(BellState::PsiMinus);
        let reduced = high.tensor(&low).trace_out_low(2);
        for (a, b) in reduced.as_array().iter().zip(high.as_array().iter()) {
            assert!((a - b).norm() < TOL);
        }
    }

    #[test]
    fn test_measure_bell_pair_is_correlated() {
        let rho = DensityMatrix::bell(BellState::PhiPlus);
        let probs = rho.low_qubit_probabilities(2);
        assert!((probs[0] - 0.5).abs() < TOL);
        assert!((probs[3] - 0.5).abs() < TOL);
        assert!(probs[1].abs() < TOL && probs[2].abs() < TOL);

        let mut rng = StdRng::seed_from_u64(3);
        let (outcome, post) = rho.measure_low(1, &mut rng);
        assert!(outcome < 2);
        assert!((post.as_array()[[outcome, outcome]].re - 1.0).abs() < TOL);
    }

    #[test]
    fn test_from_array_validates_shape_and_trace() {
        assert!(DensityMatrix::from_array(Array2::from_elem((3, 3), ZERO)).is_err());
        assert!(DensityMatrix::from_array(Array2::from_elem((2, 2), ZERO)).is_err());
        let mixed = DensityMatrix::maximally_mixed(1).as_array().clone();
        let ok = DensityMatrix::from_array(mixed).unwrap();
        assert_eq!(ok.num_qubits(), 1);
    }
}
