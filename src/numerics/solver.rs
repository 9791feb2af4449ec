use kryst::context::ksp_context::Workspace;
use kryst::error::KError;
use kryst::matrix::op::CsrOp;
use kryst::preconditioner::sor::{MatSorType, SorPc};
use kryst::preconditioner::{PcSide, Preconditioner};
use kryst::solver::LinearSolver;
use kryst::solver::cg::{CgNormType, CgSolver};
use kryst::{
    parallel::{NoComm, UniverseComm},
    utils::convergence::ConvergedReason,
};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Iteration budget and preconditioning choice for one linear solve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverControl {
    pub max_iterations: u32,
    /// Bound on `|b - A x| / |b|`.
    pub tolerance: f64,
    pub use_ssor: bool,
    /// Relaxation of the backward SSOR half-sweep, in `(0, 2)`.
    /// Only `1.0` keeps the preconditioner symmetric.
    pub ssor_omega: f64,
}

impl Default for SolverControl {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-9,
            use_ssor: true,
            ssor_omega: 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("linear system contains NaN or Inf")]
    NonFinite,
    #[error("zero diagonal entry in row {0}, SSOR is undefined")]
    ZeroDiagonal(usize),
    #[error("dimension mismatch: matrix is {rows}x{rows}, vector has {len} entries")]
    DimensionMismatch { rows: usize, len: usize },
    #[error("conjugate gradient failed: {0}")]
    LinearSolveFailed(KError),
}

impl From<KError> for SolverError {
    fn from(e: KError) -> Self {
        match e {
            KError::ZeroPivot(row) => SolverError::ZeroDiagonal(row),
            KError::NonFiniteReduction { .. } => SolverError::NonFinite,
            other => SolverError::LinearSolveFailed(other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverResult {
    pub iterations: u32,
    pub final_residual: f64,
    /// `false` when the iteration cap was reached first.
    pub converged: bool,
}

/// Conjugate gradient for symmetric positive definite systems, optionally
/// preconditioned with symmetric SOR sweeps.
pub struct ConjugateGradient {
    pub control: SolverControl,
}

impl ConjugateGradient {
    pub fn new(control: SolverControl) -> Self {
        Self { control }
    }

    /// Solve `A x = b`, using the incoming `x` as initial guess.
    ///
    /// Running out of iterations is not an error: the result carries
    /// `converged == false` and the caller decides what to do with it.
    pub fn solve(
        &self,
        a: &CsrMatrix<f64>,
        x: &mut DVector<f64>,
        b: &DVector<f64>,
    ) -> Result<SolverResult, SolverError> {
        let n = a.nrows();
        for len in [x.len(), b.len()] {
            if len != n {
                return Err(SolverError::DimensionMismatch { rows: n, len });
            }
        }
        if !b.iter().all(|v| v.is_finite())
            || !x.iter().all(|v| v.is_finite())
            || !a.values().iter().all(|v| v.is_finite())
        {
            return Err(SolverError::NonFinite);
        }

        let b_norm = b.norm();
        if b_norm == 0.0 {
            // A is SPD, so the system has only the trivial solution.
            x.fill(0.0);
            return Ok(self.finish(0, 0.0, true));
        }
        let threshold = self.control.tolerance * b_norm;

        let r0 = (b - a * &*x).norm();
        if r0 <= threshold {
            return Ok(self.finish(0, r0, true));
        }

        let op = CsrOp::new(Arc::new(kryst::matrix::sparse::CsrMatrix::from_csr(
            n,
            n,
            a.row_offsets().to_vec(),
            a.col_indices().to_vec(),
            a.values().to_vec(),
        )));

        let mut pc = if self.control.use_ssor {
            // Without the Eisenstat flag the forward sweep also reads the
            // upper triangle of the input, which breaks symmetry.
            let mut pc = SorPc::new(
                self.control.ssor_omega,
                1,
                MatSorType::SYMMETRIC_SWEEP | MatSorType::EISENSTAT,
                0.0,
            );
            pc.setup(&op)?;
            Some(pc)
        } else {
            None
        };

        // kryst measures rtol against the initial residual, not against |b|.
        let mut cg = CgSolver::new(threshold / r0, self.control.max_iterations as usize)
            .with_norm(CgNormType::Unpreconditioned)
            .with_nonzero_guess(true);
        let mut workspace = Workspace::new(n);
        cg.setup_workspace(&mut workspace);

        let stats = LinearSolver::solve(
            &mut cg,
            &op,
            pc.as_mut().map(|pc| pc as &mut dyn Preconditioner),
            b.as_slice(),
            x.as_mut_slice(),
            PcSide::Left,
            &UniverseComm::NoComm(NoComm {}),
            None,
            Some(&mut workspace),
        )?;

        if !stats.final_residual.is_finite() {
            return Err(SolverError::NonFinite);
        }
        let converged = stats.reason.is_converged();
        if !converged && !matches!(stats.reason, ConvergedReason::DivergedMaxIts) {
            warn!(reason = ?stats.reason, "CG stopped without converging");
        }
        Ok(self.finish(stats.iterations as u32, stats.final_residual, converged))
    }

    fn finish(&self, iterations: u32, final_residual: f64, converged: bool) -> SolverResult {
        if converged {
            debug!(iterations, final_residual, "CG converged");
        } else {
            warn!(
                iterations,
                final_residual,
                tolerance = self.control.tolerance,
                "CG hit the iteration cap before reaching tolerance"
            );
        }
        SolverResult {
            iterations,
            final_residual,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 1-D Laplacian with Dirichlet ends folded in: tridiag(-1, 2, -1).
    fn laplacian(n: usize) -> CsrMatrix<f64> {
        let mut indptr = vec![0];
        let mut indices = Vec::new();
        let mut data = Vec::new();
        for i in 0..n {
            if i > 0 {
                indices.push(i - 1);
                data.push(-1.0);
            }
            indices.push(i);
            data.push(2.0);
            if i + 1 < n {
                indices.push(i + 1);
                data.push(-1.0);
            }
            indptr.push(indices.len());
        }
        CsrMatrix::try_from_csr_data(n, n, indptr, indices, data).unwrap()
    }

    #[test]
    fn cg_solves_spd_system_with_and_without_ssor() {
        let n = 50;
        let a = laplacian(n);
        let exact = DVector::from_fn(n, |i, _| (i as f64 * 0.1).sin());
        let b = &a * &exact;

        for use_ssor in [false, true] {
            let control = SolverControl {
                use_ssor,
                tolerance: 1e-12,
                ..Default::default()
            };
            let mut x = DVector::zeros(n);
            let result = ConjugateGradient::new(control).solve(&a, &mut x, &b).unwrap();
            assert!(result.converged);
            assert!(result.iterations > 0);
            for i in 0..n {
                assert_relative_eq!(x[i], exact[i], epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn ssor_needs_fewer_iterations() {
        let n = 200;
        let a = laplacian(n);
        let b = DVector::from_element(n, 1.0);
        let iterations = |use_ssor| {
            let control = SolverControl {
                use_ssor,
                tolerance: 1e-8,
                ..Default::default()
            };
            let mut x = DVector::zeros(n);
            ConjugateGradient::new(control)
                .solve(&a, &mut x, &b)
                .unwrap()
                .iterations
        };
        assert!(iterations(true) < iterations(false));
    }

    #[test]
    fn exact_initial_guess_takes_zero_iterations() {
        let a = laplacian(10);
        let mut x = DVector::from_element(10, 3.0);
        let b = &a * &x;
        let result = ConjugateGradient::new(SolverControl::default())
            .solve(&a, &mut x, &b)
            .unwrap();
        assert_eq!(result.iterations, 0);
        assert!(result.converged);
    }

    #[test]
    fn nonzero_initial_guess_is_used() {
        let n = 40;
        let a = laplacian(n);
        let exact = DVector::from_fn(n, |i, _| 1.0 + i as f64);
        let b = &a * &exact;
        let control = SolverControl {
            tolerance: 1e-12,
            ..Default::default()
        };
        let mut x = exact.map(|v| v + 1e-3);
        let result = ConjugateGradient::new(control).solve(&a, &mut x, &b).unwrap();
        assert!(result.converged);
        assert_relative_eq!(x, exact, epsilon = 1e-6);
    }

    #[test]
    fn iteration_cap_is_reported_not_raised() {
        let a = laplacian(100);
        let b = DVector::from_element(100, 1.0);
        let control = SolverControl {
            max_iterations: 3,
            tolerance: 1e-12,
            use_ssor: false,
            ..Default::default()
        };
        let mut x = DVector::zeros(100);
        let result = ConjugateGradient::new(control).solve(&a, &mut x, &b).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn tolerance_is_relative_to_rhs() {
        let a = laplacian(30);
        let control = SolverControl {
            tolerance: 1e-10,
            ..Default::default()
        };
        let mut b = DVector::from_element(30, 1e-12);
        let mut x = DVector::zeros(30);
        let result = ConjugateGradient::new(control).solve(&a, &mut x, &b).unwrap();
        assert!(result.converged);
        assert!(result.iterations > 0);
        assert!((&b - &a * &x).norm() <= 1e-9 * b.norm());

        b.fill(0.0);
        x.fill(5.0);
        let result = ConjugateGradient::new(control).solve(&a, &mut x, &b).unwrap();
        assert!(result.converged);
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn non_finite_rhs_is_rejected() {
        let a = laplacian(4);
        let b = DVector::from_vec(vec![1.0, f64::NAN, 0.0, 0.0]);
        let mut x = DVector::zeros(4);
        let err = ConjugateGradient::new(SolverControl::default()).solve(&a, &mut x, &b);
        assert!(matches!(err, Err(SolverError::NonFinite)));
    }

    #[test]
    fn zero_diagonal_is_rejected_by_ssor() {
        // [[0, 1], [1, 2]]
        let a = CsrMatrix::try_from_csr_data(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![0.0, 1.0, 1.0, 2.0])
            .unwrap();
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let mut x = DVector::zeros(2);
        let err = ConjugateGradient::new(SolverControl::default()).solve(&a, &mut x, &b);
        assert!(matches!(err, Err(SolverError::ZeroDiagonal(0))));
    }

    #[test]
    fn mismatched_vector_is_rejected() {
        let a = laplacian(4);
        let b = DVector::zeros(5);
        let mut x = DVector::zeros(4);
        let err = ConjugateGradient::new(SolverControl::default()).solve(&a, &mut x, &b);
        assert!(matches!(err, Err(SolverError::DimensionMismatch { rows: 4, len: 5 })));
    }
}
