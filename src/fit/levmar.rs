//! Levenberg–Marquardt nonlinear least squares with an analytic Jacobian.
//!
//! Minimises `‖r(p)‖²` for a residual function `r: Rⁿ → Rᵐ`. Each iteration
//! solves the damped normal equations
//!
//! ```text
//! (JᵀJ + μI) Δp = −Jᵀr
//! ```
//!
//! by Cholesky factorisation and accepts the step only if it reduces the cost.
//! The damping `μ` starts at `τ · max diag(JᵀJ)` and is adapted from the ratio
//! of actual to predicted reduction (Nielsen's update). `JᵀJ` is rebuilt only
//! when the problem reports that its Jacobian changed, so problems that are
//! linear in their parameters pay for it once.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// A least-squares problem driven by [`levmar_der`].
pub trait LeastSquaresProblem {
    /// Number of parameters `n`.
    fn num_params(&self) -> usize;

    /// Number of residuals `m`.
    fn num_residuals(&self) -> usize;

    /// Write `r(p)` into `out` (length `m`).
    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);

    /// Write `∂r/∂p` at `params` into `jac` (`m × n`).
    ///
    /// Return `false` if `jac` was left untouched because it still holds the
    /// correct Jacobian from a previous call.
    fn jacobian(&mut self, params: &DVector<f64>, jac: &mut DMatrix<f64>) -> bool;
}

/// Solver tolerances and limits.
#[derive(Debug, Clone)]
pub struct LevMarOptions {
    /// Scale of the initial damping relative to the largest diagonal of `JᵀJ`. Default 1e-3.
    pub tau: f64,
    /// Stop when `‖Jᵀr‖∞` falls to this. Default 1e-17.
    pub gradient_tol: f64,
    /// Stop when `‖Δp‖ ≤ step_tol · ‖p‖`. Default 1e-10.
    pub step_tol: f64,
    /// Stop when `‖r‖²` falls to this. Default 1e-17.
    pub residual_tol: f64,
    /// Maximum number of step attempts. Default 10000.
    pub max_iterations: usize,
}

impl Default for LevMarOptions {
    fn default() -> Self {
        Self {
            tau: 1e-3,
            gradient_tol: 1e-17,
            step_tol: 1e-10,
            residual_tol: 1e-17,
            max_iterations: 10000,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The gradient `Jᵀr` is negligible.
    SmallGradient,
    /// The parameter step is negligible relative to the parameters.
    SmallStep,
    /// The iteration limit was reached.
    MaxIterations,
    /// The damped normal matrix is numerically singular.
    Singular,
    /// The damping grew without finding a step that reduces the cost.
    NoReduction,
    /// The residual is negligible.
    SmallResidual,
    /// The residual function produced NaN or infinity.
    InvalidValues,
}

impl Termination {
    /// Numeric reason code, 1 to 7, in the order of the variants.
    pub fn code(self) -> u8 {
        match self {
            Termination::SmallGradient => 1,
            Termination::SmallStep => 2,
            Termination::MaxIterations => 3,
            Termination::Singular => 4,
            Termination::NoReduction => 5,
            Termination::SmallResidual => 6,
            Termination::InvalidValues => 7,
        }
    }

    /// The solution should not be trusted.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Termination::Singular | Termination::NoReduction | Termination::InvalidValues
        )
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::SmallGradient => "small gradient",
            Termination::SmallStep => "small step",
            Termination::MaxIterations => "iteration limit reached",
            Termination::Singular => "singular matrix",
            Termination::NoReduction => "no further error reduction possible",
            Termination::SmallResidual => "small residual",
            Termination::InvalidValues => "invalid (NaN or Inf) values",
        };
        f.write_str(s)
    }
}

/// Outcome of a solver run.
#[derive(Debug, Clone)]
pub struct LevMarReport {
    /// Final parameters.
    pub params: DVector<f64>,
    /// `‖r‖²` at the initial guess.
    pub initial_cost: f64,
    /// `‖r‖²` at the final parameters.
    pub final_cost: f64,
    /// Number of step attempts made.
    pub iterations: usize,
    /// Number of Jacobian requests answered with a new matrix.
    pub jacobian_evaluations: usize,
    pub termination: Termination,
}

/// Minimise `‖r(p)‖²` starting from `initial`.
pub fn levmar_der<P: LeastSquaresProblem>(
    problem: &mut P,
    initial: DVector<f64>,
    options: &LevMarOptions,
) -> LevMarReport {
    let n = problem.num_params();
    let m = problem.num_residuals();
    debug_assert_eq!(initial.len(), n);

    let mut p = initial;
    let mut r = DVector::zeros(m);
    problem.residuals(&p, &mut r);
    let mut cost = r.norm_squared();
    let initial_cost = cost;

    let finish = |params: DVector<f64>,
                  cost: f64,
                  iterations: usize,
                  jacobian_evaluations: usize,
                  termination: Termination| {
        debug!(
            "levmar: {} after {} iterations, cost {:.3e} -> {:.3e}",
            termination, iterations, initial_cost, cost
        );
        LevMarReport {
            params,
            initial_cost,
            final_cost: cost,
            iterations,
            jacobian_evaluations,
            termination,
        }
    };

    if !cost.is_finite() {
        return finish(p, cost, 0, 0, Termination::InvalidValues);
    }
    if n == 0 {
        return finish(p, cost, 0, 0, Termination::SmallGradient);
    }

    let mut jac = DMatrix::zeros(m, n);
    let mut jtj = DMatrix::zeros(n, n);
    let mut g = DVector::zeros(n);
    let mut r_new = DVector::zeros(m);
    let mut jac_evals = 0;
    let mut first = true;
    let mut refresh = true;
    let mut mu = 0.0;
    let mut nu: u32 = 2;

    let step_tol2 = options.step_tol * options.step_tol;
    let eps2 = f64::EPSILON * f64::EPSILON;

    let mut k = 0;
    while k < options.max_iterations {
        if refresh {
            if problem.jacobian(&p, &mut jac) || first {
                jac_evals += 1;
                jtj = jac.tr_mul(&jac);
            }
            g = jac.tr_mul(&r);

            if g.amax() <= options.gradient_tol {
                return finish(p, cost, k, jac_evals, Termination::SmallGradient);
            }
            if first {
                let max_diag = jtj.diagonal().max();
                mu = options.tau * max_diag;
                first = false;
            }
            if cost <= options.residual_tol {
                return finish(p, cost, k, jac_evals, Termination::SmallResidual);
            }
            refresh = false;
        }
        k += 1;

        let mut a = jtj.clone();
        for i in 0..n {
            a[(i, i)] += mu;
        }

        let dp = match a.cholesky() {
            Some(chol) => -chol.solve(&g),
            None => {
                // Not positive definite at this damping: damp harder.
                mu *= nu as f64;
                match nu.checked_mul(2) {
                    Some(next) => nu = next,
                    None => return finish(p, cost, k, jac_evals, Termination::NoReduction),
                }
                continue;
            }
        };

        let dp2 = dp.norm_squared();
        let p2 = p.norm_squared();
        if dp2 <= step_tol2 * p2 {
            return finish(p, cost, k, jac_evals, Termination::SmallStep);
        }
        if dp2 >= (p2 + options.step_tol) / eps2 {
            return finish(p, cost, k, jac_evals, Termination::Singular);
        }

        let p_new = &p + &dp;
        problem.residuals(&p_new, &mut r_new);
        let cost_new = r_new.norm_squared();
        if !cost_new.is_finite() {
            return finish(p, cost, k, jac_evals, Termination::InvalidValues);
        }

        let predicted = dp.dot(&(&dp * mu - &g));
        let actual = cost - cost_new;

        if predicted > 0.0 && actual > 0.0 {
            let ratio = 2.0 * actual / predicted - 1.0;
            mu *= (1.0 - ratio * ratio * ratio).max(1.0 / 3.0);
            nu = 2;
            p = p_new;
            std::mem::swap(&mut r, &mut r_new);
            cost = cost_new;
            refresh = true;
        } else {
            mu *= nu as f64;
            match nu.checked_mul(2) {
                Some(next) => nu = next,
                None => return finish(p, cost, k, jac_evals, Termination::NoReduction),
            }
        }
    }

    finish(p, cost, k, jac_evals, Termination::MaxIterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight-line fit `y = a·x + b`, linear in (a, b).
    struct Line {
        x: Vec<f64>,
        y: Vec<f64>,
        jacobian_calls: usize,
    }

    impl LeastSquaresProblem for Line {
        fn num_params(&self) -> usize {
            2
        }
        fn num_residuals(&self) -> usize {
            self.x.len()
        }
        fn residuals(&self, p: &DVector<f64>, out: &mut DVector<f64>) {
            for (i, (&x, &y)) in self.x.iter().zip(&self.y).enumerate() {
                out[i] = p[0] * x + p[1] - y;
            }
        }
        fn jacobian(&mut self, _p: &DVector<f64>, jac: &mut DMatrix<f64>) -> bool {
            self.jacobian_calls += 1;
            if self.jacobian_calls > 1 {
                return false;
            }
            for (i, &x) in self.x.iter().enumerate() {
                jac[(i, 0)] = x;
                jac[(i, 1)] = 1.0;
            }
            true
        }
    }

    /// Rosenbrock valley as residuals `(10·(y − x²), 1 − x)`.
    struct Rosenbrock;

    impl LeastSquaresProblem for Rosenbrock {
        fn num_params(&self) -> usize {
            2
        }
        fn num_residuals(&self) -> usize {
            2
        }
        fn residuals(&self, p: &DVector<f64>, out: &mut DVector<f64>) {
            out[0] = 10.0 * (p[1] - p[0] * p[0]);
            out[1] = 1.0 - p[0];
        }
        fn jacobian(&mut self, p: &DVector<f64>, jac: &mut DMatrix<f64>) -> bool {
            jac[(0, 0)] = -20.0 * p[0];
            jac[(0, 1)] = 10.0;
            jac[(1, 0)] = -1.0;
            jac[(1, 1)] = 0.0;
            true
        }
    }

    #[test]
    fn test_line_fit() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.5 * x - 1.0).collect();
        let mut problem = Line {
            x,
            y,
            jacobian_calls: 0,
        };
        let report = levmar_der(&mut problem, DVector::from_vec(vec![0.0, 0.0]), &LevMarOptions::default());
        assert!(!report.termination.is_failure(), "{}", report.termination);
        assert!((report.params[0] - 2.5).abs() < 1e-8, "a = {}", report.params[0]);
        assert!((report.params[1] + 1.0).abs() < 1e-8, "b = {}", report.params[1]);
        assert!(report.final_cost < report.initial_cost);
        // constant Jacobian is only built once
        assert_eq!(report.jacobian_evaluations, 1);
    }

    #[test]
    fn test_rosenbrock() {
        let options = LevMarOptions {
            residual_tol: 1e-20,
            ..Default::default()
        };
        let report = levmar_der(&mut Rosenbrock, DVector::from_vec(vec![-1.2, 1.0]), &options);
        assert!(!report.termination.is_failure(), "{}", report.termination);
        assert!((report.params[0] - 1.0).abs() < 1e-6, "x = {}", report.params[0]);
        assert!((report.params[1] - 1.0).abs() < 1e-6, "y = {}", report.params[1]);
    }

    #[test]
    fn test_iteration_limit() {
        let options = LevMarOptions {
            max_iterations: 2,
            residual_tol: 0.0,
            ..Default::default()
        };
        let report = levmar_der(&mut Rosenbrock, DVector::from_vec(vec![-1.2, 1.0]), &options);
        assert_eq!(report.termination, Termination::MaxIterations);
        assert_eq!(report.iterations, 2);
    }

    #[test]
    fn test_invalid_start() {
        let mut problem = Line {
            x: vec![1.0, 2.0],
            y: vec![f64::NAN, 1.0],
            jacobian_calls: 0,
        };
        let report = levmar_der(&mut problem, DVector::zeros(2), &LevMarOptions::default());
        assert_eq!(report.termination, Termination::InvalidValues);
        assert!(report.termination.is_failure());
        assert_eq!(report.termination.code(), 7);
    }

    #[test]
    fn test_exact_start_stops_on_gradient() {
        let mut problem = Line {
            x: vec![0.0, 1.0, 2.0],
            y: vec![1.0, 3.0, 5.0],
            jacobian_calls: 0,
        };
        let report = levmar_der(
            &mut problem,
            DVector::from_vec(vec![2.0, 1.0]),
            &LevMarOptions::default(),
        );
        assert_eq!(report.termination, Termination::SmallGradient);
        assert_eq!(report.iterations, 0);
    }
}
