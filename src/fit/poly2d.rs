//! Least-squares fit of a pair of dense 2-D polynomials to a sample table.

use nalgebra::DVector;
use tracing::debug;

use crate::polymap::Coefficient;

use super::adapter::LevMarData;
use super::levmar::{levmar_der, LevMarOptions, Termination};
use super::sample::SampleTable;

/// A fit that met the required accuracy.
#[derive(Debug, Clone)]
pub(crate) struct Poly2dFit {
    /// Surviving terms as coefficient triples, output axis 1-based.
    pub coefficients: Vec<Coefficient>,
    /// Largest per-sample distance between fit and targets, before pruning.
    pub max_residual: f64,
    pub termination: Termination,
    pub iterations: usize,
}

/// Fit `ndim` outputs of the table with polynomials of the given orders.
///
/// Order is one more than the largest power, per input. A 1-D fit forces
/// `order2` to 2 so the synthetic second axis gets a linear fit. Returns
/// `None` if the solver fails or the fit misses `acc` at any sample.
///
/// Terms whose largest contribution over the samples is below `acc` are
/// dropped from the result.
pub(crate) fn fit_poly_2d(
    ndim: usize,
    acc: f64,
    order1: usize,
    order2: usize,
    table: &SampleTable,
    options: &LevMarOptions,
) -> Option<Poly2dFit> {
    let order2 = if ndim == 1 { 2 } else { order2 };
    let mut data = LevMarData::new(order1, order2, table);
    let ncof = data.ncof();

    // Start from the identity: x1 on output 1, x2 on output 2.
    let mut p = DVector::zeros(2 * ncof);
    p[order2] = 1.0;
    p[ncof + 1] = 1.0;

    let options = LevMarOptions {
        residual_tol: acc * acc,
        ..options.clone()
    };
    let report = levmar_der(&mut data, p, &options);
    if report.termination.is_failure() {
        debug!(
            "order {}x{}: solver failed ({})",
            order1, order2, report.termination
        );
        return None;
    }

    let max_residual = data.max_residual(&report.params, ndim);
    if !(max_residual <= acc) {
        debug!(
            "order {}x{}: max residual {:.3e} exceeds {:.3e}",
            order1, order2, max_residual, acc
        );
        return None;
    }

    let mut coefficients = Vec::new();
    let mut pruned = 0;
    for iout in 0..ndim {
        for w1 in 0..order1 {
            for w2 in 0..order2 {
                let c = report.params[iout * ncof + w1 * order2 + w2];
                if c == 0.0 {
                    continue;
                }
                if (c * data.max_term(w1, w2)).abs() < acc {
                    pruned += 1;
                    continue;
                }
                let powers = if ndim == 1 {
                    // The synthetic axis carries no information for a 1-D fit.
                    if w2 > 0 {
                        pruned += 1;
                        continue;
                    }
                    vec![w1 as u32]
                } else {
                    vec![w1 as u32, w2 as u32]
                };
                coefficients.push(Coefficient::new(c, iout + 1, powers));
            }
        }
    }

    debug!(
        "order {}x{}: {} terms kept, {} pruned, max residual {:.3e} ({}, {} iterations)",
        order1,
        order2,
        coefficients.len(),
        pruned,
        max_residual,
        report.termination,
        report.iterations
    );

    Some(Poly2dFit {
        coefficients,
        max_residual,
        termination: report.termination,
        iterations: report.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Regular grid over [-2, 2]², inputs and targets related by `f`.
    fn grid_table(n: usize, f: impl Fn(f64, f64) -> (f64, f64)) -> SampleTable {
        let mut x = [Vec::new(), Vec::new()];
        let mut y = [Vec::new(), Vec::new()];
        for i in 0..n {
            for j in 0..n {
                let a = -2.0 + 4.0 * i as f64 / (n - 1) as f64;
                let b = -2.0 + 4.0 * j as f64 / (n - 1) as f64;
                let (ya, yb) = f(a, b);
                x[0].push(a);
                x[1].push(b);
                y[0].push(ya);
                y[1].push(yb);
            }
        }
        SampleTable::from_columns(x, y)
    }

    #[test]
    fn test_identity_needs_no_iterations() {
        let table = grid_table(6, |a, b| (a, b));
        let fit = fit_poly_2d(2, 1e-6, 3, 3, &table, &LevMarOptions::default()).unwrap();
        assert_eq!(fit.iterations, 0);
        assert_eq!(
            fit.coefficients,
            vec![
                Coefficient::new(1.0, 1, vec![1, 0]),
                Coefficient::new(1.0, 2, vec![0, 1]),
            ]
        );
    }

    #[test]
    fn test_quadratic_surface() {
        // y1 = 0.5 + x1·x2, y2 = x2 - 0.25·x1²
        let table = grid_table(6, |a, b| (0.5 + a * b, b - 0.25 * a * a));
        let fit = fit_poly_2d(2, 1e-8, 3, 3, &table, &LevMarOptions::default()).unwrap();
        assert!(fit.max_residual <= 1e-8);

        let find = |axis: usize, powers: [u32; 2]| {
            fit.coefficients
                .iter()
                .find(|c| c.axis == axis && c.powers == powers)
                .map(|c| c.value)
        };
        assert!((find(1, [0, 0]).unwrap() - 0.5).abs() < 1e-6);
        assert!((find(1, [1, 1]).unwrap() - 1.0).abs() < 1e-6);
        assert!((find(2, [0, 1]).unwrap() - 1.0).abs() < 1e-6);
        assert!((find(2, [2, 0]).unwrap() + 0.25).abs() < 1e-6);
        // the identity seed term on output 1 is fitted away
        assert!(find(1, [1, 0]).map_or(true, |v| v.abs() < 1e-6));
    }

    #[test]
    fn test_insufficient_order_fails() {
        // cubic cannot be reproduced by a quadratic
        let table = grid_table(6, |a, b| (a * a * a, b));
        assert!(fit_poly_2d(2, 1e-6, 3, 3, &table, &LevMarOptions::default()).is_none());
        assert!(fit_poly_2d(2, 1e-6, 4, 4, &table, &LevMarOptions::default()).is_some());
    }

    #[test]
    fn test_small_terms_are_pruned() {
        // 1e-7·x2² never contributes more than 4e-7 on the grid
        let table = grid_table(6, |a, b| (a + 1e-7 * b * b, b));
        let fit = fit_poly_2d(2, 1e-6, 3, 3, &table, &LevMarOptions::default()).unwrap();
        assert!(fit
            .coefficients
            .iter()
            .all(|c| !(c.axis == 1 && c.powers == [0, 2])));
        assert!(fit
            .coefficients
            .contains(&Coefficient::new(1.0, 2, vec![0, 1])));
    }

    #[test]
    fn test_one_dimensional_fit() {
        // y = 2·x - 1 with the synthetic axis passed through
        let table = grid_table(6, |a, b| (2.0 * a - 1.0, b));
        let fit = fit_poly_2d(1, 1e-8, 3, 3, &table, &LevMarOptions::default()).unwrap();
        assert!(fit.coefficients.iter().all(|c| c.axis == 1 && c.powers.len() == 1));
        let value = |p: u32| {
            fit.coefficients
                .iter()
                .find(|c| c.powers[0] == p)
                .map_or(0.0, |c| c.value)
        };
        assert!((value(0) + 1.0).abs() < 1e-6);
        assert!((value(1) - 2.0).abs() < 1e-6);
    }
}
