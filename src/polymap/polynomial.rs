//! One direction of a polynomial mapping.
//!
//! Each output axis is an independent sparse polynomial of all inputs:
//!
//! ```text
//! y_o = Σ_j  c_oj · Π_k  x_k ^ p_ojk
//! ```
//!
//! Terms are kept per output axis in the order they were supplied. The largest
//! power used for each input axis is cached so evaluation can build the powers
//! `x_k^0 ..= x_k^max` once per point and share them across every term.
//!
//! Bad input values ([`BAD`]) only poison the terms that actually use the axis:
//! `x^0` is always 1, so a constant term survives a bad input on any axis.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{PolyMapError, Result};
use crate::{is_bad, Points, BAD};

use super::coeffs::Coefficient;

/// A single polynomial term.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Term {
    /// Coefficient value.
    pub coeff: f64,
    /// Power of each input axis.
    pub powers: Vec<u32>,
}

/// Coefficients for one transformation direction.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct Polynomial {
    /// Number of polynomial inputs.
    nin: usize,
    /// Terms for each output axis.
    axes: Vec<Vec<Term>>,
    /// Largest power of each input axis used by any term.
    max_power: Vec<u32>,
}

impl Polynomial {
    /// Build a polynomial from validated coefficient triples.
    ///
    /// The caller guarantees every `axis` lies in `1..=nout` and every power
    /// vector has `nin` entries.
    pub(crate) fn from_coefficients(nin: usize, nout: usize, coeffs: &[Coefficient]) -> Self {
        let mut axes: Vec<Vec<Term>> = vec![Vec::new(); nout];
        for c in coeffs {
            axes[c.axis - 1].push(Term {
                coeff: c.value,
                powers: c.powers.clone(),
            });
        }
        Self::from_axes(nin, axes)
    }

    /// Build a polynomial from per-axis term lists, computing the power cache.
    pub(crate) fn from_axes(nin: usize, axes: Vec<Vec<Term>>) -> Self {
        let mut max_power = vec![0u32; nin];
        for term in axes.iter().flatten() {
            for (mp, &p) in max_power.iter_mut().zip(&term.powers) {
                *mp = (*mp).max(p);
            }
        }
        Self {
            nin,
            axes,
            max_power,
        }
    }

    /// Number of polynomial inputs.
    pub fn nin(&self) -> usize {
        self.nin
    }

    /// Number of polynomial outputs.
    pub fn nout(&self) -> usize {
        self.axes.len()
    }

    /// Terms of output axis `axis` (0-based), in stored order.
    pub fn terms(&self, axis: usize) -> &[Term] {
        &self.axes[axis]
    }

    /// Number of terms on each output axis.
    pub fn term_counts(&self) -> Vec<usize> {
        self.axes.iter().map(Vec::len).collect()
    }

    /// Total number of terms across all output axes.
    pub fn num_terms(&self) -> usize {
        self.axes.iter().map(Vec::len).sum()
    }

    /// Largest power used for each input axis.
    pub fn max_power(&self) -> &[u32] {
        &self.max_power
    }

    /// Export the terms as coefficient triples, axis by axis.
    pub fn coefficients(&self) -> Vec<Coefficient> {
        self.axes
            .iter()
            .enumerate()
            .flat_map(|(o, terms)| {
                terms
                    .iter()
                    .map(move |t| Coefficient::new(t.coeff, o + 1, t.powers.clone()))
            })
            .collect()
    }

    /// Evaluate the polynomial at every point of a batch.
    ///
    /// `points` must have `nin` columns; the result has `nout` columns.
    pub fn evaluate(&self, points: &Points) -> Result<Points> {
        if points.ncols() != self.nin {
            return Err(PolyMapError::BadPoints {
                expected: self.nin,
                got: points.ncols(),
            });
        }

        let npoint = points.nrows();
        let mut out = Points::zeros(npoint, self.nout());
        let mut powers = PowerTable::new(&self.max_power);
        let mut x = vec![0.0; self.nin];
        let mut y = vec![0.0; self.nout()];

        for point in 0..npoint {
            for (k, xk) in x.iter_mut().enumerate() {
                *xk = points[(point, k)];
            }
            self.evaluate_point(&x, &mut powers, &mut y);
            for (o, &yo) in y.iter().enumerate() {
                out[(point, o)] = yo;
            }
        }
        Ok(out)
    }

    /// Evaluate at a single point using caller-provided scratch.
    pub(crate) fn evaluate_point(&self, x: &[f64], powers: &mut PowerTable, y: &mut [f64]) {
        powers.fill(x);
        for (yo, terms) in y.iter_mut().zip(&self.axes) {
            *yo = sum_terms(terms, powers);
        }
    }
}

/// Sum the terms of one output axis. Any bad factor makes the whole sum bad.
fn sum_terms(terms: &[Term], powers: &PowerTable) -> f64 {
    let mut sum = 0.0;
    for term in terms {
        if is_bad(term.coeff) {
            return BAD;
        }
        let mut value = term.coeff;
        for (k, &p) in term.powers.iter().enumerate() {
            if p > 0 {
                let xp = powers.get(k, p);
                if is_bad(xp) {
                    return BAD;
                }
                value *= xp;
            }
        }
        sum += value;
    }
    sum
}

/// Per-point scratch holding `x_k^0 ..= x_k^max` for each input axis.
pub(crate) struct PowerTable {
    rows: Vec<Vec<f64>>,
}

impl PowerTable {
    pub(crate) fn new(max_power: &[u32]) -> Self {
        Self {
            rows: max_power
                .iter()
                .map(|&mp| vec![1.0; mp as usize + 1])
                .collect(),
        }
    }

    fn fill(&mut self, x: &[f64]) {
        for (row, &xk) in self.rows.iter_mut().zip(x) {
            row[0] = 1.0;
            if is_bad(xk) {
                row[1..].fill(BAD);
            } else {
                for ip in 1..row.len() {
                    row[ip] = row[ip - 1] * xk;
                }
            }
        }
    }

    #[inline]
    fn get(&self, axis: usize, power: u32) -> f64 {
        self.rows[axis][power as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(nin: usize, nout: usize, coeffs: &[Coefficient]) -> Polynomial {
        Polynomial::from_coefficients(nin, nout, coeffs)
    }

    #[test]
    fn test_max_power_cache() {
        let p = poly(
            3,
            2,
            &[
                Coefficient::new(1.0, 1, vec![2, 0, 1]),
                Coefficient::new(1.0, 2, vec![0, 4, 0]),
                Coefficient::new(1.0, 2, vec![1, 0, 3]),
            ],
        );
        assert_eq!(p.max_power(), &[2, 4, 3]);
        assert_eq!(p.term_counts(), vec![1, 2]);
        assert_eq!(p.num_terms(), 3);
    }

    #[test]
    fn test_single_term_value() {
        // 1.2 · x1 · x3³ on output 2 of a 3-in/2-out polynomial
        let p = poly(3, 2, &[Coefficient::new(1.2, 2, vec![1, 0, 3])]);
        let pts = Points::from_row_slice(1, 3, &[2.0, BAD, 3.0]);
        let out = p.evaluate(&pts).unwrap();
        assert_eq!(out[(0, 0)], 0.0);
        assert!((out[(0, 1)] - 64.8).abs() < 1e-12, "got {}", out[(0, 1)]);
    }

    #[test]
    fn test_bad_input_only_poisons_terms_using_it() {
        // y1 = 5 + x2, y2 = 7 + 2·x1
        let p = poly(
            2,
            2,
            &[
                Coefficient::new(5.0, 1, vec![0, 0]),
                Coefficient::new(1.0, 1, vec![0, 1]),
                Coefficient::new(7.0, 2, vec![0, 0]),
                Coefficient::new(2.0, 2, vec![1, 0]),
            ],
        );
        let pts = Points::from_row_slice(2, 2, &[BAD, 3.0, 1.0, BAD]);
        let out = p.evaluate(&pts).unwrap();
        assert_eq!(out[(0, 0)], 8.0);
        assert!(is_bad(out[(0, 1)]));
        assert!(is_bad(out[(1, 0)]));
        assert_eq!(out[(1, 1)], 9.0);
    }

    #[test]
    fn test_constant_survives_bad_inputs() {
        let p = poly(2, 1, &[Coefficient::new(4.5, 1, vec![0, 0])]);
        let pts = Points::from_row_slice(1, 2, &[BAD, BAD]);
        let out = p.evaluate(&pts).unwrap();
        assert_eq!(out[(0, 0)], 4.5);
    }

    #[test]
    fn test_bad_coefficient() {
        let p = poly(
            1,
            1,
            &[
                Coefficient::new(1.0, 1, vec![1]),
                Coefficient::new(BAD, 1, vec![0]),
            ],
        );
        let out = p.evaluate(&Points::from_row_slice(1, 1, &[2.0])).unwrap();
        assert!(is_bad(out[(0, 0)]));
    }

    #[test]
    fn test_axis_without_terms_is_zero() {
        let p = poly(1, 2, &[Coefficient::new(3.0, 1, vec![2])]);
        let out = p.evaluate(&Points::from_row_slice(1, 1, &[2.0])).unwrap();
        assert_eq!(out[(0, 0)], 12.0);
        assert_eq!(out[(0, 1)], 0.0);
    }

    #[test]
    fn test_wrong_point_width() {
        let p = poly(2, 1, &[Coefficient::new(1.0, 1, vec![1, 0])]);
        let err = p.evaluate(&Points::zeros(3, 1)).unwrap_err();
        assert_eq!(
            err,
            PolyMapError::BadPoints {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_coefficients_roundtrip_order() {
        let coeffs = vec![
            Coefficient::new(1.0, 2, vec![1]),
            Coefficient::new(2.0, 1, vec![0]),
            Coefficient::new(3.0, 2, vec![2]),
        ];
        let p = poly(1, 2, &coeffs);
        // grouped by axis, stored order kept within each axis
        assert_eq!(
            p.coefficients(),
            vec![
                Coefficient::new(2.0, 1, vec![0]),
                Coefficient::new(1.0, 2, vec![1]),
                Coefficient::new(3.0, 2, vec![2]),
            ]
        );
    }
}
