//! Residuals and Jacobian for a pair of dense 2-D polynomials.
//!
//! Two outputs are fitted at once, each a full polynomial in the two sampled
//! inputs:
//!
//! ```text
//! P_i(x1, x2) = Σ_{w1 < order1} Σ_{w2 < order2}  c[i·ncof + w1·order2 + w2] · x1^w1 · x2^w2
//! ```
//!
//! with `ncof = order1 · order2`. The residual for sample `k` of output `i`
//! is stored at `i·nsamp + k` and equals the predicted value minus the sampled
//! target. The model is linear in its coefficients, so the Jacobian is filled
//! on the first request and reported unchanged afterwards.

use nalgebra::{DMatrix, DVector};

use super::levmar::LeastSquaresProblem;
use super::sample::SampleTable;

/// Sample data prepared for one fit.
pub(crate) struct LevMarData<'a> {
    order1: usize,
    order2: usize,
    nsamp: usize,
    /// `x1^w1` for sample `k` at `k·order1 + w1`.
    xp1: Vec<f64>,
    /// `x2^w2` for sample `k` at `k·order2 + w2`.
    xp2: Vec<f64>,
    /// Targets for each output.
    y: [&'a [f64]; 2],
    jacobian_ready: bool,
}

impl<'a> LevMarData<'a> {
    pub(crate) fn new(order1: usize, order2: usize, table: &'a SampleTable) -> Self {
        let nsamp = table.len();
        let [x1, x2] = table.inputs();
        Self {
            order1,
            order2,
            nsamp,
            xp1: power_table(x1, order1),
            xp2: power_table(x2, order2),
            y: table.targets(),
            jacobian_ready: false,
        }
    }

    /// Coefficients per output.
    pub(crate) fn ncof(&self) -> usize {
        self.order1 * self.order2
    }

    /// Value of output `iout` at sample `k`.
    fn predict(&self, params: &DVector<f64>, iout: usize, k: usize) -> f64 {
        let base = iout * self.ncof();
        let px1 = &self.xp1[k * self.order1..(k + 1) * self.order1];
        let px2 = &self.xp2[k * self.order2..(k + 1) * self.order2];
        let mut sum = 0.0;
        for (w1, &a) in px1.iter().enumerate() {
            let row = base + w1 * self.order2;
            for (w2, &b) in px2.iter().enumerate() {
                sum += params[row + w2] * a * b;
            }
        }
        sum
    }

    /// Largest distance between predicted and sampled positions, using the
    /// first `ndim` outputs.
    pub(crate) fn max_residual(&self, params: &DVector<f64>, ndim: usize) -> f64 {
        (0..self.nsamp)
            .map(|k| {
                (0..ndim)
                    .map(|iout| {
                        let d = self.predict(params, iout, k) - self.y[iout][k];
                        d * d
                    })
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max)
    }

    /// Largest `|x1^w1 · x2^w2|` over all samples.
    pub(crate) fn max_term(&self, w1: usize, w2: usize) -> f64 {
        (0..self.nsamp)
            .map(|k| (self.xp1[k * self.order1 + w1] * self.xp2[k * self.order2 + w2]).abs())
            .fold(0.0, f64::max)
    }
}

/// Powers `0..order` of every sample value, one row per sample.
fn power_table(x: &[f64], order: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(x.len() * order);
    for &xk in x {
        let mut v = 1.0;
        for _ in 0..order {
            table.push(v);
            v *= xk;
        }
    }
    table
}

impl LeastSquaresProblem for LevMarData<'_> {
    fn num_params(&self) -> usize {
        2 * self.ncof()
    }

    fn num_residuals(&self) -> usize {
        2 * self.nsamp
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        for iout in 0..2 {
            for k in 0..self.nsamp {
                out[iout * self.nsamp + k] = self.predict(params, iout, k) - self.y[iout][k];
            }
        }
    }

    fn jacobian(&mut self, _params: &DVector<f64>, jac: &mut DMatrix<f64>) -> bool {
        if self.jacobian_ready {
            return false;
        }
        let ncof = self.ncof();
        jac.fill(0.0);
        for iout in 0..2 {
            for k in 0..self.nsamp {
                let r = iout * self.nsamp + k;
                for w1 in 0..self.order1 {
                    let a = self.xp1[k * self.order1 + w1];
                    for w2 in 0..self.order2 {
                        let c = iout * ncof + w1 * self.order2 + w2;
                        jac[(r, c)] = a * self.xp2[k * self.order2 + w2];
                    }
                }
            }
        }
        self.jacobian_ready = true;
        true
    }
}
