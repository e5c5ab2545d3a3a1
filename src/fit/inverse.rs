//! Order search that replaces one direction of a PolyMap with a fitted one.

use tracing::debug;

use crate::error::{PolyMapError, Result};
use crate::mapping::{CmpMap, Mapping, UnitMap};
use crate::polymap::{Direction, PolyMap};

use super::poly2d::fit_poly_2d;
use super::sample::SampleTable;
use super::{FitSummary, PolyTranConfig};

impl PolyMap {
    /// Replace one direction with a fit to the other, using default settings.
    ///
    /// See [`PolyMap::create_inverse_with_config`].
    pub fn create_inverse(
        &mut self,
        forward: bool,
        acc: f64,
        lbnd: &[f64],
        ubnd: &[f64],
    ) -> Result<FitSummary> {
        self.create_inverse_with_config(forward, acc, lbnd, ubnd, &PolyTranConfig::default())
    }

    /// Replace one direction with a fit to the other.
    ///
    /// If `forward` is true the effective forward transformation is replaced
    /// by a fit to the effective inverse, otherwise the reverse. The known
    /// direction is sampled over the box `lbnd..ubnd`, given in the input
    /// space of the known direction, and orders `min_order..=max_order` are
    /// tried until a fit reproduces every sample to within `acc`.
    ///
    /// The map must have equal input and output counts, 1 or 2. On error the
    /// map is unchanged.
    pub fn create_inverse_with_config(
        &mut self,
        forward: bool,
        acc: f64,
        lbnd: &[f64],
        ubnd: &[f64],
        config: &PolyTranConfig,
    ) -> Result<FitSummary> {
        let ndim = self.nin();
        if ndim != self.nout() {
            return Err(PolyMapError::DimensionMismatch(format!(
                "cannot fit a mapping with {} inputs and {} outputs; counts must be equal",
                self.nin(),
                self.nout()
            )));
        }
        if ndim > 2 {
            return Err(PolyMapError::DimensionMismatch(format!(
                "cannot fit a mapping with {} inputs and outputs; at most 2 are supported",
                ndim
            )));
        }
        check_bounds(ndim, lbnd, ubnd)?;

        let known = !forward;
        let available = if known {
            self.tran_forward()
        } else {
            self.tran_inverse()
        };
        if !available {
            return Err(PolyMapError::MissingDirection(Direction::from_forward(known)));
        }

        let sampler = if ndim == 1 {
            Mapping::Cmp(Box::new(CmpMap::new(
                Mapping::Poly(self.clone()),
                Mapping::Unit(UnitMap::new(1)),
                false,
            )?))
        } else {
            Mapping::Poly(self.clone())
        };

        let min_order = config.min_order.max(2);
        let points_per_order = config.points_per_order.max(1);
        let mut table = SampleTable::new();

        for order in min_order..=config.max_order {
            let npoint = (points_per_order * order).max(2);
            table.sample(&sampler, known, ndim, lbnd, ubnd, npoint)?;

            let Some(fit) = fit_poly_2d(ndim, acc, order, order, &table, &config.solver) else {
                debug!(
                    "order {} rejected for the {} transformation",
                    order,
                    Direction::from_forward(forward)
                );
                continue;
            };

            let direction = self.stored_direction(forward);
            self.set_coefficients(direction, &fit.coefficients)?;
            debug!(
                "fitted {} transformation at order {} with {} terms",
                Direction::from_forward(forward),
                order,
                fit.coefficients.len()
            );
            return Ok(FitSummary {
                direction,
                order,
                samples: table.len(),
                coefficients: fit.coefficients.len(),
                max_residual: fit.max_residual,
                termination: fit.termination,
                iterations: fit.iterations,
            });
        }

        Err(PolyMapError::FitFailed {
            direction: Direction::from_forward(forward),
            max_order: config.max_order,
        })
    }

    /// Return a copy of the map with one direction replaced by a fit.
    ///
    /// `self` is never modified. See [`PolyMap::create_inverse_with_config`].
    pub fn poly_tran(&self, forward: bool, acc: f64, lbnd: &[f64], ubnd: &[f64]) -> Result<PolyMap> {
        self.poly_tran_with_config(forward, acc, lbnd, ubnd, &PolyTranConfig::default())
    }

    pub fn poly_tran_with_config(
        &self,
        forward: bool,
        acc: f64,
        lbnd: &[f64],
        ubnd: &[f64],
        config: &PolyTranConfig,
    ) -> Result<PolyMap> {
        let mut result = self.clone();
        result.create_inverse_with_config(forward, acc, lbnd, ubnd, config)?;
        Ok(result)
    }
}

fn check_bounds(ndim: usize, lbnd: &[f64], ubnd: &[f64]) -> Result<()> {
    if lbnd.len() < ndim || ubnd.len() < ndim {
        return Err(PolyMapError::BadBounds(format!(
            "{} bounds needed per side, got {} lower and {} upper",
            ndim,
            lbnd.len(),
            ubnd.len()
        )));
    }
    for axis in 0..ndim {
        let (lo, hi) = (lbnd[axis], ubnd[axis]);
        if !lo.is_finite() || !hi.is_finite() || lo == hi {
            return Err(PolyMapError::BadBounds(format!(
                "axis {} spans [{}, {}]",
                axis + 1,
                lo,
                hi
            )));
        }
    }
    Ok(())
}
