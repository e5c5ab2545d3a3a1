//! Grid sampling of a known transformation.
//!
//! A regular `npoint × npoint` grid is laid over the bounding box and pushed
//! through a mapping. The grid positions become the fit *targets* and the
//! transformed positions the fit *inputs*, so fitting the table recovers the
//! opposite direction of the one sampled.

use crate::error::Result;
use crate::mapping::Mapping;
use crate::Points;

/// Paired fit inputs and targets, four columns of equal length.
///
/// The columns are resized in place so one table can be reused while the
/// grid grows.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    inputs: [Vec<f64>; 2],
    targets: [Vec<f64>; 2],
}

impl SampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn from_columns(inputs: [Vec<f64>; 2], targets: [Vec<f64>; 2]) -> Self {
        Self { inputs, targets }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.targets[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transformed positions, one column per axis.
    pub fn inputs(&self) -> [&[f64]; 2] {
        [&self.inputs[0], &self.inputs[1]]
    }

    /// Grid positions, one column per axis.
    pub fn targets(&self) -> [&[f64]; 2] {
        [&self.targets[0], &self.targets[1]]
    }

    /// Resample `mapping` on an `npoint × npoint` grid.
    ///
    /// `mapping` must take two coordinates; for a 1-D problem the caller
    /// supplies a mapping whose second axis passes through unchanged, and the
    /// second grid axis spans `[-1, 1]`. `forward` selects the direction of
    /// `mapping` that is applied. The first grid axis varies slowest.
    pub fn sample(
        &mut self,
        mapping: &Mapping,
        forward: bool,
        ndim: usize,
        lbnd: &[f64],
        ubnd: &[f64],
        npoint: usize,
    ) -> Result<()> {
        let nsamp = npoint * npoint;
        for col in self.inputs.iter_mut().chain(self.targets.iter_mut()) {
            col.resize(nsamp, 0.0);
        }

        let (lbnd1, ubnd1) = if ndim == 1 {
            (-1.0, 1.0)
        } else {
            (lbnd[1], ubnd[1])
        };
        let steps = npoint.saturating_sub(1).max(1) as f64;
        let delta0 = (ubnd[0] - lbnd[0]) / steps;
        let delta1 = (ubnd1 - lbnd1) / steps;

        let mut grid = Points::zeros(nsamp, 2);
        let mut s = 0;
        for i in 0..npoint {
            let val0 = lbnd[0] + i as f64 * delta0;
            for j in 0..npoint {
                let val1 = lbnd1 + j as f64 * delta1;
                self.targets[0][s] = val0;
                self.targets[1][s] = val1;
                grid[(s, 0)] = val0;
                grid[(s, 1)] = val1;
                s += 1;
            }
        }

        let out = mapping.transform(&grid, forward)?;
        for (axis, col) in self.inputs.iter_mut().enumerate() {
            for (dst, &src) in col.iter_mut().zip(out.column(axis).iter()) {
                *dst = src;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{CmpMap, UnitMap};
    use crate::PolyMap;

    #[test]
    fn test_grid_layout_and_reuse() {
        // y1 = 2·x1, y2 = x2 + 1
        let fwd = [2.0, 1.0, 1.0, 0.0, 1.0, 2.0, 0.0, 1.0, 1.0, 2.0, 0.0, 0.0];
        let map = Mapping::Poly(PolyMap::new(2, 2, &fwd, &[]).unwrap());

        let mut table = SampleTable::new();
        table.sample(&map, true, 2, &[0.0, -1.0], &[1.0, 1.0], 3).unwrap();
        assert_eq!(table.len(), 9);
        let [g0, g1] = table.targets();
        assert_eq!(g0, &[0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0]);
        assert_eq!(g1, &[-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0]);
        let [x1, x2] = table.inputs();
        assert_eq!(x1[4], 1.0);
        assert_eq!(x2[4], 1.0);

        table.sample(&map, true, 2, &[0.0, -1.0], &[1.0, 1.0], 5).unwrap();
        assert_eq!(table.len(), 25);
        assert_eq!(table.inputs()[0].len(), 25);
    }

    #[test]
    fn test_one_dimensional_sampling() {
        // y = 3·x, second axis synthesised
        let poly = PolyMap::new(1, 1, &[3.0, 1.0, 1.0], &[]).unwrap();
        let map = Mapping::Cmp(Box::new(
            CmpMap::new(Mapping::Poly(poly), Mapping::Unit(UnitMap::new(1)), false).unwrap(),
        ));
        let mut table = SampleTable::new();
        table.sample(&map, true, 1, &[2.0], &[4.0], 3).unwrap();
        let [g0, g1] = table.targets();
        let [x1, x2] = table.inputs();
        assert_eq!(g0[8], 4.0);
        assert_eq!(g1[8], 1.0);
        assert_eq!(x1[8], 12.0);
        assert_eq!(x2[8], 1.0);
    }

    #[test]
    fn test_missing_direction_propagates() {
        let map = Mapping::Poly(PolyMap::new(2, 2, &[1.0, 1.0, 1.0, 0.0], &[]).unwrap());
        let mut table = SampleTable::new();
        assert!(table
            .sample(&map, false, 2, &[0.0, 0.0], &[1.0, 1.0], 4)
            .is_err());
    }
}
