//! Derivation of a missing transformation direction by least-squares fitting.
//!
//! The known direction is sampled on a regular grid over a bounding box, and a
//! dense polynomial of increasing order is fitted to the samples until one
//! reproduces them to the requested accuracy. Only 1-D and 2-D mappings with
//! equal input and output counts can be fitted.

mod adapter;
mod inverse;
pub mod levmar;
mod poly2d;
pub mod sample;

use crate::polymap::Direction;

pub use levmar::{levmar_der, LeastSquaresProblem, LevMarOptions, LevMarReport, Termination};
pub use sample::SampleTable;

/// Configuration for the order search in [`PolyMap::create_inverse_with_config`](crate::PolyMap::create_inverse_with_config).
#[derive(Debug, Clone)]
pub struct PolyTranConfig {
    /// First order tried (one more than the largest power). Default 3.
    pub min_order: usize,
    /// Last order tried before giving up. Default 20.
    pub max_order: usize,
    /// Grid points per axis for each unit of order. Default 2.
    pub points_per_order: usize,
    /// Solver settings. The residual tolerance is replaced by the squared
    /// accuracy for every fit.
    pub solver: LevMarOptions,
}

impl Default for PolyTranConfig {
    fn default() -> Self {
        Self {
            min_order: 3,
            max_order: 20,
            points_per_order: 2,
            solver: LevMarOptions::default(),
        }
    }
}

/// Result of a successful inverse derivation.
#[derive(Debug, Clone)]
pub struct FitSummary {
    /// Stored direction that received the new coefficients.
    pub direction: Direction,
    /// Order of the accepted fit.
    pub order: usize,
    /// Number of grid samples used.
    pub samples: usize,
    /// Number of coefficients kept after pruning.
    pub coefficients: usize,
    /// Largest per-sample distance between fit and samples, before pruning.
    pub max_residual: f64,
    /// Solver termination for the accepted fit.
    pub termination: Termination,
    /// Solver iterations for the accepted fit.
    pub iterations: usize,
}
