//! # polymap
//!
//! Polynomial coordinate mappings for N-dimensional points.
//!
//! A [`PolyMap`] transforms points through independently specified **forward**
//! and **inverse** multivariate polynomials. Each output axis is a sparse sum of
//! terms `c · x1^p1 · x2^p2 · …` with arbitrary non-negative integer powers.
//! When only one direction is known analytically, the other can be derived by
//! sampling the known direction on a regular grid and fitting a dense 2-D
//! polynomial surface with a Levenberg–Marquardt least-squares solver.
//!
//! ## Example
//!
//! ```no_run
//! use polymap::{PolyMap, Points};
//!
//! // y1 = x1, y2 = x2 + 0.1·x1³ ; inverse left undefined
//! let fwd = [
//!     1.0, 1.0, 1.0, 0.0,
//!     1.0, 2.0, 0.0, 1.0,
//!     0.1, 2.0, 3.0, 0.0,
//! ];
//! let map = PolyMap::new(2, 2, &fwd, &[]).unwrap();
//!
//! // Derive the inverse over [-1, 1] x [-1, 1] to 1e-6 accuracy.
//! let map = map.poly_tran(false, 1e-6, &[-1.0, -1.0], &[1.0, 1.0]).unwrap();
//!
//! let pts = Points::from_row_slice(1, 2, &[0.5, 0.25]);
//! let out = map.transform(&pts, true).unwrap();
//! let back = map.transform(&out, false).unwrap();
//! assert!((back[(0, 1)] - 0.25).abs() < 1e-6);
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Evaluation**: per point, powers `0..=max` of each input axis are built
//!    once and shared by every term of every output axis.
//! 2. **Sampling**: the known direction is applied to a `2·order × 2·order`
//!    grid covering the requested bounding box.
//! 3. **Fitting**: two dense polynomials (one per output) are fitted by
//!    Levenberg–Marquardt using a constant Jacobian; terms whose largest
//!    contribution over the samples is below the accuracy are pruned.
//! 4. **Order search**: orders 3 (quadratic) to 20 are tried until one meets
//!    the accuracy.
//! 5. **Simplification**: a PolyMap followed in series by itself used in the
//!    opposite direction collapses to identity mappings.

pub mod error;
pub mod fit;
pub mod mapping;
pub mod polymap;

pub use error::{PolyMapError, Result};
pub use fit::{FitSummary, PolyTranConfig};
pub use mapping::{CmpMap, MapList, Mapping, UnitMap};
pub use polymap::{Coefficient, Direction, PolyMap, Polynomial};

/// A batch of points: one row per point, one column per axis.
///
/// Column-major storage keeps each axis contiguous.
pub type Points = nalgebra::DMatrix<f64>;

/// Marker for a missing or undefined coordinate value.
///
/// Always test with [`is_bad`]; NaN never compares equal to itself.
pub const BAD: f64 = f64::NAN;

/// Returns `true` if `value` is the [`BAD`] marker.
#[inline]
pub fn is_bad(value: f64) -> bool {
    value.is_nan()
}
