//! Polynomial mapping with independent forward and inverse polynomials.
//!
//! The forward transformation maps the `nin` inputs to the `nout` outputs,
//! `Y = P_f(X)`; the inverse maps outputs back to inputs, `X = P_i(Y)`. Either
//! direction may be left undefined. An undefined direction is not the same as
//! a polynomial whose coefficients are all zero: it cannot be evaluated at all.
//!
//! # Invert flag
//!
//! Like every mapping, a `PolyMap` can be inverted. Inversion swaps which stored
//! polynomial is used for the effective forward transformation and swaps the
//! reported input and output counts; the stored coefficients never move.

pub mod coeffs;
pub mod equal;
pub mod persist;
pub mod polynomial;

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{PolyMapError, Result};
use crate::Points;

pub use coeffs::{Coefficient, MAX_POWER};
pub use equal::approx_eq;
pub use persist::KeyedFields;
pub use polynomial::{Polynomial, Term};

/// Transformation direction of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Inputs → outputs.
    Forward,
    /// Outputs → inputs.
    Inverse,
}

impl Direction {
    /// `Forward` if `forward` is true, otherwise `Inverse`.
    pub fn from_forward(forward: bool) -> Self {
        if forward {
            Direction::Forward
        } else {
            Direction::Inverse
        }
    }

    /// `true` for [`Direction::Forward`].
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    /// The other direction.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Inverse,
            Direction::Inverse => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Inverse => write!(f, "inverse"),
        }
    }
}

/// A mapping whose outputs are polynomial functions of its inputs.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct PolyMap {
    /// Inputs of the uninverted mapping.
    nin: usize,
    /// Outputs of the uninverted mapping.
    nout: usize,
    /// Stored forward polynomial (`nin` → `nout`), `None` if undefined.
    forward: Option<Polynomial>,
    /// Stored inverse polynomial (`nout` → `nin`), `None` if undefined.
    inverse: Option<Polynomial>,
    /// Swap the roles of the stored polynomials.
    invert: bool,
}

impl PolyMap {
    /// Create a PolyMap from flat coefficient arrays.
    ///
    /// `coeff_f` holds groups of `2 + nin` values `(value, output, powers…)`
    /// describing the forward transformation; `coeff_i` holds groups of
    /// `2 + nout` values `(value, input, powers…)` describing the inverse.
    /// Axis indices are 1-based. An empty array leaves that direction undefined.
    pub fn new(nin: usize, nout: usize, coeff_f: &[f64], coeff_i: &[f64]) -> Result<Self> {
        let fwd = coeffs::decode_flat(Direction::Forward, nout, nin, coeff_f)?;
        let inv = coeffs::decode_flat(Direction::Inverse, nin, nout, coeff_i)?;
        Self::from_coefficients(nin, nout, &fwd, &inv)
    }

    /// Create a PolyMap from coefficient triples.
    pub fn from_coefficients(
        nin: usize,
        nout: usize,
        coeff_f: &[Coefficient],
        coeff_i: &[Coefficient],
    ) -> Result<Self> {
        if nin == 0 || nout == 0 {
            return Err(PolyMapError::DimensionMismatch(format!(
                "a PolyMap needs at least one input and one output (got {} and {})",
                nin, nout
            )));
        }
        let mut map = Self {
            nin,
            nout,
            forward: None,
            inverse: None,
            invert: false,
        };
        map.set_coefficients(Direction::Forward, coeff_f)?;
        map.set_coefficients(Direction::Inverse, coeff_i)?;
        Ok(map)
    }

    pub(crate) fn from_parts(
        nin: usize,
        nout: usize,
        forward: Option<Polynomial>,
        inverse: Option<Polynomial>,
        invert: bool,
    ) -> Self {
        Self {
            nin,
            nout,
            forward,
            inverse,
            invert,
        }
    }

    /// Number of inputs, taking the Invert flag into account.
    pub fn nin(&self) -> usize {
        if self.invert {
            self.nout
        } else {
            self.nin
        }
    }

    /// Number of outputs, taking the Invert flag into account.
    pub fn nout(&self) -> usize {
        if self.invert {
            self.nin
        } else {
            self.nout
        }
    }

    /// Number of inputs of the stored (uninverted) forward polynomial.
    pub fn stored_nin(&self) -> usize {
        self.nin
    }

    /// Number of outputs of the stored (uninverted) forward polynomial.
    pub fn stored_nout(&self) -> usize {
        self.nout
    }

    /// Current state of the Invert flag.
    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Toggle the Invert flag.
    pub fn invert(&mut self) {
        self.invert = !self.invert;
    }

    /// Set the Invert flag.
    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    /// Is the effective forward transformation available?
    pub fn tran_forward(&self) -> bool {
        self.polynomial(self.stored_direction(true)).is_some()
    }

    /// Is the effective inverse transformation available?
    pub fn tran_inverse(&self) -> bool {
        self.polynomial(self.stored_direction(false)).is_some()
    }

    /// Stored direction used when the effective direction `forward` is requested.
    pub fn stored_direction(&self, forward: bool) -> Direction {
        Direction::from_forward(forward != self.invert)
    }

    /// Stored polynomial for a direction, ignoring the Invert flag.
    pub fn polynomial(&self, direction: Direction) -> Option<&Polynomial> {
        match direction {
            Direction::Forward => self.forward.as_ref(),
            Direction::Inverse => self.inverse.as_ref(),
        }
    }

    /// Stored coefficient triples for a direction, `None` if it is undefined.
    pub fn coefficients(&self, direction: Direction) -> Option<Vec<Coefficient>> {
        self.polynomial(direction).map(Polynomial::coefficients)
    }

    /// Stored coefficients in the flat encoding accepted by [`PolyMap::new`].
    /// An undefined direction yields an empty array.
    pub fn to_flat(&self, direction: Direction) -> Vec<f64> {
        self.coefficients(direction)
            .map(|c| coeffs::encode_flat(&c))
            .unwrap_or_default()
    }

    /// Replace the stored polynomial for one direction.
    ///
    /// All coefficients are validated before anything is replaced, so on error
    /// the map keeps its previous state. An empty slice makes the direction
    /// undefined.
    pub fn set_coefficients(&mut self, direction: Direction, coeffs: &[Coefficient]) -> Result<()> {
        let (naxes, npow) = self.poly_dims(direction);
        coeffs::validate(direction, naxes, npow, coeffs)?;
        let poly = if coeffs.is_empty() {
            None
        } else {
            Some(Polynomial::from_coefficients(npow, naxes, coeffs))
        };
        match direction {
            Direction::Forward => self.forward = poly,
            Direction::Inverse => self.inverse = poly,
        }
        Ok(())
    }

    /// Replace the stored polynomial for one direction from a flat array.
    pub fn set_flat(&mut self, direction: Direction, flat: &[f64]) -> Result<()> {
        let (naxes, npow) = self.poly_dims(direction);
        let coeffs = coeffs::decode_flat(direction, naxes, npow, flat)?;
        self.set_coefficients(direction, &coeffs)
    }

    /// Transform a batch of points.
    ///
    /// `forward` selects the effective direction (the Invert flag is honoured).
    pub fn transform(&self, points: &Points, forward: bool) -> Result<Points> {
        self.transform_stored(points, self.stored_direction(forward))
    }

    /// Transform a batch of points through a stored polynomial.
    pub fn transform_stored(&self, points: &Points, direction: Direction) -> Result<Points> {
        let effective = Direction::from_forward(direction.is_forward() != self.invert);
        let poly = self
            .polynomial(direction)
            .ok_or(PolyMapError::MissingDirection(effective))?;
        poly.evaluate(points)
    }

    /// (polynomial outputs, polynomial inputs) for a stored direction.
    fn poly_dims(&self, direction: Direction) -> (usize, usize) {
        match direction {
            Direction::Forward => (self.nout, self.nin),
            Direction::Inverse => (self.nin, self.nout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_bad;

    /// y1 = 1 + 2·x1, y2 = x1·x2 ; inverse x1 = (y1 - 1)/2, x2 undefined axis left empty
    fn sample_map() -> PolyMap {
        let fwd = [1.0, 1.0, 0.0, 0.0, 2.0, 1.0, 1.0, 0.0, 1.0, 2.0, 1.0, 1.0];
        let inv = [-0.5, 1.0, 0.0, 0.0, 0.5, 1.0, 1.0, 0.0];
        PolyMap::new(2, 2, &fwd, &inv).unwrap()
    }

    #[test]
    fn test_forward_and_inverse() {
        let map = sample_map();
        let pts = Points::from_row_slice(2, 2, &[1.0, 2.0, -3.0, 0.5]);
        let out = map.transform(&pts, true).unwrap();
        assert_eq!(out[(0, 0)], 3.0);
        assert_eq!(out[(0, 1)], 2.0);
        assert_eq!(out[(1, 0)], -5.0);
        assert_eq!(out[(1, 1)], -1.5);

        let back = map.transform(&out, false).unwrap();
        assert_eq!(back[(0, 0)], 1.0);
        assert_eq!(back[(1, 0)], -3.0);
        // no inverse terms for input 2
        assert_eq!(back[(0, 1)], 0.0);
    }

    #[test]
    fn test_undefined_direction() {
        let fwd = [1.0, 1.0, 1.0];
        let map = PolyMap::new(1, 1, &fwd, &[]).unwrap();
        assert!(map.tran_forward());
        assert!(!map.tran_inverse());
        let err = map.transform(&Points::zeros(1, 1), false).unwrap_err();
        assert_eq!(err, PolyMapError::MissingDirection(Direction::Inverse));
        assert!(map.coefficients(Direction::Inverse).is_none());
        assert!(map.to_flat(Direction::Inverse).is_empty());
    }

    #[test]
    fn test_all_zero_direction_is_defined() {
        let map = PolyMap::new(1, 1, &[0.0, 1.0, 0.0], &[]).unwrap();
        assert!(map.tran_forward());
        let out = map.transform(&Points::from_row_slice(1, 1, &[5.0]), true).unwrap();
        assert_eq!(out[(0, 0)], 0.0);
    }

    #[test]
    fn test_invert_swaps_directions() {
        let mut map = PolyMap::new(2, 1, &[3.0, 1.0, 1.0, 1.0], &[]).unwrap();
        assert_eq!((map.nin(), map.nout()), (2, 1));
        map.invert();
        assert_eq!((map.nin(), map.nout()), (1, 2));
        assert!(!map.tran_forward());
        assert!(map.tran_inverse());

        let pts = Points::from_row_slice(1, 2, &[2.0, 5.0]);
        let out = map.transform(&pts, false).unwrap();
        assert_eq!(out[(0, 0)], 30.0);
        assert_eq!(
            map.transform(&Points::zeros(1, 1), true).unwrap_err(),
            PolyMapError::MissingDirection(Direction::Forward)
        );
    }

    #[test]
    fn test_failed_store_keeps_previous_state() {
        let mut map = sample_map();
        let before = map.to_flat(Direction::Forward);
        let err = map
            .set_flat(Direction::Forward, &[1.0, 3.0, 0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, PolyMapError::BadAxisIndex { max: 2, .. }));
        assert_eq!(map.to_flat(Direction::Forward), before);
    }

    #[test]
    fn test_store_replaces_wholesale() {
        let mut map = sample_map();
        map.set_flat(Direction::Forward, &[7.0, 2.0, 0.0, 0.0]).unwrap();
        let poly = map.polynomial(Direction::Forward).unwrap();
        assert_eq!(poly.term_counts(), vec![0, 1]);
        assert_eq!(poly.max_power(), &[0, 0]);

        map.set_coefficients(Direction::Forward, &[]).unwrap();
        assert!(!map.tran_forward());
    }

    #[test]
    fn test_bad_value_in_transform() {
        let map = sample_map();
        let pts = Points::from_row_slice(1, 2, &[crate::BAD, 1.0]);
        let out = map.transform(&pts, true).unwrap();
        assert!(is_bad(out[(0, 0)]));
        assert!(is_bad(out[(0, 1)]));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            PolyMap::new(0, 1, &[], &[]),
            Err(PolyMapError::DimensionMismatch(_))
        ));
    }
}
