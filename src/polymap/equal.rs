//! Structural equality of polynomial mappings.
//!
//! Two PolyMaps are equal when they have the same shape, the same Invert flag,
//! and matching terms in matching order. An inverted PolyMap is never equal to
//! an uninverted one, even if the two describe the same transformation.

use super::{PolyMap, Polynomial};
use crate::is_bad;

/// Tolerance-based float comparison.
///
/// Two bad values are equal, a bad value never equals a good one, and two good
/// values are equal when they differ by no more than `1e5` times the larger of
/// their summed magnitude scaled by machine epsilon and the smallest positive
/// normal value.
pub fn approx_eq(a: f64, b: f64) -> bool {
    match (is_bad(a), is_bad(b)) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => {
            let scale = ((a.abs() + b.abs()) * f64::EPSILON).max(f64::MIN_POSITIVE);
            (a - b).abs() <= 1.0e5 * scale
        }
    }
}

impl Polynomial {
    /// Compare term counts, powers and coefficient values axis by axis.
    pub fn equals(&self, other: &Polynomial) -> bool {
        if self.nin() != other.nin() || self.nout() != other.nout() {
            return false;
        }
        if self.max_power() != other.max_power() {
            return false;
        }
        (0..self.nout()).all(|o| {
            let (a, b) = (self.terms(o), other.terms(o));
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|(ta, tb)| approx_eq(ta.coeff, tb.coeff) && ta.powers == tb.powers)
        })
    }
}

/// Both undefined, or both defined and equal.
pub(crate) fn same_direction(a: Option<&Polynomial>, b: Option<&Polynomial>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(pa), Some(pb)) => pa.equals(pb),
        _ => false,
    }
}

impl PolyMap {
    /// Test whether two PolyMaps are equivalent.
    pub fn equals(&self, other: &PolyMap) -> bool {
        use super::Direction::{Forward, Inverse};

        self.nin == other.nin
            && self.nout == other.nout
            && self.invert == other.invert
            && same_direction(self.polynomial(Forward), other.polynomial(Forward))
            && same_direction(self.polynomial(Inverse), other.polynomial(Inverse))
    }
}
