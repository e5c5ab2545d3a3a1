//! Error types for polynomial mappings.

use thiserror::Error;

use crate::polymap::Direction;

/// Result type alias using [`PolyMapError`].
pub type Result<T> = std::result::Result<T, PolyMapError>;

/// Errors raised while building, evaluating, fitting or loading a [`PolyMap`](crate::PolyMap).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolyMapError {
    /// A coefficient refers to an axis outside `1..=max`.
    #[error("{direction} coefficient {coefficient} referred to an illegal axis {axis} (should be in the range 1 to {max})")]
    BadAxisIndex {
        /// Direction the coefficient belongs to.
        direction: Direction,
        /// 1-based index of the offending coefficient.
        coefficient: usize,
        /// Axis index after rounding.
        axis: i64,
        /// Largest legal axis index.
        max: usize,
    },

    /// A coefficient uses a negative, non-finite or excessive power.
    #[error("{direction} coefficient {coefficient} has an illegal power ({power}) for axis {axis} (should be in the range 0 to {max})", max = crate::polymap::MAX_POWER)]
    BadPower {
        /// Direction the coefficient belongs to.
        direction: Direction,
        /// 1-based index of the offending coefficient.
        coefficient: usize,
        /// Power after rounding, or the raw value if it was not finite.
        power: f64,
        /// 1-based axis the power applies to.
        axis: usize,
    },

    /// A flat coefficient array or power vector has the wrong length.
    #[error("{direction} coefficients: {reason}")]
    BadCoefficientArray {
        /// Direction the coefficients belong to.
        direction: Direction,
        /// What was wrong with the array.
        reason: String,
    },

    /// Input/output counts are unusable for the requested operation.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The requested transformation (or the one needed to derive it) is not defined.
    #[error("the {0} transformation is not defined")]
    MissingDirection(Direction),

    /// No polynomial order up to the limit reached the required accuracy.
    #[error("failed to find a new {direction} transformation: fit failed up to order {max_order}")]
    FitFailed {
        /// Direction that was being derived.
        direction: Direction,
        /// Highest order attempted.
        max_order: usize,
    },

    /// Sampling bounds are missing or degenerate.
    #[error("bad sampling bounds: {0}")]
    BadBounds(String),

    /// A point batch does not have the expected number of coordinates.
    #[error("expected points with {expected} coordinates, got {got}")]
    BadPoints {
        /// Coordinates per point required by the mapping.
        expected: usize,
        /// Coordinates per point supplied.
        got: usize,
    },

    /// Keyed-field state could not be read back.
    #[error("persisted state error: {0}")]
    Persist(String),
}
