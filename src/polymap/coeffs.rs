//! Coefficient triples and the flat `(value, axis, powers…)` encoding.
//!
//! A flat coefficient array is a sequence of groups of `2 + npow` values. The
//! first value of a group is the coefficient, the second is the 1-based index
//! of the polynomial output that uses it, and the remaining `npow` values are
//! the powers of each polynomial input. Axis indices and powers are rounded to
//! the nearest integer before validation.

use crate::error::{PolyMapError, Result};

use super::Direction;

/// Largest power accepted for any input axis.
///
/// Evaluation keeps `x^0 ..= x^max` for every input axis of a point.
pub const MAX_POWER: u32 = 1000;

/// One term of one output axis: `value · Π x_k^powers[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    /// Coefficient value.
    pub value: f64,
    /// 1-based index of the output axis whose polynomial uses this term.
    pub axis: usize,
    /// Power of each polynomial input.
    pub powers: Vec<u32>,
}

impl Coefficient {
    pub fn new(value: f64, axis: usize, powers: Vec<u32>) -> Self {
        Self {
            value,
            axis,
            powers,
        }
    }
}

/// Decode a flat coefficient array.
///
/// `naxes` is the number of polynomial outputs (legal axis indices are
/// `1..=naxes`) and `npow` the number of polynomial inputs.
pub(crate) fn decode_flat(
    direction: Direction,
    naxes: usize,
    npow: usize,
    flat: &[f64],
) -> Result<Vec<Coefficient>> {
    let group = 2 + npow;
    if flat.len() % group != 0 {
        return Err(PolyMapError::BadCoefficientArray {
            direction,
            reason: format!(
                "array length {} is not a multiple of the group size {}",
                flat.len(),
                group
            ),
        });
    }

    flat.chunks_exact(group)
        .enumerate()
        .map(|(i, g)| {
            let axis = round_index(g[1]);
            if axis < 1 || axis > naxes as i64 {
                return Err(PolyMapError::BadAxisIndex {
                    direction,
                    coefficient: i + 1,
                    axis,
                    max: naxes,
                });
            }
            let powers = g[2..]
                .iter()
                .enumerate()
                .map(|(k, &p)| {
                    let bad = |power: f64| PolyMapError::BadPower {
                        direction,
                        coefficient: i + 1,
                        power,
                        axis: k + 1,
                    };
                    if !p.is_finite() {
                        return Err(bad(p));
                    }
                    let power = round_index(p);
                    u32::try_from(power)
                        .ok()
                        .filter(|&v| v <= MAX_POWER)
                        .ok_or_else(|| bad(power as f64))
                })
                .collect::<Result<Vec<u32>>>()?;
            Ok(Coefficient::new(g[0], axis as usize, powers))
        })
        .collect()
}

/// Encode coefficients into the flat layout accepted by [`decode_flat`].
pub(crate) fn encode_flat(coeffs: &[Coefficient]) -> Vec<f64> {
    let mut flat = Vec::with_capacity(coeffs.iter().map(|c| 2 + c.powers.len()).sum());
    for c in coeffs {
        flat.push(c.value);
        flat.push(c.axis as f64);
        flat.extend(c.powers.iter().map(|&p| p as f64));
    }
    flat
}

/// Check typed coefficients against the axis counts of a direction.
pub(crate) fn validate(
    direction: Direction,
    naxes: usize,
    npow: usize,
    coeffs: &[Coefficient],
) -> Result<()> {
    for (i, c) in coeffs.iter().enumerate() {
        if c.axis < 1 || c.axis > naxes {
            return Err(PolyMapError::BadAxisIndex {
                direction,
                coefficient: i + 1,
                axis: c.axis as i64,
                max: naxes,
            });
        }
        if let Some((k, &p)) = c.powers.iter().enumerate().find(|&(_, &p)| p > MAX_POWER) {
            return Err(PolyMapError::BadPower {
                direction,
                coefficient: i + 1,
                power: p as f64,
                axis: k + 1,
            });
        }
        if c.powers.len() != npow {
            return Err(PolyMapError::BadCoefficientArray {
                direction,
                reason: format!(
                    "coefficient {} has {} powers, expected {}",
                    i + 1,
                    c.powers.len(),
                    npow
                ),
            });
        }
    }
    Ok(())
}

/// Round to the nearest integer the way axis indices and powers are read.
#[inline]
fn round_index(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}
