//! Python bindings for polymap via PyO3.
//!
//! Exposes polynomial coordinate mappings to Python as the `polymap` module.

use pyo3::prelude::*;

use polymap::mapping::simplify;
use polymap::{CmpMap, Mapping};

mod poly_map;

use crate::poly_map::{value_error, PyPolyMap};

// ═══════════════════════════════════════════════════════════════════════════
// Series simplification
// ═══════════════════════════════════════════════════════════════════════════

/// Check whether two PolyMaps applied in series cancel to an identity.
///
/// Args:
///     first: Mapping applied first.
///     second: Mapping applied to the output of `first`.
///
/// Returns:
///     True if the pair simplifies to a unit mapping.
#[pyfunction]
fn series_cancels(first: &PyPolyMap, second: &PyPolyMap) -> PyResult<bool> {
    let chain = CmpMap::new(first.inner.clone().into(), second.inner.clone().into(), true).map_err(value_error)?;
    let simplified = simplify(chain.into()).map_err(value_error)?;
    Ok(matches!(simplified, Mapping::Unit(_)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Module definition
// ═══════════════════════════════════════════════════════════════════════════

/// polymap: polynomial coordinate mappings
///
/// Sparse multivariate polynomial transformations with least-squares
/// derivation of a missing direction, exposed to Python via PyO3.
#[pymodule(name = "polymap")]
fn polymap_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPolyMap>()?;
    m.add_function(wrap_pyfunction!(series_cancels, m)?)?;
    Ok(())
}
