use numpy::ndarray;
use numpy::{PyArray1, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

use polymap::polymap::KeyedFields;
use polymap::{Direction, PolyMap, PolyMapError, PolyTranConfig, Points};

pub(crate) fn value_error(e: PolyMapError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

fn direction(forward: bool) -> Direction {
    Direction::from_forward(forward)
}

/// Copy an (N, ncoord) numpy array into a point batch.
fn points_from_array(points: &PyReadonlyArray2<f64>) -> Points {
    let arr = points.as_array();
    let (npoint, ncoord) = (arr.shape()[0], arr.shape()[1]);
    Points::from_fn(npoint, ncoord, |r, c| arr[[r, c]])
}

fn points_to_array<'py>(py: Python<'py>, points: &Points) -> Bound<'py, PyArray2<f64>> {
    let data = ndarray::Array2::from_shape_fn((points.nrows(), points.ncols()), |(r, c)| points[(r, c)]);
    PyArray2::from_owned_array(py, data)
}

/// A polynomial coordinate mapping with forward and inverse polynomials.
///
/// Coefficients are given as flat arrays of records
/// `[c, axis, p1, ..., pN]`, where `axis` is the 1-based output axis and
/// `p1..pN` are the integer powers of each input coordinate. An empty array
/// leaves that direction undefined.
///
/// Example:
///     m = polymap.PolyMap(2, 2, [1, 1, 1, 0, 1, 2, 0, 1, 0.1, 2, 3, 0])
///     m = m.poly_tran(forward=False, acc=1e-6, lbnd=[-1, -1], ubnd=[1, 1])
///     xy = m.transform(np.array([[0.5, 0.25]]), forward=True)
#[pyclass(name = "PolyMap", frozen, from_py_object)]
#[derive(Clone)]
pub(crate) struct PyPolyMap {
    pub(crate) inner: PolyMap,
}

#[pymethods]
impl PyPolyMap {
    /// Create a PolyMap.
    ///
    /// Args:
    ///     nin: Number of input coordinates.
    ///     nout: Number of output coordinates.
    ///     coeff_f: Flat forward coefficient records. Default empty.
    ///     coeff_i: Flat inverse coefficient records. Default empty.
    #[new]
    #[pyo3(signature = (nin, nout, coeff_f = Vec::new(), coeff_i = Vec::new()))]
    fn new(nin: usize, nout: usize, coeff_f: Vec<f64>, coeff_i: Vec<f64>) -> PyResult<Self> {
        let inner = PolyMap::new(nin, nout, &coeff_f, &coeff_i).map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Number of input coordinates, taking the invert flag into account.
    #[getter]
    fn nin(&self) -> usize {
        self.inner.nin()
    }

    /// Number of output coordinates, taking the invert flag into account.
    #[getter]
    fn nout(&self) -> usize {
        self.inner.nout()
    }

    #[getter]
    fn inverted(&self) -> bool {
        self.inner.is_inverted()
    }

    /// True if the forward transformation is available.
    #[getter]
    fn tran_forward(&self) -> bool {
        self.inner.tran_forward()
    }

    /// True if the inverse transformation is available.
    #[getter]
    fn tran_inverse(&self) -> bool {
        self.inner.tran_inverse()
    }

    /// Return a copy with the invert flag toggled.
    fn invert(&self) -> Self {
        let mut inner = self.inner.clone();
        inner.invert();
        Self { inner }
    }

    /// Transform a batch of points.
    ///
    /// Args:
    ///     points: (N, ncoord) array. NaN marks a bad coordinate.
    ///     forward: Apply the forward transformation if True. Default True.
    ///
    /// Returns:
    ///     (N, nout) array of transformed points.
    #[pyo3(signature = (points, forward = true))]
    fn transform<'py>(
        &self,
        py: Python<'py>,
        points: PyReadonlyArray2<f64>,
        forward: bool,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let pts = points_from_array(&points);
        let out = self.inner.transform(&pts, forward).map_err(value_error)?;
        Ok(points_to_array(py, &out))
    }

    /// Stored coefficients of one direction as a flat record array.
    ///
    /// Args:
    ///     forward: Forward coefficients if True, inverse otherwise. Default True.
    ///
    /// Returns:
    ///     1-D array of `[c, axis, p1, ..., pN]` records, empty if undefined.
    #[pyo3(signature = (forward = true))]
    fn coefficients<'py>(&self, py: Python<'py>, forward: bool) -> Bound<'py, PyArray1<f64>> {
        PyArray1::from_vec(py, self.inner.to_flat(direction(forward)))
    }

    /// Derive a missing direction by least-squares fitting.
    ///
    /// Samples the opposite direction on a regular grid over the box and fits
    /// polynomials of increasing order until the accuracy is met.
    ///
    /// Args:
    ///     forward: Replace the forward transformation if True, the inverse otherwise.
    ///     acc: Required accuracy in the fitted direction's output units.
    ///     lbnd: Lower bounds of the box in the fitted direction's input space.
    ///     ubnd: Upper bounds of the box.
    ///     max_order: Highest order tried (one more than the maximum power). Default 20.
    ///
    /// Returns:
    ///     A new PolyMap with the requested direction replaced.
    #[pyo3(signature = (forward, acc, lbnd, ubnd, max_order = 20))]
    fn poly_tran(&self, forward: bool, acc: f64, lbnd: Vec<f64>, ubnd: Vec<f64>, max_order: usize) -> PyResult<Self> {
        let config = PolyTranConfig {
            max_order,
            ..Default::default()
        };
        let inner = self
            .inner
            .poly_tran_with_config(forward, acc, &lbnd, &ubnd, &config)
            .map_err(value_error)?;
        Ok(Self { inner })
    }

    /// True if both maps have the same shape, invert flag and coefficients.
    fn equals(&self, other: &PyPolyMap) -> bool {
        self.inner.equals(&other.inner)
    }

    fn __eq__(&self, other: &PyPolyMap) -> bool {
        self.equals(other)
    }

    /// Serialize to keyed `key = value` text.
    fn dump_text(&self) -> String {
        self.inner.dump().to_text()
    }

    /// Rebuild a PolyMap from text produced by `dump_text`.
    #[staticmethod]
    fn load_text(text: &str) -> PyResult<Self> {
        let fields = KeyedFields::from_text(text).map_err(value_error)?;
        let inner = PolyMap::load(&fields).map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Save to a binary file.
    fn save_to_file(&self, path: &str) -> PyResult<()> {
        self.inner
            .save_to_file(path)
            .map_err(|e| pyo3::exceptions::PyIOError::new_err(e.to_string()))
    }

    /// Load from a binary file written by `save_to_file`.
    #[staticmethod]
    fn load_from_file(path: &str) -> PyResult<Self> {
        let inner =
            PolyMap::load_from_file(path).map_err(|e| pyo3::exceptions::PyIOError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "PolyMap(nin={}, nout={}, forward={}, inverse={}, inverted={})",
            self.inner.nin(),
            self.inner.nout(),
            self.inner.tran_forward(),
            self.inner.tran_inverse(),
            self.inner.is_inverted()
        )
    }
}
