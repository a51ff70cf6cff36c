use std::sync::Arc;

use grid_density_core::{
    Cell, CellBox, Device, ExecutionConfig, GridConfig, GridError, GridManager, GridMatrix,
    RayonContext,
};
use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

/// PyO3 module exposing grid-density-core to Python.
#[pyfunction]
fn version() -> &'static str {
    "0.1.0"
}

fn to_py_err(err: GridError) -> PyErr {
    match err {
        GridError::InvalidConfiguration(_) | GridError::InvalidDeviceData { .. } => {
            PyValueError::new_err(err.to_string())
        }
        GridError::IndexOutOfRange { .. } => PyIndexError::new_err(err.to_string()),
        GridError::ComputationFailed(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Cells whose value makes `predicate` truthy, ascending `i` then `j`.
fn select_cells(
    matrix: &GridMatrix,
    predicate: &Bound<'_, PyAny>,
) -> PyResult<Vec<(usize, usize)>> {
    let mut selected = Vec::new();
    for (index, value) in matrix.iter_indexed() {
        if predicate.call1((value,))?.is_truthy()? {
            selected.push(index);
        }
    }
    Ok(selected)
}

/// Closed rectangle of one cell.
#[pyclass(name = "CellBox", frozen)]
#[derive(Clone)]
struct PyCellBox {
    inner: CellBox,
}

#[pymethods]
impl PyCellBox {
    /// `(x_min, y_min, x_max, y_max)`.
    #[getter]
    fn bounds(&self) -> (f64, f64, f64, f64) {
        self.inner.bounds()
    }

    #[getter]
    fn min(&self) -> (f64, f64) {
        (self.inner.min[0], self.inner.min[1])
    }

    #[getter]
    fn max(&self) -> (f64, f64) {
        (self.inner.max[0], self.inner.max[1])
    }

    #[getter]
    fn center(&self) -> (f64, f64) {
        let [x, y] = self.inner.center();
        (x, y)
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        self.inner.contains([x, y])
    }

    fn __repr__(&self) -> String {
        let (x0, y0, x1, y1) = self.inner.bounds();
        format!("CellBox({x0}, {y0}, {x1}, {y1})")
    }
}

#[pyclass(name = "Cell", frozen)]
struct PyCell {
    inner: Cell,
}

#[pymethods]
impl PyCell {
    #[getter]
    fn index(&self) -> (usize, usize) {
        self.inner.index
    }

    #[getter]
    #[pyo3(name = "box")]
    fn bbox(&self) -> PyCellBox {
        PyCellBox {
            inner: *self.inner.bbox(),
        }
    }

    fn __repr__(&self) -> String {
        let (i, j) = self.inner.index;
        let (x0, y0, x1, y1) = self.inner.bbox().bounds();
        format!("Cell(({i}, {j}), box=({x0}, {y0}, {x1}, {y1}))")
    }
}

#[pyclass(name = "GridManager")]
struct PyGridManager {
    inner: GridManager<RayonContext>,
}

#[pymethods]
impl PyGridManager {
    #[new]
    #[pyo3(signature = (dimensions, n_cells, num_threads = None))]
    fn new(
        dimensions: (f64, f64),
        n_cells: (usize, usize),
        num_threads: Option<usize>,
    ) -> PyResult<Self> {
        let context = match num_threads {
            None => RayonContext::global(),
            Some(n) => {
                let config = ExecutionConfig {
                    num_threads: Some(n),
                    ..ExecutionConfig::default()
                };
                RayonContext::from_config(&config)
                    .map_err(|e| PyValueError::new_err(e.to_string()))?
            }
        };
        let config = GridConfig::new([dimensions.0, dimensions.1], [n_cells.0, n_cells.1]);
        let inner = GridManager::try_new(Arc::new(context), config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Replace the device set. Takes `(id, (x, y), accuracy)` tuples.
    fn update(&mut self, devices: Vec<(String, (f64, f64), f64)>) -> PyResult<()> {
        let devices: Vec<Device> = devices
            .into_iter()
            .map(|(id, (x, y), accuracy)| Device::new(id, [x, y], accuracy))
            .collect();
        self.inner.update(&devices).map_err(to_py_err)?;
        Ok(())
    }

    #[getter]
    fn dimensions(&self) -> (f64, f64) {
        let [w, h] = self.inner.dimensions();
        (w, h)
    }

    #[getter]
    fn n_cells(&self) -> (usize, usize) {
        self.inner.shape()
    }

    #[getter]
    fn area(&self) -> f64 {
        self.inner.area()
    }

    #[getter]
    fn cell_dimensions(&self) -> (f64, f64) {
        let [cw, ch] = self.inner.cell_dimensions();
        (cw, ch)
    }

    #[getter]
    fn cell_area(&self) -> f64 {
        self.inner.cell_area()
    }

    #[getter]
    fn avg_density(&self) -> f64 {
        self.inner.avg_density()
    }

    #[getter]
    fn device_count(&self) -> usize {
        self.inner.device_count()
    }

    fn occupation_matrix(&self) -> Vec<Vec<f64>> {
        self.inner.occupation_matrix().to_rows()
    }

    fn density_matrix(&self) -> Vec<Vec<f64>> {
        self.inner.density_matrix().to_rows()
    }

    fn check_occupation(&self, predicate: &Bound<'_, PyAny>) -> PyResult<Vec<(usize, usize)>> {
        select_cells(self.inner.occupation_matrix(), predicate)
    }

    fn check_density(&self, predicate: &Bound<'_, PyAny>) -> PyResult<Vec<(usize, usize)>> {
        select_cells(self.inner.density_matrix(), predicate)
    }

    /// `grid[i, j]`.
    fn __getitem__(&self, index: (usize, usize)) -> PyResult<PyCell> {
        let cell = self.inner.cell(index.0, index.1).map_err(to_py_err)?;
        Ok(PyCell { inner: *cell })
    }

    /// `(x_min, y_min, x_max, y_max)` of cell `(i, j)`.
    fn cell_bounds(&self, i: usize, j: usize) -> PyResult<(f64, f64, f64, f64)> {
        let cell = self.inner.cell(i, j).map_err(to_py_err)?;
        Ok(cell.bbox().bounds())
    }

    fn devices_in_cell(&self, i: usize, j: usize) -> PyResult<Vec<String>> {
        let devices = self.inner.devices_in_cell(i, j).map_err(to_py_err)?;
        Ok(devices.into_iter().map(|d| d.id().to_string()).collect())
    }

    fn summary_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.summary())
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_class::<PyGridManager>()?;
    m.add_class::<PyCell>()?;
    m.add_class::<PyCellBox>()?;
    Ok(())
}
