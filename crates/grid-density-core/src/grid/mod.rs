pub mod metrics;
pub mod query;
pub mod update;

pub use metrics::*;
pub use update::UpdateTimings;

use crate::config::{GridConfig, GridConfigError};
use crate::device::Device;
use crate::execution::{ExecutionContext, ExecutionError};
use crate::geometry::{Cell, GridGeometry};
use crate::matrix::GridMatrix;
use crate::spatial::{self, DeviceLocation};
use rstar::RTree;
use std::ops::Index;
use std::sync::Arc;
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    InvalidConfiguration(GridConfigError),
    IndexOutOfRange {
        index: (usize, usize),
        shape: (usize, usize),
    },
    InvalidDeviceData {
        id: String,
        position: [f64; 2],
        accuracy: f64,
    },
    ComputationFailed(ExecutionError),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::InvalidConfiguration(e) => write!(f, "{e}"),
            GridError::IndexOutOfRange { index, shape } => write!(
                f,
                "cell index ({}, {}) out of range for grid shape ({}, {})",
                index.0, index.1, shape.0, shape.1
            ),
            GridError::InvalidDeviceData {
                id,
                position,
                accuracy,
            } => write!(
                f,
                "device {id} has invalid data: position ({}, {}) must be finite, \
                 accuracy {accuracy} must be finite and non-negative",
                position[0], position[1]
            ),
            GridError::ComputationFailed(e) => write!(f, "deposition failed: {e}"),
        }
    }
}

impl From<GridConfigError> for GridError {
    fn from(err: GridConfigError) -> Self {
        GridError::InvalidConfiguration(err)
    }
}

impl From<ExecutionError> for GridError {
    fn from(err: ExecutionError) -> Self {
        GridError::ComputationFailed(err)
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GridError::InvalidConfiguration(e) => Some(e),
            GridError::ComputationFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything derived from one device set. Replaced as a whole on `update`.
pub(crate) struct GridState {
    pub(crate) devices: Vec<Device>,
    pub(crate) index: RTree<DeviceLocation>,
    pub(crate) occupancy: GridMatrix,
    pub(crate) density: GridMatrix,
    pub(crate) max_accuracy: f64,
    pub(crate) outside_count: u64,
}

impl GridState {
    pub(crate) fn empty(geometry: &GridGeometry) -> Self {
        let (rows, cols) = geometry.shape();
        Self {
            devices: Vec::new(),
            index: spatial::build_index(&[]),
            occupancy: GridMatrix::zeros(rows, cols),
            density: GridMatrix::zeros(rows, cols),
            max_accuracy: 0.0,
            outside_count: 0,
        }
    }
}

/// Regular grid over `[0, W) × [0, H)` holding occupancy and density of the
/// last device set passed to [`GridManager::update`].
pub struct GridManager<C> {
    pub(crate) context: Arc<C>,
    pub(crate) config: GridConfig,
    pub(crate) geometry: GridGeometry,
    pub(crate) cells: Vec<Cell>,
    pub(crate) state: GridState,
}

impl<C: ExecutionContext> GridManager<C> {
    pub fn new(context: Arc<C>, config: GridConfig) -> Self {
        Self::try_new(context, config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(context: Arc<C>, config: GridConfig) -> Result<Self, GridError> {
        let geometry = GridGeometry::new(&config)?;
        let cells = geometry.build_cells();
        let state = GridState::empty(&geometry);
        Ok(Self {
            context,
            config,
            geometry,
            cells,
            state,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn dimensions(&self) -> [f64; 2] {
        self.geometry.dimensions()
    }

    pub fn area(&self) -> f64 {
        self.geometry.area()
    }

    pub fn n_cells(&self) -> [usize; 2] {
        self.geometry.n_cells()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.geometry.shape()
    }

    pub fn rows(&self) -> usize {
        self.geometry.rows()
    }

    pub fn columns(&self) -> usize {
        self.geometry.columns()
    }

    pub fn cell_dimensions(&self) -> [f64; 2] {
        self.geometry.cell_dimensions()
    }

    pub fn cell_area(&self) -> f64 {
        self.geometry.cell_area()
    }

    pub fn occupation_matrix(&self) -> &GridMatrix {
        &self.state.occupancy
    }

    pub fn density_matrix(&self) -> &GridMatrix {
        &self.state.density
    }

    /// Devices per unit area over the whole grid, independent of resolution.
    pub fn avg_density(&self) -> f64 {
        self.state.devices.len() as f64 / self.geometry.area()
    }

    pub fn device_count(&self) -> usize {
        self.state.devices.len()
    }

    /// The device set of the last successful `update`, unchanged.
    pub fn devices(&self) -> &[Device] {
        &self.state.devices
    }

    /// Devices of the last update positioned outside `[0, W) × [0, H)`.
    pub fn outside_count(&self) -> u64 {
        self.state.outside_count
    }

    pub fn cell(&self, i: usize, j: usize) -> Result<&Cell, GridError> {
        if !self.geometry.contains_index(i, j) {
            return Err(GridError::IndexOutOfRange {
                index: (i, j),
                shape: self.geometry.shape(),
            });
        }
        Ok(&self.cells[self.geometry.flat_index(i, j)])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

impl<C: ExecutionContext> Index<(usize, usize)> for GridManager<C> {
    type Output = Cell;

    fn index(&self, (i, j): (usize, usize)) -> &Cell {
        self.cell(i, j).unwrap_or_else(|e| panic!("{e}"))
    }
}
