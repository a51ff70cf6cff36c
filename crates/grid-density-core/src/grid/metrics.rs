use super::GridManager;
use crate::execution::ExecutionContext;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GridSummary {
    pub device_count: usize,
    pub outside_count: u64,
    pub total_mass: f64,
    pub occupied_cells: usize,
    pub max_occupancy: f64,
    pub max_density: f64,
    pub avg_density: f64,
    pub mean_cell_density: f64,
}

impl<C: ExecutionContext> GridManager<C> {
    pub fn summary(&self) -> GridSummary {
        let occupancy = &self.state.occupancy;
        let density = &self.state.density;
        GridSummary {
            device_count: self.device_count(),
            outside_count: self.state.outside_count,
            total_mass: occupancy.sum(),
            occupied_cells: occupancy.as_slice().iter().filter(|&&v| v > 0.0).count(),
            max_occupancy: occupancy.max(),
            max_density: density.max(),
            avg_density: self.avg_density(),
            mean_cell_density: density.mean(),
        }
    }
}
