use super::{GridError, GridManager};
use crate::device::Device;
use crate::execution::ExecutionContext;
use crate::spatial;

impl<C: ExecutionContext> GridManager<C> {
    /// Cells whose occupancy satisfies `predicate`, ascending `i` then `j`.
    pub fn check_occupation<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        self.state.occupancy.indices_where(predicate)
    }

    /// Cells whose density satisfies `predicate`, ascending `i` then `j`.
    pub fn check_density<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        self.state.density.indices_where(predicate)
    }

    /// Devices positioned inside the closed box of cell `(i, j)`.
    ///
    /// A device on a shared edge belongs to every cell touching that edge.
    pub fn devices_in_cell(&self, i: usize, j: usize) -> Result<Vec<&Device>, GridError> {
        let bbox = self.cell(i, j)?.bbox;
        Ok(spatial::query_box(&self.state.index, &bbox)
            .into_iter()
            .map(|slot| &self.state.devices[slot])
            .collect())
    }

    /// Devices whose uncertainty disc (radius = accuracy) reaches cell `(i, j)`.
    pub fn devices_near_cell(&self, i: usize, j: usize) -> Result<Vec<&Device>, GridError> {
        let bbox = self.cell(i, j)?.bbox;
        Ok(spatial::query_near_box(
            &self.state.index,
            &self.state.devices,
            &bbox,
            self.state.max_accuracy,
        )
        .into_iter()
        .map(|slot| &self.state.devices[slot])
        .collect())
    }

    /// Devices within `radius` of `center`.
    pub fn devices_within(&self, center: [f64; 2], radius: f64) -> Vec<&Device> {
        spatial::query_radius(&self.state.index, center, radius)
            .into_iter()
            .map(|slot| &self.state.devices[slot])
            .collect()
    }
}
