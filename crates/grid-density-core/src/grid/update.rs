use super::{GridError, GridManager, GridState};
use crate::deposition;
use crate::device::Device;
use crate::execution::ExecutionContext;
use crate::spatial;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateTimings {
    pub validate_us: u64,
    pub deposit_us: u64,
    pub index_build_us: u64,
    pub total_us: u64,
}

impl<C: ExecutionContext> GridManager<C> {
    fn validate_devices(devices: &[Device]) -> Result<(), GridError> {
        match devices.iter().find(|d| !d.is_valid()) {
            Some(bad) => {
                warn!(
                    device_id = bad.id(),
                    x = bad.position()[0],
                    y = bad.position()[1],
                    accuracy = bad.accuracy(),
                    "rejecting device set with invalid device"
                );
                Err(GridError::InvalidDeviceData {
                    id: bad.id().to_string(),
                    position: bad.position(),
                    accuracy: bad.accuracy(),
                })
            }
            None => Ok(()),
        }
    }

    /// Recompute occupancy and density from `devices`.
    ///
    /// The previous state is kept on error. On success all derived state is
    /// swapped in at once.
    pub fn update(&mut self, devices: &[Device]) -> Result<UpdateTimings, GridError> {
        let total_start = Instant::now();

        let t0 = Instant::now();
        Self::validate_devices(devices)?;
        let validate_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        let mass = deposition::deposit(&self.geometry, devices, self.context.as_ref())?;
        let occupancy = mass.to_occupancy();
        let cell_area = self.geometry.cell_area();
        let density = occupancy.map(|v| v / cell_area);
        let deposit_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        let index = spatial::build_index(devices);
        let max_accuracy = devices
            .iter()
            .map(Device::accuracy)
            .fold(0.0, f64::max);
        let index_build_us = t2.elapsed().as_micros() as u64;

        if mass.outside_count() > 0 {
            debug!(
                outside = mass.outside_count(),
                "devices outside the grid area clamped to edge cells"
            );
        }

        self.state = GridState {
            devices: devices.to_vec(),
            index,
            occupancy,
            density,
            max_accuracy,
            outside_count: mass.outside_count(),
        };

        let timings = UpdateTimings {
            validate_us,
            deposit_us,
            index_build_us,
            total_us: total_start.elapsed().as_micros() as u64,
        };
        debug!(
            devices = devices.len(),
            context = self.context.name(),
            partition_size = self.context.partition_size(),
            total_us = timings.total_us,
            "grid updated"
        );
        Ok(timings)
    }
}
