//! Cloud-in-cell mass deposition.
//!
//! Each device spreads one unit of mass bilinearly over the four cell centres
//! surrounding it. Lattice indices outside the grid are clamped to the nearest
//! edge cell, so mass beyond a wall piles up in the edge cell instead of being
//! dropped.
//!
//! Weights are fixed point: each axis fraction is quantized to `2^48` units,
//! so a device carries exactly `2^96` units and per-cell sums are `u128`
//! (room for `2^32` devices). Integer sums do not depend on partitioning or
//! order, which makes the reduction exact and bit-for-bit reproducible.
//!
//! Partial results start sparse and only switch to a dense cell vector once
//! they touch a sizeable share of the grid, so the cost of a deposit stays
//! proportional to devices plus cells whatever the partition size.

use crate::device::Device;
use crate::execution::{ExecutionContext, ExecutionError};
use crate::geometry::GridGeometry;
use crate::matrix::GridMatrix;

const AXIS_ONE: u64 = 1 << 48;
/// Mass units deposited by a single device.
pub const DEVICE_MASS: u128 = 1 << 96;
const DEVICE_MASS_F64: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// One corner of a device's deposition stencil, after clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilPoint {
    pub index: (usize, usize),
    /// Fixed-point mass; the four corners of a stencil sum to [`DEVICE_MASS`].
    pub mass: u128,
}

impl StencilPoint {
    pub fn weight(&self) -> f64 {
        self.mass as f64 / DEVICE_MASS_F64
    }
}

/// Split one coordinate between the two neighbouring cell centres along an axis.
fn axis_split(coord: f64, cell_size: f64, n_cells: usize) -> [(usize, u64); 2] {
    let u = coord / cell_size - 0.5;
    let base = u.floor();
    // NaN only for infinite `u`; that case puts everything on `base`.
    let frac = u - base;
    let upper = ((frac * AXIS_ONE as f64).round() as u64).min(AXIS_ONE);
    let lower = AXIS_ONE - upper;

    let last = (n_cells - 1) as i64;
    let i0 = base as i64;
    [
        (i0.clamp(0, last) as usize, lower),
        (i0.saturating_add(1).clamp(0, last) as usize, upper),
    ]
}

/// The four clamped lattice points and weights for a finite `position`.
///
/// Order: `(i0, j0)`, `(i0+1, j0)`, `(i0, j0+1)`, `(i0+1, j0+1)`.
pub fn cic_stencil(geometry: &GridGeometry, position: [f64; 2]) -> [StencilPoint; 4] {
    let [cw, ch] = geometry.cell_dimensions();
    let [(i0, wi0), (i1, wi1)] = axis_split(position[0], cw, geometry.rows());
    let [(j0, wj0), (j1, wj1)] = axis_split(position[1], ch, geometry.columns());
    let point = |i, wi: u64, j, wj: u64| StencilPoint {
        index: (i, j),
        mass: wi as u128 * wj as u128,
    };
    [
        point(i0, wi0, j0, wj0),
        point(i1, wi1, j0, wj0),
        point(i0, wi0, j1, wj1),
        point(i1, wi1, j1, wj1),
    ]
}

/// Cell storage of a [`MassGrid`].
#[derive(Clone, Debug)]
enum Cells {
    /// Unordered `(flat index, mass)` contributions; repeats allowed.
    Sparse(Vec<(usize, u128)>),
    Dense(Vec<u128>),
}

/// Accumulated fixed-point mass per cell, plus device bookkeeping.
#[derive(Clone, Debug)]
pub struct MassGrid {
    rows: usize,
    cols: usize,
    cells: Cells,
    devices: u64,
    outside: u64,
}

impl MassGrid {
    /// Dense grid with every cell at zero.
    pub fn zeros(geometry: &GridGeometry) -> Self {
        Self {
            rows: geometry.rows(),
            cols: geometry.columns(),
            cells: Cells::Dense(vec![0; geometry.cell_count()]),
            devices: 0,
            outside: 0,
        }
    }

    /// Empty grid that stores contributions sparsely until it gets crowded.
    pub fn empty(geometry: &GridGeometry) -> Self {
        Self {
            rows: geometry.rows(),
            cols: geometry.columns(),
            cells: Cells::Sparse(Vec::new()),
            devices: 0,
            outside: 0,
        }
    }

    pub fn add_device(&mut self, geometry: &GridGeometry, position: [f64; 2]) {
        for point in cic_stencil(geometry, position) {
            if point.mass == 0 {
                continue;
            }
            let flat = point.index.0 * self.cols + point.index.1;
            match &mut self.cells {
                Cells::Dense(cells) => cells[flat] += point.mass,
                Cells::Sparse(entries) => entries.push((flat, point.mass)),
            }
        }
        self.devices += 1;
        if !geometry.covers(position) {
            self.outside += 1;
        }
        self.densify_if_crowded();
    }

    /// Elementwise sum. Both grids must come from the same geometry.
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        self.cells = match (self.cells, other.cells) {
            (Cells::Dense(mut acc), Cells::Dense(cells)) => {
                for (a, m) in acc.iter_mut().zip(cells) {
                    *a += m;
                }
                Cells::Dense(acc)
            }
            (Cells::Dense(mut acc), Cells::Sparse(entries))
            | (Cells::Sparse(entries), Cells::Dense(mut acc)) => {
                for (flat, m) in entries {
                    acc[flat] += m;
                }
                Cells::Dense(acc)
            }
            (Cells::Sparse(mut acc), Cells::Sparse(mut entries)) => {
                acc.append(&mut entries);
                Cells::Sparse(acc)
            }
        };
        self.devices += other.devices;
        self.outside += other.outside;
        self.densify_if_crowded();
        self
    }

    /// Switch to dense storage past `cells / 4` sparse entries.
    fn densify_if_crowded(&mut self) {
        let cell_count = self.rows * self.cols;
        if let Cells::Sparse(entries) = &self.cells {
            if entries.len() > cell_count / 4 {
                let mut dense = vec![0u128; cell_count];
                for &(flat, m) in entries {
                    dense[flat] += m;
                }
                self.cells = Cells::Dense(dense);
            }
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.cells, Cells::Dense(_))
    }

    pub fn device_count(&self) -> u64 {
        self.devices
    }

    /// Devices deposited from outside `[0, W) × [0, H)`.
    pub fn outside_count(&self) -> u64 {
        self.outside
    }

    pub fn total_mass_units(&self) -> u128 {
        match &self.cells {
            Cells::Dense(cells) => cells.iter().sum(),
            Cells::Sparse(entries) => entries.iter().map(|&(_, m)| m).sum(),
        }
    }

    pub fn total_mass(&self) -> f64 {
        self.total_mass_units() as f64 / DEVICE_MASS_F64
    }

    /// Cells holding mass, ascending `i` then `j`.
    pub fn nonzero_cells(&self) -> Vec<((usize, usize), u128)> {
        let flat: Vec<(usize, u128)> = match &self.cells {
            Cells::Dense(cells) => cells
                .iter()
                .enumerate()
                .filter(|&(_, &m)| m > 0)
                .map(|(flat, &m)| (flat, m))
                .collect(),
            Cells::Sparse(entries) => {
                let mut sorted = entries.clone();
                sorted.sort_unstable_by_key(|&(flat, _)| flat);
                let mut merged: Vec<(usize, u128)> = Vec::with_capacity(sorted.len());
                for (flat, m) in sorted {
                    match merged.last_mut() {
                        Some((last, acc)) if *last == flat => *acc += m,
                        _ => merged.push((flat, m)),
                    }
                }
                merged
            }
        };
        flat.into_iter()
            .map(|(flat, m)| ((flat / self.cols, flat % self.cols), m))
            .collect()
    }

    pub fn to_occupancy(&self) -> GridMatrix {
        let data = match &self.cells {
            Cells::Dense(cells) => cells.iter().map(|&m| m as f64 / DEVICE_MASS_F64).collect(),
            Cells::Sparse(_) => {
                let mut data = vec![0.0; self.rows * self.cols];
                for ((i, j), m) in self.nonzero_cells() {
                    data[i * self.cols + j] = m as f64 / DEVICE_MASS_F64;
                }
                data
            }
        };
        GridMatrix::from_vec(self.rows, self.cols, data)
    }
}

/// Equal when every cell holds the same mass, whatever the storage.
impl PartialEq for MassGrid {
    fn eq(&self, other: &Self) -> bool {
        (self.rows, self.cols, self.devices, self.outside)
            == (other.rows, other.cols, other.devices, other.outside)
            && self.nonzero_cells() == other.nonzero_cells()
    }
}

impl Eq for MassGrid {}

/// Deposit every device through `ctx`. Positions must already be finite.
pub fn deposit<C: ExecutionContext>(
    geometry: &GridGeometry,
    devices: &[Device],
    ctx: &C,
) -> Result<MassGrid, ExecutionError> {
    ctx.map_reduce(
        devices,
        || MassGrid::empty(geometry),
        |partition| {
            let mut partial = MassGrid::empty(geometry);
            for device in partition {
                partial.add_device(geometry, device.position());
            }
            partial
        },
        MassGrid::merge,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::execution::{RayonContext, SerialContext};

    fn geometry(dimensions: [f64; 2], n_cells: [usize; 2]) -> GridGeometry {
        GridGeometry::new(&GridConfig::new(dimensions, n_cells)).unwrap()
    }

    fn weights(stencil: &[StencilPoint; 4]) -> Vec<((usize, usize), f64)> {
        stencil.iter().map(|p| (p.index, p.weight())).collect()
    }

    #[test]
    fn stencil_mass_always_sums_to_one_device() {
        let g = geometry([10.0, 7.0], [5, 3]);
        for &pos in &[
            [0.1, 0.2],
            [3.3, 6.9],
            [9.99, 0.0],
            [-4.0, 2.5],
            [12.0, -1.0],
            [1e12, -1e12],
        ] {
            let total: u128 = cic_stencil(&g, pos).iter().map(|p| p.mass).sum();
            assert_eq!(total, DEVICE_MASS, "position {pos:?}");
        }
    }

    #[test]
    fn device_at_cell_center_fills_one_cell() {
        let g = geometry([8.0, 8.0], [8, 8]);
        let stencil = cic_stencil(&g, [1.5, 1.5]);
        let filled: Vec<_> = stencil.iter().filter(|p| p.mass > 0).collect();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].index, (1, 1));
        assert_eq!(filled[0].weight(), 1.0);
    }

    #[test]
    fn device_on_shared_corner_splits_quarters() {
        let g = geometry([8.0, 8.0], [8, 8]);
        let stencil = cic_stencil(&g, [2.0, 2.0]);
        assert_eq!(
            weights(&stencil),
            vec![
                ((1, 1), 0.25),
                ((2, 1), 0.25),
                ((1, 2), 0.25),
                ((2, 2), 0.25)
            ]
        );
    }

    #[test]
    fn bilinear_weights_follow_fractional_offsets() {
        let g = geometry([4.0, 4.0], [4, 4]);
        // u = 0.75, v = 1.25 -> fu = 0.75, fv = 0.25
        let stencil = cic_stencil(&g, [1.25, 1.75]);
        assert_eq!(
            weights(&stencil),
            vec![
                ((0, 1), 0.25 * 0.75),
                ((1, 1), 0.75 * 0.75),
                ((0, 2), 0.25 * 0.25),
                ((1, 2), 0.75 * 0.25)
            ]
        );
    }

    #[test]
    fn wall_and_far_outside_devices_land_in_edge_cells() {
        let g = geometry([4.0, 4.0], [4, 4]);
        let mut grid = MassGrid::zeros(&g);
        grid.add_device(&g, [0.0, 0.0]);
        let occ = grid.to_occupancy();
        assert_eq!(occ[(0, 0)], 1.0);

        let mut grid = MassGrid::zeros(&g);
        grid.add_device(&g, [-2.0, -2.0]);
        grid.add_device(&g, [100.0, 1.5]);
        let occ = grid.to_occupancy();
        assert_eq!(occ[(0, 0)], 1.0);
        assert_eq!(occ[(3, 1)], 1.0);
        assert_eq!(occ.sum(), 2.0);
        assert_eq!(grid.outside_count(), 2);
    }

    #[test]
    fn extreme_finite_coordinates_do_not_overflow() {
        let g = geometry([4.0, 4.0], [4, 4]);
        let mut grid = MassGrid::zeros(&g);
        grid.add_device(&g, [f64::MAX, f64::MIN]);
        grid.add_device(&g, [-1e308, 1e308]);
        let occ = grid.to_occupancy();
        assert_eq!(occ[(3, 0)], 1.0);
        assert_eq!(occ[(0, 3)], 1.0);
        assert_eq!(grid.total_mass_units(), 2 * DEVICE_MASS);
    }

    #[test]
    fn single_cell_grid_keeps_everything() {
        let g = geometry([3.0, 3.0], [1, 1]);
        let mut grid = MassGrid::zeros(&g);
        for pos in [[0.0, 0.0], [1.7, 2.9], [-5.0, 8.0]] {
            grid.add_device(&g, pos);
        }
        assert_eq!(grid.to_occupancy().as_slice(), &[3.0]);
    }

    #[test]
    fn deposit_is_identical_across_contexts_and_order() {
        let g = geometry([13.0, 9.0], [7, 5]);
        let mut devices: Vec<Device> = (0..500)
            .map(|k| {
                let x = (k as f64 * 0.731).rem_euclid(15.0) - 1.0;
                let y = (k as f64 * 1.377).rem_euclid(11.0) - 1.0;
                Device::new(k.to_string(), [x, y], 1.0)
            })
            .collect();

        let reference = deposit(&g, &devices, &SerialContext::new(devices.len())).unwrap();
        assert_eq!(reference.device_count(), 500);
        assert_eq!(reference.total_mass_units(), 500 * DEVICE_MASS);
        assert_eq!(reference.total_mass(), 500.0);

        for partition_size in [1, 3, 64] {
            let serial = deposit(&g, &devices, &SerialContext::new(partition_size)).unwrap();
            assert_eq!(serial, reference);
            let rayon = RayonContext::global().with_partition_size(partition_size);
            assert_eq!(deposit(&g, &devices, &rayon).unwrap(), reference);
        }

        devices.reverse();
        let reversed = deposit(&g, &devices, &SerialContext::new(17)).unwrap();
        assert_eq!(reversed.to_occupancy(), reference.to_occupancy());
    }

    #[test]
    fn empty_device_set_gives_zero_grid() {
        let g = geometry([4.0, 4.0], [2, 2]);
        let grid = deposit(&g, &[], &RayonContext::global()).unwrap();
        assert_eq!(grid.device_count(), 0);
        assert_eq!(grid.to_occupancy(), GridMatrix::zeros(2, 2));
    }

    #[test]
    fn weights_match_bilinear_formula_at_non_dyadic_fractions() {
        let g = geometry([4.0, 4.0], [4, 4]);
        let (x, y) = (11.0 / 6.0, 1.6);
        let fu = (x - 0.5) - (x - 0.5f64).floor();
        let fv = (y - 0.5) - (y - 0.5f64).floor();
        let expected = [
            ((1, 1), (1.0 - fu) * (1.0 - fv)),
            ((2, 1), fu * (1.0 - fv)),
            ((1, 2), (1.0 - fu) * fv),
            ((2, 2), fu * fv),
        ];
        for (point, (index, want)) in cic_stencil(&g, [x, y]).iter().zip(expected) {
            assert_eq!(point.index, index);
            assert!(
                (point.weight() - want).abs() <= 1e-14,
                "{index:?}: {} vs {want}",
                point.weight()
            );
        }
    }

    #[test]
    fn crowded_partials_switch_to_dense_storage() {
        let g = geometry([4.0, 4.0], [4, 4]);
        let mut sparse = MassGrid::empty(&g);
        sparse.add_device(&g, [1.5, 1.5]);
        assert!(!sparse.is_dense());
        sparse.add_device(&g, [2.0, 2.0]);
        assert!(sparse.is_dense());

        let mut dense = MassGrid::zeros(&g);
        dense.add_device(&g, [1.5, 1.5]);
        dense.add_device(&g, [2.0, 2.0]);
        assert_eq!(sparse, dense);
        assert_eq!(sparse.to_occupancy(), dense.to_occupancy());
    }

    #[test]
    fn tiny_partitions_on_a_large_grid_stay_sparse() {
        let g = geometry([2048.0, 2048.0], [2048, 2048]);
        let devices: Vec<Device> = (0..200)
            .map(|k| {
                let x = (k as f64 * 37.3).rem_euclid(2048.0);
                let y = (k as f64 * 91.7).rem_euclid(2048.0);
                Device::new(k.to_string(), [x, y], 1.0)
            })
            .collect();

        let serial = deposit(&g, &devices, &SerialContext::new(1)).unwrap();
        let rayon = RayonContext::global().with_partition_size(1);
        let parallel = deposit(&g, &devices, &rayon).unwrap();
        assert!(!serial.is_dense());
        assert!(!parallel.is_dense());
        assert_eq!(serial.total_mass_units(), 200 * DEVICE_MASS);
        assert_eq!(serial, parallel);
        assert_eq!(deposit(&g, &devices, &SerialContext::new(4096)).unwrap(), serial);
    }
}
