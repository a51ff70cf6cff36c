use crate::config::{GridConfig, GridConfigError};

/// Axis-aligned rectangle of one cell, closed on all sides.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBox {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl CellBox {
    /// `(x_min, y_min, x_max, y_max)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.min[0], self.min[1], self.max[0], self.max[1])
    }

    pub fn center(&self) -> [f64; 2] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
        ]
    }

    pub fn contains(&self, point: [f64; 2]) -> bool {
        (self.min[0]..=self.max[0]).contains(&point[0])
            && (self.min[1]..=self.max[1]).contains(&point[1])
    }

    /// Euclidean distance from `point` to the nearest point of the box; zero inside.
    pub fn distance_to(&self, point: [f64; 2]) -> f64 {
        let dx = (self.min[0] - point[0]).max(point[0] - self.max[0]).max(0.0);
        let dy = (self.min[1] - point[1]).max(point[1] - self.max[1]).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

/// One element of the grid partition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub index: (usize, usize),
    pub bbox: CellBox,
}

impl Cell {
    pub fn bbox(&self) -> &CellBox {
        &self.bbox
    }
}

/// Derived geometry of a validated [`GridConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    dimensions: [f64; 2],
    n_cells: [usize; 2],
    cell_dimensions: [f64; 2],
}

impl GridGeometry {
    pub fn new(config: &GridConfig) -> Result<Self, GridConfigError> {
        config.validate()?;
        let cell_dimensions = [
            config.dimensions[0] / config.n_cells[0] as f64,
            config.dimensions[1] / config.n_cells[1] as f64,
        ];
        Ok(Self {
            dimensions: config.dimensions,
            n_cells: config.n_cells,
            cell_dimensions,
        })
    }

    pub fn dimensions(&self) -> [f64; 2] {
        self.dimensions
    }

    pub fn area(&self) -> f64 {
        self.dimensions[0] * self.dimensions[1]
    }

    pub fn n_cells(&self) -> [usize; 2] {
        self.n_cells
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_cells[0], self.n_cells[1])
    }

    pub fn rows(&self) -> usize {
        self.n_cells[0]
    }

    pub fn columns(&self) -> usize {
        self.n_cells[1]
    }

    pub fn cell_count(&self) -> usize {
        self.n_cells[0] * self.n_cells[1]
    }

    pub fn cell_dimensions(&self) -> [f64; 2] {
        self.cell_dimensions
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_dimensions[0] * self.cell_dimensions[1]
    }

    pub fn contains_index(&self, i: usize, j: usize) -> bool {
        i < self.n_cells[0] && j < self.n_cells[1]
    }

    /// Row-major offset of `(i, j)`. Caller guarantees the index is in range.
    #[inline]
    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(self.contains_index(i, j));
        i * self.n_cells[1] + j
    }

    /// Whether `point` lies in the half-open area `[0, W) × [0, H)`.
    pub fn covers(&self, point: [f64; 2]) -> bool {
        (0.0..self.dimensions[0]).contains(&point[0])
            && (0.0..self.dimensions[1]).contains(&point[1])
    }

    pub fn cell_box(&self, i: usize, j: usize) -> Option<CellBox> {
        if !self.contains_index(i, j) {
            return None;
        }
        let [cw, ch] = self.cell_dimensions;
        let x = i as f64 * cw;
        let y = j as f64 * ch;
        Some(CellBox {
            min: [x, y],
            max: [x + cw, y + ch],
        })
    }

    /// All cells in row-major order.
    pub(crate) fn build_cells(&self) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(self.cell_count());
        for i in 0..self.rows() {
            for j in 0..self.columns() {
                if let Some(bbox) = self.cell_box(i, j) {
                    cells.push(Cell { index: (i, j), bbox });
                }
            }
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(dimensions: [f64; 2], n_cells: [usize; 2]) -> GridGeometry {
        GridGeometry::new(&GridConfig::new(dimensions, n_cells)).unwrap()
    }

    #[test]
    fn derived_quantities_match_configuration() {
        let g = geometry([250.0, 250.0], [128, 128]);
        assert_eq!(g.dimensions(), [250.0, 250.0]);
        assert_eq!(g.area(), 62500.0);
        assert_eq!(g.shape(), (128, 128));
        assert_eq!(g.rows(), 128);
        assert_eq!(g.columns(), 128);
        assert_eq!(g.cell_dimensions(), [1.953125, 1.953125]);
        assert_eq!(g.cell_area(), 3.814697265625);
    }

    #[test]
    fn non_square_cells_use_rows_for_width() {
        let g = geometry([12.0, 6.0], [4, 2]);
        assert_eq!(g.cell_dimensions(), [3.0, 3.0]);
        let g = geometry([12.0, 6.0], [2, 4]);
        assert_eq!(g.cell_dimensions(), [6.0, 1.5]);
        assert_eq!(g.cell_box(1, 3).unwrap().bounds(), (6.0, 4.5, 12.0, 6.0));
    }

    #[test]
    fn cell_box_out_of_range_is_none() {
        let g = geometry([4.0, 4.0], [4, 4]);
        assert!(g.cell_box(4, 0).is_none());
        assert!(g.cell_box(0, 4).is_none());
        assert!(g.cell_box(3, 3).is_some());
    }

    #[test]
    fn build_cells_is_row_major() {
        let g = geometry([4.0, 6.0], [2, 3]);
        let cells = g.build_cells();
        let indices: Vec<_> = cells.iter().map(|c| c.index).collect();
        assert_eq!(
            indices,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
        for (offset, cell) in cells.iter().enumerate() {
            assert_eq!(g.flat_index(cell.index.0, cell.index.1), offset);
        }
    }

    #[test]
    fn box_distance_and_containment() {
        let b = CellBox {
            min: [1.0, 1.0],
            max: [2.0, 2.0],
        };
        assert_eq!(b.center(), [1.5, 1.5]);
        assert!(b.contains([1.0, 2.0]));
        assert!(!b.contains([2.5, 1.5]));
        assert_eq!(b.distance_to([1.5, 1.5]), 0.0);
        assert_eq!(b.distance_to([5.0, 1.5]), 3.0);
        assert_eq!(b.distance_to([5.0, 6.0]), 5.0);
    }

    #[test]
    fn covers_is_half_open() {
        let g = geometry([4.0, 4.0], [4, 4]);
        assert!(g.covers([0.0, 0.0]));
        assert!(!g.covers([4.0, 1.0]));
        assert!(!g.covers([-0.1, 1.0]));
    }
}
