use std::ops::Index;

/// Dense `rows × cols` matrix of per-cell values, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct GridMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl GridMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Panics if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "matrix data length mismatch");
        Self { rows, cols, data }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        (i < self.rows && j < self.cols).then(|| self.data[i * self.cols + j])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }

    /// Apply `f` to every element.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.cols.max(1)).map(<[f64]>::to_vec).collect()
    }

    /// `((i, j), value)` in row-major order.
    pub fn iter_indexed(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        let cols = self.cols;
        self.data
            .iter()
            .enumerate()
            .map(move |(flat, &v)| ((flat / cols, flat % cols), v))
    }

    /// Indices whose value satisfies `predicate`, ascending `i` then `j`.
    pub fn indices_where<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        self.iter_indexed()
            .filter(|&(_, v)| predicate(v))
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl Index<(usize, usize)> for GridMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        assert!(
            i < self.rows && j < self.cols,
            "index ({i}, {j}) out of range for shape ({}, {})",
            self.rows,
            self.cols
        );
        &self.data[i * self.cols + j]
    }
}
