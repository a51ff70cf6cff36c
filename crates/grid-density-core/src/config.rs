use crate::execution::ExecutionError;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Overall grid extent and resolution. Immutable once a grid is built from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Width and height of the covered area.
    pub dimensions: [f64; 2],
    /// Cell counts as `(rows, cols)`; rows split the width, cols the height.
    pub n_cells: [usize; 2],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            dimensions: [250.0, 250.0],
            n_cells: [128, 128],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridConfigError {
    NonFiniteDimension { axis: usize, value: f64 },
    NonPositiveDimension { axis: usize, value: f64 },
    ZeroCells { axis: usize },
    CellCountOverflow,
    TooManyCells { max: usize, actual: usize },
    Parse(String),
}

impl fmt::Display for GridConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridConfigError::NonFiniteDimension { axis, value } => {
                write!(f, "dimensions[{axis}] must be finite, got {value}")
            }
            GridConfigError::NonPositiveDimension { axis, value } => {
                write!(f, "dimensions[{axis}] must be positive, got {value}")
            }
            GridConfigError::ZeroCells { axis } => {
                write!(f, "n_cells[{axis}] must be positive")
            }
            GridConfigError::CellCountOverflow => write!(f, "rows * cols overflows usize"),
            GridConfigError::TooManyCells { max, actual } => {
                write!(f, "total cells ({actual}) exceeds supported maximum ({max})")
            }
            GridConfigError::Parse(msg) => write!(f, "invalid grid config: {msg}"),
        }
    }
}

impl Error for GridConfigError {}

impl GridConfig {
    pub const MAX_TOTAL_CELLS: usize = 1 << 24;

    pub fn new(dimensions: [f64; 2], n_cells: [usize; 2]) -> Self {
        Self {
            dimensions,
            n_cells,
        }
    }

    /// Parse a JSON document; missing fields fall back to the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, GridConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| GridConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GridConfigError> {
        for (axis, &value) in self.dimensions.iter().enumerate() {
            if !value.is_finite() {
                return Err(GridConfigError::NonFiniteDimension { axis, value });
            }
            if value <= 0.0 {
                return Err(GridConfigError::NonPositiveDimension { axis, value });
            }
        }
        for (axis, &count) in self.n_cells.iter().enumerate() {
            if count == 0 {
                return Err(GridConfigError::ZeroCells { axis });
            }
        }
        let total = self.n_cells[0]
            .checked_mul(self.n_cells[1])
            .ok_or(GridConfigError::CellCountOverflow)?;
        if total > Self::MAX_TOTAL_CELLS {
            return Err(GridConfigError::TooManyCells {
                max: Self::MAX_TOTAL_CELLS,
                actual: total,
            });
        }
        Ok(())
    }
}

/// How the rayon-backed context partitions and schedules deposition work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker threads for a dedicated pool; `None` uses the global pool.
    pub num_threads: Option<usize>,
    /// Devices per partition handed to one map call.
    pub partition_size: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            partition_size: 4096,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.partition_size == 0 {
            return Err(ExecutionError::InvalidConfig(
                "partition_size must be positive".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(ExecutionError::InvalidConfig(
                "num_threads must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
