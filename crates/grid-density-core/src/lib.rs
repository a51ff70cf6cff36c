pub mod config;
pub mod deposition;
pub mod device;
pub mod execution;
pub mod generator;
pub mod geometry;
pub mod grid;
pub mod matrix;
pub mod spatial;

pub use config::{ExecutionConfig, GridConfig, GridConfigError};
pub use device::Device;
pub use execution::{ExecutionContext, ExecutionError, RayonContext, SerialContext};
pub use generator::{DeviceGenerator, GeneratorError, UniformPositions};
pub use geometry::{Cell, CellBox, GridGeometry};
pub use grid::{GridError, GridManager, GridSummary, UpdateTimings};
pub use matrix::GridMatrix;
