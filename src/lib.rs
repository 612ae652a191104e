use thiserror::Error;

/// INI configuration loading and validation
pub mod config;

/// Detections produced by the external detector and their sanitation
pub mod detection;

/// Deterministic generators for tests and benchmarks
pub mod examples;

/// Single object motion models (Kalman, GH, Particle)
pub mod filters;

/// Persistence contract and reference stores
pub mod persistence;

/// Ordered event pipeline connecting the tracker with zones and sinks
pub mod pipeline;

/// Commonly used types
pub mod prelude;

/// Track snapshots
pub mod track;

/// Multi-object tracker
pub mod trackers;

/// Utility types: boxes, Kalman math, error statistics
pub mod utils;

/// Spatial grid and regions of interest
pub mod zones;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Errors {
    #[error("Grid is already divided.")]
    GridAlreadyDivided,
    #[error("Grid is not divided yet.")]
    GridNotDivided,
    #[error("Frame dimensions {0}x{1} are invalid.")]
    InvalidFrameDimensions(u32, u32),
    #[error("Cell size must be a positive integer.")]
    InvalidCellSize,
    #[error("Cell {0} does not exist in the grid.")]
    MissingCell(u32),
    #[error("Bounding box is malformed: {0}")]
    MalformedBox(String),
    #[error("Filter state diverged (NaN estimate).")]
    FilterDiverged,
    #[error("Innovation covariance is not positive definite.")]
    SingularCovariance,
    #[error("Pipeline is already stopped.")]
    PipelineStopped,
    #[error("Pipeline worker `{0}` panicked.")]
    WorkerPanicked(&'static str),
}

pub(crate) const EPS: f32 = 0.00001;

/// Allows comparing values with a tolerance
pub trait EstimateClose {
    fn almost_same(&self, other: &Self, eps: f32) -> bool;
}

impl EstimateClose for f32 {
    fn almost_same(&self, other: &Self, eps: f32) -> bool {
        (self - other).abs() < eps
    }
}
