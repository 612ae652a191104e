/// Bounding boxes
pub mod bbox;

/// Kalman filter
pub mod kalman;

/// Estimation error statistics
pub mod stats;
