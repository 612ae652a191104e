/// Fixed-size cell partition of the frame
pub mod grid;

/// Region of interest over grid cells and its transition state machine
pub mod roi;
