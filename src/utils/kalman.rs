use nalgebra::{SMatrix, SVector};

/// Constant velocity Kalman filter for axis-aligned boxes
pub mod kalman_cv_box;

/// Kalman filter state: mean vector and covariance matrix
///
#[derive(Debug, Clone, Copy)]
pub struct KalmanState<const X: usize> {
    pub(crate) mean: SVector<f32, X>,
    pub(crate) covariance: SMatrix<f32, X, X>,
}

impl<const X: usize> KalmanState<X> {
    pub fn mean(&self) -> &SVector<f32, X> {
        &self.mean
    }

    pub fn covariance(&self) -> &SMatrix<f32, X, X> {
        &self.covariance
    }

    pub fn has_nan(&self) -> bool {
        self.mean.iter().any(|v| v.is_nan())
    }
}

/// Discrete white noise acceleration block for one axis (position, velocity)
///
pub(crate) fn white_noise_block(dt: f32, var: f32) -> [[f32; 2]; 2] {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;
    [
        [dt4 / 4.0 * var, dt3 / 2.0 * var],
        [dt3 / 2.0 * var, dt2 * var],
    ]
}
