use crate::utils::bbox::BoundingBox;
use crate::utils::kalman::{white_noise_block, KalmanState};
use crate::Errors;
use anyhow::Result;
use nalgebra::{SMatrix, SVector};

/// Measured dimensions: center x, center y, width, height
pub const DIM_CV_BOX: usize = 4;
/// State dimensions: measured ones plus center velocity (vx, vy)
pub const DIM_CV_BOX_STATE: usize = DIM_CV_BOX + 2;

const VX: usize = 4;
const VY: usize = 5;

/// Noise parameters of the constant velocity model
///
#[derive(Debug, Clone, Copy)]
pub struct CvNoise {
    /// process noise of the center motion (acceleration variance)
    pub q_var_pos: f32,
    /// process noise of the box size (random walk variance)
    pub q_var_size: f32,
    /// measurement noise of the center
    pub r_var_pos: f32,
    /// measurement noise of the box size
    pub r_var_size: f32,
    /// initial state covariance
    pub p_cov_p0: f32,
}

impl Default for CvNoise {
    fn default() -> Self {
        Self {
            q_var_pos: 5000.0,
            q_var_size: 10.0,
            r_var_pos: 0.1,
            r_var_size: 1.0,
            p_cov_p0: 1000.0,
        }
    }
}

/// Linear Kalman filter with a constant velocity center and a constant size
///
#[derive(Debug, Clone)]
pub struct CvBoxKalmanFilter {
    motion_matrix: SMatrix<f32, DIM_CV_BOX_STATE, DIM_CV_BOX_STATE>,
    update_matrix: SMatrix<f32, DIM_CV_BOX, DIM_CV_BOX_STATE>,
    motion_cov: SMatrix<f32, DIM_CV_BOX_STATE, DIM_CV_BOX_STATE>,
    innovation_cov: SMatrix<f32, DIM_CV_BOX, DIM_CV_BOX>,
    p_cov_p0: f32,
}

impl Default for CvBoxKalmanFilter {
    fn default() -> Self {
        CvBoxKalmanFilter::new(1.0, CvNoise::default())
    }
}

impl CvBoxKalmanFilter {
    pub fn new(dt: f32, noise: CvNoise) -> Self {
        let mut motion_matrix: SMatrix<f32, DIM_CV_BOX_STATE, DIM_CV_BOX_STATE> =
            SMatrix::identity();
        motion_matrix[(0, VX)] = dt;
        motion_matrix[(1, VY)] = dt;

        let mut motion_cov: SMatrix<f32, DIM_CV_BOX_STATE, DIM_CV_BOX_STATE> = SMatrix::zeros();
        let block = white_noise_block(dt, noise.q_var_pos);
        for (pos, vel) in [(0, VX), (1, VY)] {
            motion_cov[(pos, pos)] = block[0][0];
            motion_cov[(pos, vel)] = block[0][1];
            motion_cov[(vel, pos)] = block[1][0];
            motion_cov[(vel, vel)] = block[1][1];
        }
        motion_cov[(2, 2)] = noise.q_var_size * dt;
        motion_cov[(3, 3)] = noise.q_var_size * dt;

        let innovation_cov = SMatrix::from_diagonal(&SVector::from([
            noise.r_var_pos,
            noise.r_var_pos,
            noise.r_var_size,
            noise.r_var_size,
        ]));

        CvBoxKalmanFilter {
            motion_matrix,
            update_matrix: SMatrix::identity(),
            motion_cov,
            innovation_cov,
            p_cov_p0: noise.p_cov_p0,
        }
    }

    fn measurement(bbox: &BoundingBox) -> SVector<f32, DIM_CV_BOX> {
        let c = bbox.center();
        SVector::from([c.x, c.y, bbox.width(), bbox.height()])
    }

    /// Initialize the filter with the first observation
    ///
    pub fn initiate(&self, bbox: &BoundingBox) -> KalmanState<DIM_CV_BOX_STATE> {
        let z = Self::measurement(bbox);
        let mean: SVector<f32, DIM_CV_BOX_STATE> =
            SVector::from([z[0], z[1], z[2], z[3], 0.0, 0.0]);
        let covariance = SMatrix::identity() * self.p_cov_p0;
        KalmanState { mean, covariance }
    }

    /// Predicts the state one time step ahead
    ///
    pub fn predict(
        &self,
        state: &KalmanState<DIM_CV_BOX_STATE>,
    ) -> KalmanState<DIM_CV_BOX_STATE> {
        let (mean, covariance) = (state.mean, state.covariance);
        let mean = self.motion_matrix * mean;
        let covariance =
            self.motion_matrix * covariance * self.motion_matrix.transpose() + self.motion_cov;
        KalmanState { mean, covariance }
    }

    /// Projects the state into the measurement space
    ///
    pub fn project(&self, state: &KalmanState<DIM_CV_BOX_STATE>) -> KalmanState<DIM_CV_BOX> {
        let (mean, covariance) = (state.mean, state.covariance);
        let mean = self.update_matrix * mean;
        let covariance = self.update_matrix * covariance * self.update_matrix.transpose()
            + self.innovation_cov;
        KalmanState { mean, covariance }
    }

    /// Updates the state with the current observation
    ///
    pub fn update(
        &self,
        state: &KalmanState<DIM_CV_BOX_STATE>,
        measurement: &BoundingBox,
    ) -> Result<KalmanState<DIM_CV_BOX_STATE>> {
        let (mean, covariance) = (state.mean, state.covariance);
        let projected_state = self.project(state);
        let (projected_mean, projected_cov) = (projected_state.mean, projected_state.covariance);

        let cholesky = projected_cov
            .cholesky()
            .ok_or(Errors::SingularCovariance)?;
        // S^-1 * H * P, the transposed gain (P is symmetric)
        let kalman_gain = cholesky.solve(&(self.update_matrix * covariance));

        let innovation = Self::measurement(measurement) - projected_mean;
        let innovation: SMatrix<f32, 1, DIM_CV_BOX> = innovation.transpose();

        let mean = mean + (innovation * kalman_gain).transpose();
        let covariance = covariance - kalman_gain.transpose() * projected_cov * kalman_gain;
        Ok(KalmanState { mean, covariance })
    }

    /// Measurement-space residual of the state against the observation
    ///
    pub fn residual(
        &self,
        state: &KalmanState<DIM_CV_BOX_STATE>,
        measurement: &BoundingBox,
    ) -> SVector<f32, DIM_CV_BOX> {
        self.update_matrix * state.mean - Self::measurement(measurement)
    }
}

impl From<&KalmanState<DIM_CV_BOX_STATE>> for BoundingBox {
    fn from(s: &KalmanState<DIM_CV_BOX_STATE>) -> Self {
        BoundingBox::from_center(s.mean[0], s.mean[1], s.mean[2], s.mean[3])
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::bbox::BoundingBox;
    use crate::utils::kalman::kalman_cv_box::{CvBoxKalmanFilter, CvNoise};

    #[test]
    fn constructor() {
        let f = CvBoxKalmanFilter::default();
        let bbox = BoundingBox::new(1.0, 2.0, 5.0, 6.0);

        let state = f.initiate(&bbox);
        assert_eq!(BoundingBox::from(&state), bbox);

        let state = f.predict(&state);
        assert_eq!(BoundingBox::from(&state), bbox);
    }

    #[test]
    fn learns_velocity() {
        let f = CvBoxKalmanFilter::new(1.0, CvNoise::default());
        let mut state = f.initiate(&BoundingBox::new(10.0, 10.0, 30.0, 30.0));

        for i in 1..10 {
            state = f.predict(&state);
            let x = 10.0 + 5.0 * i as f32;
            state = f.update(&state, &BoundingBox::new(x, 10.0, x + 20.0, 30.0)).unwrap();
        }

        let predicted = f.predict(&state);
        let center = BoundingBox::from(&predicted).center();
        // the next ground truth center is 20 + 5 * 10
        assert!((center.x - 70.0).abs() < 1.0, "center.x = {}", center.x);
        assert!((center.y - 20.0).abs() < 0.5);
    }

    #[test]
    fn residual_is_estimate_minus_observation() {
        let f = CvBoxKalmanFilter::default();
        let state = f.initiate(&BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let r = f.residual(&state, &BoundingBox::new(2.0, 0.0, 12.0, 10.0));
        assert!((r[0] + 2.0).abs() < 1e-5);
        assert!(r[1].abs() < 1e-5);
    }
}
