use crate::detection::Detection;
use crate::filters::SingleObjectFilter;
use crate::utils::bbox::BoundingBox;
use crate::utils::kalman::kalman_cv_box::{CvBoxKalmanFilter, CvNoise, DIM_CV_BOX_STATE};
use crate::utils::kalman::KalmanState;
use crate::utils::stats::ErrorStats;
use crate::Errors;
use anyhow::Result;
use log::warn;
use nalgebra::Point2;

#[derive(Debug)]
pub struct KalmanTracker {
    filter: CvBoxKalmanFilter,
    state: KalmanState<DIM_CV_BOX_STATE>,
    last_error: Option<ErrorStats>,
    diverged: bool,
}

impl KalmanTracker {
    pub fn new(dt: f32, noise: CvNoise, bbox: &BoundingBox) -> Self {
        let filter = CvBoxKalmanFilter::new(dt, noise);
        let state = filter.initiate(bbox);
        Self {
            filter,
            state,
            last_error: None,
            diverged: false,
        }
    }

    pub fn state(&self) -> &KalmanState<DIM_CV_BOX_STATE> {
        &self.state
    }
}

impl SingleObjectFilter for KalmanTracker {
    fn predict(&mut self) -> Point2<f32> {
        self.state = self.filter.predict(&self.state);
        self.center()
    }

    fn correct(&mut self, detection: &Detection) -> Result<()> {
        let residual = self.filter.residual(&self.state, &detection.bbox);
        self.last_error = ErrorStats::from_error(residual.iter().copied());

        match self.filter.update(&self.state, &detection.bbox) {
            Ok(state) if !state.has_nan() => {
                self.state = state;
                Ok(())
            }
            Ok(_) => {
                warn!("Kalman update produced NaN state, the filter is marked invalid");
                self.diverged = true;
                Err(Errors::FilterDiverged.into())
            }
            Err(e) => {
                warn!("Kalman update failed: {}, the filter is marked invalid", e);
                self.diverged = true;
                Err(e)
            }
        }
    }

    fn error(&self) -> Option<ErrorStats> {
        self.last_error
    }

    fn bbox(&self) -> BoundingBox {
        BoundingBox::from(&self.state)
    }

    fn is_invalid(&self) -> bool {
        self.diverged || self.state.has_nan()
    }
}
