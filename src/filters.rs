use crate::detection::Detection;
use crate::filters::gh::GhTracker;
use crate::filters::kalman::KalmanTracker;
use crate::filters::particle::{ParticleOptions, ParticleTracker};
use crate::utils::bbox::BoundingBox;
use crate::utils::kalman::kalman_cv_box::CvNoise;
use crate::utils::stats::ErrorStats;
use anyhow::Result;
use nalgebra::Point2;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Constant velocity Kalman filter tracker
pub mod kalman;

/// Two-gain (g-h) filter tracker
pub mod gh;

/// Particle filter tracker with systematic resampling
pub mod particle;

/// The contract every single object filter implements.
///
/// `predict` is called exactly once per tracking step, before `correct`;
/// `correct` is called at most once per step.
///
pub trait SingleObjectFilter {
    /// Advances the state by one time step without evidence and returns the estimated center
    fn predict(&mut self) -> Point2<f32>;

    /// Updates the state from the associated detection and records the error distribution
    fn correct(&mut self, detection: &Detection) -> Result<()>;

    /// Error distribution of the last correction, `None` before the first one
    fn error(&self) -> Option<ErrorStats>;

    /// Current box estimate
    fn bbox(&self) -> BoundingBox;

    fn center(&self) -> Point2<f32> {
        self.bbox().center()
    }

    /// The state diverged and must not be reported
    fn is_invalid(&self) -> bool {
        self.bbox().has_nan()
    }
}

/// Filter family selector read from the configuration
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionModelKind {
    #[default]
    Kalman,
    Gh,
    Particle,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown motion model `{0}`, expected one of: kalman, gh, particle")]
pub struct UnknownMotionModel(pub String);

impl FromStr for MotionModelKind {
    type Err = UnknownMotionModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kalman" => Ok(MotionModelKind::Kalman),
            "gh" => Ok(MotionModelKind::Gh),
            "particle" => Ok(MotionModelKind::Particle),
            other => Err(UnknownMotionModel(other.to_string())),
        }
    }
}

impl fmt::Display for MotionModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionModelKind::Kalman => "kalman",
            MotionModelKind::Gh => "gh",
            MotionModelKind::Particle => "particle",
        };
        f.write_str(name)
    }
}

/// Parametrized motion model: the factory of per-track filters.
///
/// The variant is fixed when the tracker is constructed.
///
#[derive(Debug, Clone)]
pub enum MotionModel {
    Kalman(CvNoise),
    Gh { g: f32, h: f32 },
    Particle(ParticleOptions),
}

pub const DEFAULT_GH_G: f32 = 0.5;
pub const DEFAULT_GH_H: f32 = 0.1;

impl Default for MotionModel {
    fn default() -> Self {
        MotionModel::Kalman(CvNoise::default())
    }
}

impl From<MotionModelKind> for MotionModel {
    fn from(kind: MotionModelKind) -> Self {
        match kind {
            MotionModelKind::Kalman => MotionModel::Kalman(CvNoise::default()),
            MotionModelKind::Gh => MotionModel::Gh {
                g: DEFAULT_GH_G,
                h: DEFAULT_GH_H,
            },
            MotionModelKind::Particle => MotionModel::Particle(ParticleOptions::default()),
        }
    }
}

impl MotionModel {
    pub fn kind(&self) -> MotionModelKind {
        match self {
            MotionModel::Kalman(_) => MotionModelKind::Kalman,
            MotionModel::Gh { .. } => MotionModelKind::Gh,
            MotionModel::Particle(_) => MotionModelKind::Particle,
        }
    }

    /// Creates the filter for a new track
    ///
    /// # Parameters
    /// * `dt` - time step between two tracking steps
    /// * `bbox` - the first observation
    /// * `seed` - seed for the stochastic filters
    ///
    pub fn build(&self, dt: f32, bbox: &BoundingBox, seed: u64) -> MotionFilter {
        match self {
            MotionModel::Kalman(noise) => MotionFilter::Kalman(KalmanTracker::new(dt, *noise, bbox)),
            MotionModel::Gh { g, h } => MotionFilter::Gh(GhTracker::new(dt, *g, *h, bbox)),
            MotionModel::Particle(opts) => {
                MotionFilter::Particle(ParticleTracker::new(dt, opts.clone(), bbox, seed))
            }
        }
    }
}

/// Closed set of filter implementations owned by tracks
///
#[derive(Debug)]
pub enum MotionFilter {
    Kalman(KalmanTracker),
    Gh(GhTracker),
    Particle(ParticleTracker),
}

macro_rules! dispatch {
    ($self:ident, $f:ident => $e:expr) => {
        match $self {
            MotionFilter::Kalman($f) => $e,
            MotionFilter::Gh($f) => $e,
            MotionFilter::Particle($f) => $e,
        }
    };
}

impl SingleObjectFilter for MotionFilter {
    fn predict(&mut self) -> Point2<f32> {
        dispatch!(self, f => f.predict())
    }

    fn correct(&mut self, detection: &Detection) -> Result<()> {
        dispatch!(self, f => f.correct(detection))
    }

    fn error(&self) -> Option<ErrorStats> {
        dispatch!(self, f => f.error())
    }

    fn bbox(&self) -> BoundingBox {
        dispatch!(self, f => f.bbox())
    }

    fn center(&self) -> Point2<f32> {
        dispatch!(self, f => f.center())
    }

    fn is_invalid(&self) -> bool {
        dispatch!(self, f => f.is_invalid())
    }
}
