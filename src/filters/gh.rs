use crate::detection::Detection;
use crate::filters::SingleObjectFilter;
use crate::utils::bbox::BoundingBox;
use crate::utils::stats::ErrorStats;
use anyhow::Result;
use nalgebra::{Point2, Vector2};

/// g-h filter over the box center. The box size follows the last observation.
///
#[derive(Debug, Clone)]
pub struct GhTracker {
    position: Point2<f32>,
    velocity: Vector2<f32>,
    g: f32,
    h: f32,
    dt: f32,
    width: f32,
    height: f32,
    last_error: Option<ErrorStats>,
}

impl GhTracker {
    /// Creates the filter
    ///
    /// # Parameters
    /// * `g` - position gain in `[0, 1]`
    /// * `h` - velocity gain in `[0, 1]`
    ///
    pub fn new(dt: f32, g: f32, h: f32, bbox: &BoundingBox) -> Self {
        Self {
            position: bbox.center(),
            velocity: Vector2::zeros(),
            g,
            h,
            dt,
            width: bbox.width(),
            height: bbox.height(),
            last_error: None,
        }
    }

    pub fn velocity(&self) -> Vector2<f32> {
        self.velocity
    }
}

impl SingleObjectFilter for GhTracker {
    fn predict(&mut self) -> Point2<f32> {
        self.position += self.velocity * self.dt;
        self.position
    }

    fn correct(&mut self, detection: &Detection) -> Result<()> {
        let observed = detection.bbox.center();
        let residual = observed - self.position;
        self.last_error = ErrorStats::from_error([-residual.x, -residual.y]);

        self.velocity += residual * (self.h / self.dt);
        self.position += residual * self.g;
        self.width = detection.bbox.width();
        self.height = detection.bbox.height();
        Ok(())
    }

    fn error(&self) -> Option<ErrorStats> {
        self.last_error
    }

    fn bbox(&self) -> BoundingBox {
        BoundingBox::from_center(self.position.x, self.position.y, self.width, self.height)
    }

    fn center(&self) -> Point2<f32> {
        self.position
    }
}
