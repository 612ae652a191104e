use crate::Errors::MalformedBox;
use crate::{EstimateClose, EPS};
use anyhow::Result;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Bounding box in the format (x_min, y_min, x_max, y_max), pixel space
///
#[derive(Clone, Default, Debug, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    /// Constructor
    ///
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Creates the box from the center and the size
    ///
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    /// Creates the box in (left, top, width, height) format
    ///
    pub fn ltwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// The midpoint of the box
    ///
    pub fn center(&self) -> Point2<f32> {
        Point2::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn has_nan(&self) -> bool {
        self.x_min.is_nan() || self.y_min.is_nan() || self.x_max.is_nan() || self.y_max.is_nan()
    }

    /// Checks that the box is finite and not inverted
    ///
    pub fn validate(&self) -> Result<()> {
        if self.has_nan()
            || !self.x_min.is_finite()
            || !self.y_min.is_finite()
            || !self.x_max.is_finite()
            || !self.y_max.is_finite()
        {
            return Err(MalformedBox(format!("non-finite coordinates in {self:?}")).into());
        }
        if self.x_max <= self.x_min || self.y_max <= self.y_min {
            return Err(MalformedBox(format!("empty or inverted box {self:?}")).into());
        }
        Ok(())
    }

    pub fn intersection(l: &BoundingBox, r: &BoundingBox) -> f64 {
        let (x1, y1) = (l.x_min.max(r.x_min), l.y_min.max(r.y_min));
        let (x2, y2) = (l.x_max.min(r.x_max), l.y_max.min(r.y_max));

        let int_width = x2 - x1;
        let int_height = y2 - y1;

        if int_width > 0.0 && int_height > 0.0 {
            (int_width * int_height) as f64
        } else {
            0.0_f64
        }
    }

    /// Intersection over union, `0.0` for disjoint or degenerate boxes
    ///
    pub fn iou(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let intersection = BoundingBox::intersection(l, r);
        if intersection == 0.0 {
            return 0.0;
        }
        let union = (l.area() + r.area()) as f64 - intersection;
        if union <= 0.0 {
            0.0
        } else {
            (intersection / union) as f32
        }
    }
}

impl EstimateClose for BoundingBox {
    /// Allows comparing bboxes
    ///
    fn almost_same(&self, other: &Self, eps: f32) -> bool {
        (self.x_min - other.x_min).abs() < eps
            && (self.y_min - other.y_min).abs() < eps
            && (self.x_max - other.x_max).abs() < eps
            && (self.y_max - other.y_max).abs() < eps
    }
}

impl PartialEq<Self> for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.almost_same(other, EPS)
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}
