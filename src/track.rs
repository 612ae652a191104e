use crate::utils::bbox::BoundingBox;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Track identifier, unique for the tracker lifetime and never reused
pub type TrackId = u64;

/// Immutable snapshot of a track handed to consumers outside of the tracker
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub bbox: BoundingBox,
    /// score of the last associated detection
    pub score: f32,
    pub class_id: i64,
    /// consecutive steps without an associated detection
    pub staleness: u32,
    /// steps since creation, the creation step included
    pub steps_alive: u32,
}

impl Track {
    pub fn center(&self) -> Point2<f32> {
        self.bbox.center()
    }

    /// Center displacement relative to the previous snapshot of the same track
    ///
    pub fn direction_delta(&self, previous: Option<&Track>) -> (f32, f32) {
        match previous {
            Some(p) => {
                let (c, pc) = (self.center(), p.center());
                (c.x - pc.x, c.y - pc.y)
            }
            None => (0.0, 0.0),
        }
    }
}
