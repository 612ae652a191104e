use crate::utils::bbox::BoundingBox;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Raw observation produced by the external detector for one frame
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: i64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, score: f32, class_id: i64) -> Self {
        Self {
            bbox,
            score,
            class_id,
        }
    }
}

/// External detector contract. Implementations must not hold references to
/// tracker state.
///
pub trait Detector {
    type Frame;

    fn detect(&mut self, frame: &Self::Frame) -> Vec<Detection>;
}

/// Drops malformed detections before they reach the tracker
///
#[derive(Debug, Clone, Default)]
pub struct DetectionFilter {
    /// allowed classes, all classes are accepted when empty
    pub classes: HashSet<i64>,
    /// detections with lower score are dropped
    pub min_confidence: f32,
}

impl DetectionFilter {
    pub fn new(classes: impl IntoIterator<Item = i64>, min_confidence: f32) -> Self {
        Self {
            classes: classes.into_iter().collect(),
            min_confidence,
        }
    }

    pub fn accepts(&self, d: &Detection) -> bool {
        if let Err(e) = d.bbox.validate() {
            warn!("Detection dropped: {}", e);
            return false;
        }
        if !(0.0..=1.0).contains(&d.score) {
            warn!("Detection dropped: score {} is out of [0, 1]", d.score);
            return false;
        }
        if !self.classes.is_empty() && !self.classes.contains(&d.class_id) {
            return false;
        }
        d.score >= self.min_confidence
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::{Detection, DetectionFilter};
    use crate::utils::bbox::BoundingBox;

    #[test]
    fn filter() {
        let f = DetectionFilter::new([0], 0.5);
        let good = Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9, 0);
        let res = f.apply(vec![
            good,
            Detection::new(BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0), 0.9, 0),
            Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.4, 0),
            Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9, 2),
            Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1.5, 0),
        ]);
        assert_eq!(res, vec![good]);
    }

    #[test]
    fn empty_class_set_accepts_everything() {
        let f = DetectionFilter::default();
        let d = Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.1, 42);
        assert!(f.accepts(&d));
    }

    #[test]
    fn deserialize() {
        let d: Detection =
            serde_json::from_str(r#"{"box":{"x_min":1,"y_min":2,"x_max":3,"y_max":4},"score":0.5,"class_id":0}"#)
                .unwrap();
        assert_eq!(d.bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
    }
}
