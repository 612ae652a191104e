pub use crate::config::Config;
pub use crate::detection::{Detection, DetectionFilter, Detector};
pub use crate::filters::{MotionFilter, MotionModel, MotionModelKind, SingleObjectFilter};
pub use crate::persistence::jsonl::JsonlStore;
pub use crate::persistence::memory::MemoryStore;
pub use crate::persistence::{MetricRecord, Persistence, TrackRecord};
pub use crate::pipeline::replay::{ReplayDetector, ReplaySource};
pub use crate::pipeline::runner::{FrameSource, Runner};
pub use crate::pipeline::Pipeline;
pub use crate::track::{Track, TrackId};
pub use crate::trackers::mot::{MultiObjectTracker, StepResult};
pub use crate::trackers::options::TrackerOptions;
pub use crate::utils::bbox::BoundingBox;
pub use crate::zones::grid::{Cell, CellId, SpatialGrid};
pub use crate::zones::roi::{RoiZone, Transition};
