use crate::filters::MotionModel;

/// Default minimal IoU to associate a detection with a track
pub const DEFAULT_MIN_IOU: f32 = 0.1;

/// Default IoU a detection needs to correct a second track
pub const DEFAULT_MULTI_MATCH_MIN_IOU: f32 = 0.93;

/// Default number of missed steps after which a track is destroyed
pub const DEFAULT_MAX_STALENESS: u32 = 5;

/// Default number of steps a track must live to be reported
pub const DEFAULT_MIN_STEPS_ALIVE: u32 = 3;

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// time step between two tracking steps
    pub dt: f32,
    pub model: MotionModel,
    /// pairs with lower IoU are never associated
    pub min_iou: f32,
    /// an already matched detection corrects one more track only with IoU above this value
    pub multi_match_min_iou: f32,
    /// a track is reported when it lived at least this number of steps
    pub min_steps_alive: u32,
    /// a track is destroyed when it missed this number of consecutive steps
    pub max_staleness: u32,
    /// invalid (diverged) tracks are destroyed right away instead of waiting for staleness
    pub remove_invalid: bool,
    /// base seed of the stochastic filters; every track derives its own from it
    pub seed: u64,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            dt: 1.0,
            model: MotionModel::default(),
            min_iou: DEFAULT_MIN_IOU,
            multi_match_min_iou: DEFAULT_MULTI_MATCH_MIN_IOU,
            min_steps_alive: DEFAULT_MIN_STEPS_ALIVE,
            max_staleness: DEFAULT_MAX_STALENESS,
            remove_invalid: false,
            seed: 0,
        }
    }
}

impl TrackerOptions {
    pub fn dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    pub fn model(mut self, model: impl Into<MotionModel>) -> Self {
        self.model = model.into();
        self
    }

    pub fn min_iou(mut self, min_iou: f32) -> Self {
        self.min_iou = min_iou;
        self
    }

    pub fn multi_match_min_iou(mut self, iou: f32) -> Self {
        self.multi_match_min_iou = iou;
        self
    }

    pub fn min_steps_alive(mut self, steps: u32) -> Self {
        self.min_steps_alive = steps;
        self
    }

    pub fn max_staleness(mut self, steps: u32) -> Self {
        self.max_staleness = steps;
        self
    }

    pub fn remove_invalid(mut self, remove: bool) -> Self {
        self.remove_invalid = remove;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
