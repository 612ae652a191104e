use crate::detection::Detection;
use crate::filters::{MotionFilter, SingleObjectFilter};
use crate::track::{Track, TrackId};
use crate::trackers::matching::{greedy_match, iou_matrix};
use crate::trackers::options::TrackerOptions;
use crate::utils::bbox::BoundingBox;
use crate::utils::stats::ErrorStats;
use log::{debug, warn};

/// Live track owned by the tracker
///
#[derive(Debug)]
struct TrackState {
    id: TrackId,
    filter: MotionFilter,
    score: f32,
    class_id: i64,
    staleness: u32,
    steps_alive: u32,
}

impl TrackState {
    fn snapshot(&self) -> Track {
        Track {
            id: self.id,
            bbox: self.filter.bbox(),
            score: self.score,
            class_id: self.class_id,
            staleness: self.staleness,
            steps_alive: self.steps_alive,
        }
    }
}

/// Outcome of one tracking step
///
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    /// 1-based step number
    pub step: u64,
    /// reported tracks ordered by id
    pub active_tracks: Vec<Track>,
    /// `|active_tracks| - |previous active_tracks|`
    pub population_delta: i64,
    /// tracks destroyed during the step
    pub retired: Vec<Track>,
}

/// Associates detections with tracks and manages their lifecycle. Every track owns
/// one filter of the configured motion model.
///
#[derive(Debug)]
pub struct MultiObjectTracker {
    opts: TrackerOptions,
    tracks: Vec<TrackState>,
    track_id: TrackId,
    step: u64,
    previous_active: usize,
}

impl Default for MultiObjectTracker {
    fn default() -> Self {
        Self::new(TrackerOptions::default())
    }
}

impl MultiObjectTracker {
    pub fn new(opts: TrackerOptions) -> Self {
        Self {
            opts,
            tracks: Vec::default(),
            track_id: 0,
            step: 0,
            previous_active: 0,
        }
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.opts
    }

    fn gen_track_id(&mut self) -> TrackId {
        self.track_id += 1;
        self.track_id
    }

    /// Number of live tracks, the unreported ones included
    ///
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Snapshots of all live tracks ordered by id
    ///
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.iter().map(TrackState::snapshot).collect()
    }

    /// Advances the tracker by one step
    ///
    /// # Parameters
    /// * `detections` - sanitized detections of the step, an empty vector makes a coast step
    ///
    pub fn step(&mut self, detections: Vec<Detection>) -> StepResult {
        self.step += 1;

        for t in self.tracks.iter_mut() {
            t.filter.predict();
            t.steps_alive = t.steps_alive.saturating_add(1);
        }

        let mut matched = vec![false; self.tracks.len()];

        let spawn = if detections.is_empty() {
            Vec::default()
        } else {
            // diverged filters do not take part in the association
            let boxes = self
                .tracks
                .iter()
                .map(|t| {
                    if t.filter.is_invalid() {
                        BoundingBox::new(f32::NAN, f32::NAN, f32::NAN, f32::NAN)
                    } else {
                        t.filter.bbox()
                    }
                })
                .collect::<Vec<_>>();
            let detection_boxes = detections.iter().map(|d| d.bbox).collect::<Vec<_>>();
            let iou = iou_matrix(&detection_boxes, &boxes);
            let assignment = greedy_match(
                &iou,
                boxes.len(),
                self.opts.min_iou,
                self.opts.multi_match_min_iou,
            );

            for (d, t) in assignment.matches {
                let detection = &detections[d];
                let track = &mut self.tracks[t];
                if let Err(e) = track.filter.correct(detection) {
                    warn!("Track {} correction failed: {}", track.id, e);
                }
                track.staleness = 0;
                track.score = detection.score;
                track.class_id = detection.class_id;
                matched[t] = true;
            }

            assignment
                .unmatched_detections
                .into_iter()
                .map(|d| detections[d])
                .collect::<Vec<_>>()
        };

        for (t, m) in self.tracks.iter_mut().zip(matched) {
            if !m {
                t.staleness = t.staleness.saturating_add(1);
            }
        }

        for detection in spawn {
            let id = self.gen_track_id();
            let filter = self.opts.model.build(
                self.opts.dt,
                &detection.bbox,
                self.opts.seed.wrapping_add(id),
            );
            debug!("Track {} spawned at {:?}", id, detection.bbox);
            self.tracks.push(TrackState {
                id,
                filter,
                score: detection.score,
                class_id: detection.class_id,
                staleness: 0,
                steps_alive: 1,
            });
        }

        let (max_staleness, remove_invalid) = (self.opts.max_staleness, self.opts.remove_invalid);
        let mut retired = Vec::default();
        self.tracks.retain(|t| {
            let keep = t.staleness < max_staleness && !(remove_invalid && t.filter.is_invalid());
            if !keep {
                debug!("Track {} retired, staleness={}", t.id, t.staleness);
                retired.push(t.snapshot());
            }
            keep
        });

        let active_tracks = self
            .tracks
            .iter()
            .filter(|t| t.steps_alive >= self.opts.min_steps_alive && !t.filter.is_invalid())
            .map(TrackState::snapshot)
            .collect::<Vec<_>>();

        let population_delta = active_tracks.len() as i64 - self.previous_active as i64;
        self.previous_active = active_tracks.len();

        StepResult {
            step: self.step,
            active_tracks,
            population_delta,
            retired,
        }
    }

    /// Estimation error aggregated over all live filters, `None` until a filter was corrected
    ///
    pub fn error(&self) -> Option<ErrorStats> {
        let stats = self
            .tracks
            .iter()
            .filter_map(|t| t.filter.error())
            .collect::<Vec<_>>();
        ErrorStats::aggregate(stats.iter())
    }
}
