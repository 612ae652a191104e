use crate::detection::{Detection, DetectionFilter, Detector};
use crate::persistence::Persistence;
use crate::pipeline::{Pipeline, StepReport};
use crate::trackers::mot::MultiObjectTracker;
use anyhow::Result;
use log::{debug, info, warn};
use std::time::Instant;

/// Producer of frames, e.g. a video decoder
///
pub trait FrameSource {
    type Frame;

    /// Frame width and height in pixels
    fn dimensions(&self) -> (u32, u32);

    /// The next frame, `None` at the end of the stream
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    /// frames the detector was invoked on
    pub detections: u64,
    /// unreadable frames replaced by coast steps
    pub dropped: u64,
}

/// Frame-production context: runs the detector with the configured cadence, steps the
/// tracker on every frame and pushes the step reports to the pipeline.
///
pub struct Runner<D: Detector> {
    detector: D,
    filter: DetectionFilter,
    tracker: MultiObjectTracker,
    detection_rate: u32,
}

impl<D: Detector> Runner<D> {
    /// Creates the runner
    ///
    /// # Parameters
    /// * `detection_rate` - the detector runs on frame 0 and every `detection_rate`-th frame after it, other frames are coast steps
    ///
    pub fn new(
        detector: D,
        filter: DetectionFilter,
        tracker: MultiObjectTracker,
        detection_rate: u32,
    ) -> Self {
        Self {
            detector,
            filter,
            tracker,
            detection_rate: detection_rate.max(1),
        }
    }

    pub fn tracker(&self) -> &MultiObjectTracker {
        &self.tracker
    }

    fn detect(&mut self, frame_index: u64, frame: &D::Frame) -> Option<Vec<Detection>> {
        if frame_index % u64::from(self.detection_rate) != 0 {
            return None;
        }
        Some(self.filter.apply(self.detector.detect(frame)))
    }

    /// Processes one frame and returns its step report
    ///
    pub fn process(&mut self, frame_index: u64, frame: &D::Frame) -> StepReport {
        let started = Instant::now();
        let detections = self.detect(frame_index, frame).unwrap_or_default();
        self.track(started, detections)
    }

    /// Steps the tracker without evidence for a frame that could not be read
    ///
    pub fn coast(&mut self) -> StepReport {
        self.track(Instant::now(), Vec::default())
    }

    fn track(&mut self, started: Instant, detections: Vec<Detection>) -> StepReport {
        let count = detections.len();
        let result = self.tracker.step(detections);
        StepReport {
            result,
            detections: count,
            step_ms: started.elapsed().as_secs_f64() * 1000.0,
            error: self.tracker.error(),
        }
    }

    /// Drives the source to its end. Unreadable frames are logged and replaced by coast
    /// steps, so the step count keeps following the frame count.
    ///
    pub fn run<S, P>(&mut self, source: &mut S, pipeline: &Pipeline<P>) -> Result<RunSummary>
    where
        S: FrameSource<Frame = D::Frame>,
        P: Persistence + 'static,
    {
        let mut summary = RunSummary::default();
        loop {
            let report = match source.next_frame() {
                Ok(Some(frame)) => {
                    if summary.frames % u64::from(self.detection_rate) == 0 {
                        summary.detections += 1;
                    }
                    self.process(summary.frames, &frame)
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Frame {} dropped: {:#}", summary.frames, e);
                    summary.dropped += 1;
                    self.coast()
                }
            };
            debug!(
                "Frame {}: {} active tracks, delta {}",
                summary.frames,
                report.result.active_tracks.len(),
                report.result.population_delta
            );
            pipeline.push_step(report)?;
            summary.frames += 1;
        }
        info!(
            "Source exhausted after {} frames ({} detector runs, {} dropped)",
            summary.frames, summary.detections, summary.dropped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::{Detection, DetectionFilter, Detector};
    use crate::persistence::memory::MemoryStore;
    use crate::persistence::Persistence;
    use crate::pipeline::replay::{ReplayDetector, ReplaySource};
    use crate::pipeline::runner::{FrameSource, Runner};
    use crate::pipeline::Pipeline;
    use crate::trackers::mot::MultiObjectTracker;
    use crate::trackers::options::TrackerOptions;
    use crate::utils::bbox::BoundingBox;
    use crate::zones::grid::SpatialGrid;
    use crate::zones::roi::RoiZone;
    use anyhow::Result;
    use std::io::Write;

    struct CountingDetector {
        calls: Vec<u64>,
    }

    impl Detector for CountingDetector {
        type Frame = u64;

        fn detect(&mut self, frame: &u64) -> Vec<Detection> {
            self.calls.push(*frame);
            let x = 10.0 + *frame as f32;
            vec![
                Detection::new(BoundingBox::new(x, 10.0, x + 20.0, 30.0), 0.9, 0),
                Detection::new(BoundingBox::new(x, 50.0, x + 20.0, 70.0), 0.2, 0),
            ]
        }
    }

    struct Counter(u64, u64);

    impl FrameSource for Counter {
        type Frame = u64;

        fn dimensions(&self) -> (u32, u32) {
            (200, 100)
        }

        fn next_frame(&mut self) -> Result<Option<u64>> {
            if self.0 == self.1 {
                return Ok(None);
            }
            self.0 += 1;
            Ok(Some(self.0 - 1))
        }
    }

    #[test]
    fn cadence_and_filtering() {
        let mut runner = Runner::new(
            CountingDetector { calls: vec![] },
            DetectionFilter::new([0], 0.5),
            MultiObjectTracker::new(TrackerOptions::default().min_steps_alive(1)),
            3,
        );
        let mut source = Counter(0, 10);
        let (w, h) = source.dimensions();
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(
            SpatialGrid::divided(50, w, h).unwrap(),
            RoiZone::new([0, 1, 2, 3]),
            store.clone(),
        );

        let summary = runner.run(&mut source, &pipeline).unwrap();
        pipeline.shutdown().unwrap();

        assert_eq!(summary.frames, 10);
        assert_eq!(summary.detections, 4);
        assert_eq!(runner.detector.calls, vec![0, 3, 6, 9]);
        // the low score detection never spawned a track
        assert_eq!(runner.tracker().len(), 1);

        let detections = store
            .load_metrics("detections")
            .unwrap()
            .into_iter()
            .map(|m| m.value)
            .collect::<Vec<_>>();
        assert_eq!(
            detections,
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn malformed_frame_becomes_coast_step() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..10 {
            if i == 3 {
                writeln!(file, "{{oops").unwrap();
                continue;
            }
            let x = 10.0 + 2.0 * i as f32;
            writeln!(
                file,
                r#"[{{"box":{{"x_min":{},"y_min":10,"x_max":{},"y_max":30}},"score":0.9,"class_id":0}}]"#,
                x,
                x + 20.0
            )
            .unwrap();
        }

        let mut source = ReplaySource::open(file.path(), (200, 100)).unwrap();
        let mut runner = Runner::new(
            ReplayDetector,
            DetectionFilter::default(),
            MultiObjectTracker::new(TrackerOptions::default().min_steps_alive(1)),
            1,
        );
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(
            SpatialGrid::divided(50, 200, 100).unwrap(),
            RoiZone::new([0, 1, 2, 3]),
            store.clone(),
        );

        let summary = runner.run(&mut source, &pipeline).unwrap();
        pipeline.shutdown().unwrap();

        assert_eq!(summary.frames, 10);
        assert_eq!(summary.detections, 9);
        assert_eq!(summary.dropped, 1);
        // the track survives the coast step and keeps its id
        let tracks = runner.tracker().tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, 1);

        let detections = store
            .load_metrics("detections")
            .unwrap()
            .into_iter()
            .map(|m| m.value)
            .collect::<Vec<_>>();
        assert_eq!(
            detections,
            vec![1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
    }
}
