use crate::persistence::{MetricRecord, Persistence};
use crate::pipeline::fanout::fanout_thread;
use crate::pipeline::zone_worker::ZoneWorker;
use crate::track::Track;
use crate::trackers::mot::StepResult;
use crate::utils::stats::ErrorStats;
use crate::zones::grid::SpatialGrid;
use crate::zones::roi::RoiZone;
use crate::Errors;
use anyhow::Result;
use crossbeam::channel::{unbounded, Sender};
use log::{info, warn};
use std::thread::{spawn, JoinHandle};

/// Per-track fan-out stage
pub mod fanout;

/// Zone evaluation stage, the single writer of the store
pub mod zone_worker;

/// Frame loop driving the detector, the tracker and the pipeline
pub mod runner;

/// JSON lines frame source for offline runs
pub mod replay;

/// Tracking step report pushed by the frame-production context
///
#[derive(Debug, Clone)]
pub struct StepReport {
    pub result: StepResult,
    /// detections that reached the tracker
    pub detections: usize,
    /// processing time of the frame
    pub step_ms: f64,
    pub error: Option<ErrorStats>,
}

#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Step(StepReport),
    Exit,
}

/// Aggregated values of one step, written to the metrics sink
///
#[derive(Debug, Clone, Default)]
pub struct StepMetrics {
    pub step: u64,
    pub tracks: usize,
    pub detections: usize,
    pub population_delta: i64,
    pub error: Option<ErrorStats>,
    pub step_ms: f64,
}

impl StepMetrics {
    /// Metric samples of the step, the zone occupancy is known only to the zone stage
    ///
    pub fn records(&self, occupancy: u32) -> Vec<MetricRecord> {
        let mut records = vec![
            MetricRecord::new("tracks", self.step, self.tracks as f64),
            MetricRecord::new("detections", self.step, self.detections as f64),
            MetricRecord::new("population_delta", self.step, self.population_delta as f64),
            MetricRecord::new("occupancy", self.step, f64::from(occupancy)),
            MetricRecord::new("step_ms", self.step, self.step_ms),
        ];
        if let Some(e) = self.error {
            records.push(MetricRecord::new("error_mean", self.step, f64::from(e.mean)));
            records.push(MetricRecord::new(
                "error_mean_sq",
                self.step,
                f64::from(e.mean_sq),
            ));
        }
        records
    }
}

#[derive(Debug, Clone)]
pub enum TrackEvent {
    /// The track is active in the step, `previous` is its snapshot of the previous step
    Update {
        step: u64,
        track: Track,
        previous: Option<Track>,
    },
    /// The track was active in the previous step and is not anymore
    Departed { step: u64, track: Track },
    /// All track events of the step were emitted
    StepEnd(StepMetrics),
    Exit,
}

/// Two-stage event pipeline: tracker events are fanned out to per-track events which are
/// evaluated against the zone and written to the store.
///
/// Both queues are unbounded, pushing never blocks the frame-production context.
///
pub struct Pipeline<P: Persistence + 'static> {
    tracker_tx: Option<Sender<TrackerEvent>>,
    track_tx: Option<Sender<TrackEvent>>,
    fanout: Option<JoinHandle<()>>,
    zone: Option<JoinHandle<ZoneWorker<P>>>,
}

/// State of the zone stage returned on shutdown
///
pub struct PipelineOutput<P> {
    pub zone: RoiZone,
    pub store: P,
    /// number of track events evaluated
    pub events: u64,
}

impl<P: Persistence + 'static> Pipeline<P> {
    pub fn new(grid: SpatialGrid, zone: RoiZone, store: P) -> Self {
        let (tracker_tx, tracker_rx) = unbounded();
        let (track_tx, track_rx) = unbounded();

        let fanout_tx = track_tx.clone();
        let fanout = spawn(move || fanout_thread(tracker_rx, fanout_tx));

        let worker = ZoneWorker::new(grid, zone, store);
        let zone = spawn(move || worker.run(track_rx));

        info!("Pipeline started");
        Self {
            tracker_tx: Some(tracker_tx),
            track_tx: Some(track_tx),
            fanout: Some(fanout),
            zone: Some(zone),
        }
    }

    /// Queues the report of one tracking step
    ///
    pub fn push_step(&self, report: StepReport) -> Result<()> {
        let tx = self.tracker_tx.as_ref().ok_or(Errors::PipelineStopped)?;
        tx.send(TrackerEvent::Step(report))
            .map_err(|_| Errors::PipelineStopped)?;
        Ok(())
    }

    /// Drains both queues and stops the workers, the fan-out stage first
    ///
    pub fn shutdown(mut self) -> Result<PipelineOutput<P>> {
        self.stop()?.ok_or_else(|| Errors::PipelineStopped.into())
    }

    fn stop(&mut self) -> Result<Option<PipelineOutput<P>>> {
        if self.fanout.is_none() && self.zone.is_none() {
            return Ok(None);
        }
        if let Some(tx) = self.tracker_tx.take() {
            if tx.send(TrackerEvent::Exit).is_err() {
                warn!("Fan-out stage is already gone");
            }
        }
        if let Some(fanout) = self.fanout.take() {
            fanout
                .join()
                .map_err(|_| Errors::WorkerPanicked("fanout"))?;
        }
        if let Some(tx) = self.track_tx.take() {
            if tx.send(TrackEvent::Exit).is_err() {
                warn!("Zone stage is already gone");
            }
        }
        let output = match self.zone.take() {
            Some(zone) => {
                let worker = zone.join().map_err(|_| Errors::WorkerPanicked("zone"))?;
                Some(worker.finish())
            }
            None => None,
        };
        info!("Pipeline stopped");
        Ok(output)
    }
}

impl<P: Persistence + 'static> Drop for Pipeline<P> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Pipeline shutdown failed: {}", e);
        }
    }
}
