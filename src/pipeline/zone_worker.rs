use crate::persistence::{now_millis, Persistence, TrackRecord};
use crate::pipeline::{PipelineOutput, StepMetrics, TrackEvent};
use crate::track::Track;
use crate::zones::grid::{CellId, SpatialGrid};
use crate::zones::roi::{RoiZone, Transition};
use crossbeam::channel::Receiver;
use log::{debug, warn};

/// Evaluates track events against the zone and writes the store. Sink failures are
/// logged and the event is dropped.
///
pub struct ZoneWorker<P> {
    grid: SpatialGrid,
    zone: RoiZone,
    store: P,
    events: u64,
}

impl<P: Persistence> ZoneWorker<P> {
    pub fn new(grid: SpatialGrid, zone: RoiZone, store: P) -> Self {
        Self {
            grid,
            zone,
            store,
            events: 0,
        }
    }

    pub fn zone(&self) -> &RoiZone {
        &self.zone
    }

    fn cell(&self, track: &Track) -> Option<CellId> {
        self.grid.in_cell(&track.center()).map(|c| c.id)
    }

    /// Consumes the queue until the `Exit` sentinel
    ///
    pub fn run(mut self, rx: Receiver<TrackEvent>) -> Self {
        while let Ok(event) = rx.recv() {
            match event {
                TrackEvent::Exit => break,
                event => self.handle(event),
            }
        }
        if let Err(e) = self.store.flush() {
            warn!("Store flush failed: {}", e);
        }
        self
    }

    pub fn handle(&mut self, event: TrackEvent) {
        match event {
            TrackEvent::Update {
                step,
                track,
                previous,
            } => {
                self.events += 1;
                let current_cell = self.cell(&track);
                let previous_cell = previous.as_ref().and_then(|p| self.cell(p));
                let transition = self.zone.evaluate(current_cell, previous_cell);
                if transition != Transition::Outside {
                    debug!("Track {} step {}: {:?}", track.id, step, transition);
                }
                if let Some(cell_id) = transition.persisted_cell() {
                    let c = track.center();
                    let record = TrackRecord {
                        track_id: track.id,
                        position: (c.x, c.y),
                        direction: track.direction_delta(previous.as_ref()),
                        cell_id,
                        step,
                        roi_id: self.zone.id(),
                        score: track.score,
                        timestamp: now_millis(),
                    };
                    if let Err(e) = self.store.save_track(&record) {
                        warn!("Track record of {} at step {} dropped: {}", track.id, step, e);
                    }
                }
            }
            TrackEvent::Departed { step, track } => {
                self.events += 1;
                let last_cell = self.cell(&track);
                if let Transition::Exited { from } = self.zone.depart(last_cell) {
                    debug!("Track {} left the zone from cell {} at step {}", track.id, from, step);
                }
            }
            TrackEvent::StepEnd(metrics) => self.write_metrics(&metrics),
            TrackEvent::Exit => {}
        }
    }

    fn write_metrics(&mut self, metrics: &StepMetrics) {
        for record in metrics.records(self.zone.occupancy()) {
            if let Err(e) = self.store.save_metric(&record) {
                warn!("Metric {} of step {} dropped: {}", record.name, record.step, e);
            }
        }
    }

    pub fn finish(self) -> PipelineOutput<P> {
        PipelineOutput {
            zone: self.zone,
            store: self.store,
            events: self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::{MetricRecord, Persistence, TrackDuration, TrackRecord};
    use crate::pipeline::zone_worker::ZoneWorker;
    use crate::pipeline::{StepMetrics, TrackEvent};
    use crate::track::{Track, TrackId};
    use crate::utils::bbox::BoundingBox;
    use crate::zones::grid::{CellId, SpatialGrid};
    use crate::zones::roi::RoiZone;
    use anyhow::{bail, Result};

    /// Store rejecting every write
    struct BrokenStore;

    impl Persistence for BrokenStore {
        fn save_track(&mut self, _record: &TrackRecord) -> Result<()> {
            bail!("disk is full")
        }

        fn save_metric(&mut self, _record: &MetricRecord) -> Result<()> {
            bail!("disk is full")
        }

        fn load_cell_scores(&self) -> Result<Vec<(CellId, f32)>> {
            Ok(vec![])
        }

        fn load_cell_traffic(&self) -> Result<Vec<(CellId, u64)>> {
            Ok(vec![])
        }

        fn load_track_durations(&self) -> Result<Vec<TrackDuration>> {
            Ok(vec![])
        }

        fn load_metrics(&self, _name: &str) -> Result<Vec<MetricRecord>> {
            Ok(vec![])
        }

        fn load_track_ids(&self) -> Result<Vec<TrackId>> {
            Ok(vec![])
        }

        fn load_track_points(&self, _track_id: TrackId) -> Result<Vec<TrackRecord>> {
            Ok(vec![])
        }
    }

    #[test]
    fn failing_sink_does_not_stop_evaluation() {
        let grid = SpatialGrid::divided(10, 100, 100).unwrap();
        let mut worker = ZoneWorker::new(grid, RoiZone::new([0]), BrokenStore);
        let track = Track {
            id: 1,
            bbox: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            score: 0.5,
            class_id: 0,
            staleness: 0,
            steps_alive: 1,
        };
        worker.handle(TrackEvent::Update {
            step: 1,
            track,
            previous: None,
        });
        worker.handle(TrackEvent::StepEnd(StepMetrics::default()));
        assert_eq!(worker.zone().occupancy(), 1);
        worker.handle(TrackEvent::Departed { step: 2, track });
        assert_eq!(worker.zone().occupancy(), 0);
        assert_eq!(worker.finish().events, 2);
    }
}
