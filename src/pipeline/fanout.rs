use crate::pipeline::{StepMetrics, TrackEvent, TrackerEvent};
use crate::track::{Track, TrackId};
use crossbeam::channel::{Receiver, Sender};
use log::{debug, warn};
use std::collections::HashMap;

fn send(tx: &Sender<TrackEvent>, event: TrackEvent) {
    if let Err(e) = tx.send(event) {
        warn!("Track event dropped, the zone stage is gone: {:?}", e.0);
    }
}

/// Splits every tracker step into per-track events. The previous snapshot map is
/// rebuilt each step from the active tracks.
///
pub(crate) fn fanout_thread(rx: Receiver<TrackerEvent>, tx: Sender<TrackEvent>) {
    let mut previous: HashMap<TrackId, Track> = HashMap::default();

    while let Ok(event) = rx.recv() {
        match event {
            TrackerEvent::Step(report) => {
                let step = report.result.step;
                let mut current = HashMap::with_capacity(report.result.active_tracks.len());

                for track in report.result.active_tracks.iter() {
                    send(
                        &tx,
                        TrackEvent::Update {
                            step,
                            track: *track,
                            previous: previous.remove(&track.id),
                        },
                    );
                    current.insert(track.id, *track);
                }

                let mut departed = previous.into_values().collect::<Vec<_>>();
                departed.sort_by_key(|t| t.id);
                for track in departed {
                    debug!("Track {} departed at step {}", track.id, step);
                    send(&tx, TrackEvent::Departed { step, track });
                }
                previous = current;

                send(
                    &tx,
                    TrackEvent::StepEnd(StepMetrics {
                        step,
                        tracks: report.result.active_tracks.len(),
                        detections: report.detections,
                        population_delta: report.result.population_delta,
                        error: report.error,
                        step_ms: report.step_ms,
                    }),
                );
            }
            TrackerEvent::Exit => break,
        }
    }
}
