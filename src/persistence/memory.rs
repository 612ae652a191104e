use crate::persistence::{
    cell_scores, cell_traffic, track_durations, track_ids, track_points, MetricRecord,
    Persistence, TrackDuration, TrackRecord,
};
use crate::track::TrackId;
use crate::zones::grid::CellId;
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Records {
    tracks: Vec<TrackRecord>,
    metrics: Vec<MetricRecord>,
}

/// Store keeping the records in memory. Clones share the same records, so a clone kept
/// outside of the pipeline observes what the pipeline writes.
///
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|e| anyhow!("Memory store lock is poisoned: {}", e))
    }

    pub fn tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self.lock()?.tracks.clone())
    }

    pub fn metrics(&self) -> Result<Vec<MetricRecord>> {
        Ok(self.lock()?.metrics.clone())
    }
}

impl Persistence for MemoryStore {
    fn save_track(&mut self, record: &TrackRecord) -> Result<()> {
        self.lock()?.tracks.push(record.clone());
        Ok(())
    }

    fn save_metric(&mut self, record: &MetricRecord) -> Result<()> {
        self.lock()?.metrics.push(record.clone());
        Ok(())
    }

    fn load_cell_scores(&self) -> Result<Vec<(CellId, f32)>> {
        Ok(cell_scores(&self.lock()?.tracks))
    }

    fn load_cell_traffic(&self) -> Result<Vec<(CellId, u64)>> {
        Ok(cell_traffic(&self.lock()?.tracks))
    }

    fn load_track_durations(&self) -> Result<Vec<TrackDuration>> {
        Ok(track_durations(&self.lock()?.tracks))
    }

    fn load_metrics(&self, name: &str) -> Result<Vec<MetricRecord>> {
        Ok(self
            .lock()?
            .metrics
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect())
    }

    fn load_track_ids(&self) -> Result<Vec<TrackId>> {
        Ok(track_ids(&self.lock()?.tracks))
    }

    fn load_track_points(&self, track_id: TrackId) -> Result<Vec<TrackRecord>> {
        Ok(track_points(&self.lock()?.tracks, track_id))
    }
}
