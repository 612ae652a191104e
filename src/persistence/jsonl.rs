use crate::persistence::{
    cell_scores, cell_traffic, track_durations, track_ids, track_points, MetricRecord,
    Persistence, TrackDuration, TrackRecord,
};
use crate::track::TrackId;
use crate::zones::grid::CellId;
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredRecord {
    Track(TrackRecord),
    Metric(MetricRecord),
}

/// Appends every record as one JSON line. Reads parse the file again, malformed
/// lines are skipped.
///
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl JsonlStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Unable to open store {}", path.display()))?;
        Ok(Self {
            path,
            writer: LineWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, record: &StoredRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", line)
            .with_context(|| format!("Unable to write to store {}", self.path.display()))?;
        Ok(())
    }

    fn read(&self) -> Result<Vec<StoredRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Unable to read store {}", self.path.display()))?;
        let mut records = Vec::default();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredRecord>(&line) {
                Ok(r) => records.push(r),
                Err(e) => warn!("{}:{} skipped: {}", self.path.display(), n + 1, e),
            }
        }
        Ok(records)
    }

    fn read_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self
            .read()?
            .into_iter()
            .filter_map(|r| match r {
                StoredRecord::Track(t) => Some(t),
                StoredRecord::Metric(_) => None,
            })
            .collect())
    }
}

impl Persistence for JsonlStore {
    fn save_track(&mut self, record: &TrackRecord) -> Result<()> {
        self.append(&StoredRecord::Track(record.clone()))
    }

    fn save_metric(&mut self, record: &MetricRecord) -> Result<()> {
        self.append(&StoredRecord::Metric(record.clone()))
    }

    fn load_cell_scores(&self) -> Result<Vec<(CellId, f32)>> {
        Ok(cell_scores(&self.read_tracks()?))
    }

    fn load_cell_traffic(&self) -> Result<Vec<(CellId, u64)>> {
        Ok(cell_traffic(&self.read_tracks()?))
    }

    fn load_track_durations(&self) -> Result<Vec<TrackDuration>> {
        Ok(track_durations(&self.read_tracks()?))
    }

    fn load_metrics(&self, name: &str) -> Result<Vec<MetricRecord>> {
        Ok(self
            .read()?
            .into_iter()
            .filter_map(|r| match r {
                StoredRecord::Metric(m) if m.name == name => Some(m),
                _ => None,
            })
            .collect())
    }

    fn load_track_ids(&self) -> Result<Vec<TrackId>> {
        Ok(track_ids(&self.read_tracks()?))
    }

    fn load_track_points(&self, track_id: TrackId) -> Result<Vec<TrackRecord>> {
        Ok(track_points(&self.read_tracks()?, track_id))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
