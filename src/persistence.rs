use crate::track::TrackId;
use crate::zones::grid::CellId;
use crate::zones::roi::ZoneId;
use anyhow::Result;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// In-memory store
pub mod memory;

/// Append-only JSON lines store
pub mod jsonl;

/// Track observation persisted on zone entries and cell changes
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: TrackId,
    /// track center
    pub position: (f32, f32),
    /// center displacement since the previous step
    pub direction: (f32, f32),
    pub cell_id: CellId,
    pub step: u64,
    pub roi_id: ZoneId,
    pub score: f32,
    /// unix time in milliseconds
    pub timestamp: i64,
}

/// Per-step metric sample
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub step: u64,
    pub value: f64,
    /// unix time in milliseconds
    pub timestamp: i64,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            name: name.into(),
            step,
            value,
            timestamp: now_millis(),
        }
    }
}

/// First and last time a track was persisted
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDuration {
    pub track_id: TrackId,
    pub first: i64,
    pub last: i64,
}

impl TrackDuration {
    pub fn dwell(&self) -> Duration {
        Duration::milliseconds(self.last - self.first)
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Write and read contract of the storage engine. The write side is used by a single
/// writer, the zone worker of the pipeline.
///
pub trait Persistence: Send {
    fn save_track(&mut self, record: &TrackRecord) -> Result<()>;

    fn save_metric(&mut self, record: &MetricRecord) -> Result<()>;

    /// Average score per cell over records with a positive score, ordered by cell id
    fn load_cell_scores(&self) -> Result<Vec<(CellId, f32)>>;

    /// Number of records per cell, ordered by cell id
    fn load_cell_traffic(&self) -> Result<Vec<(CellId, u64)>>;

    /// First and last timestamp per track, ordered by track id
    fn load_track_durations(&self) -> Result<Vec<TrackDuration>>;

    fn load_metrics(&self, name: &str) -> Result<Vec<MetricRecord>>;

    /// Ids of the tracks with at least one record, ascending
    fn load_track_ids(&self) -> Result<Vec<TrackId>>;

    /// Trajectory of one track: its records ordered by step, then by timestamp
    fn load_track_points(&self, track_id: TrackId) -> Result<Vec<TrackRecord>>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn cell_scores<'a, I>(records: I) -> Vec<(CellId, f32)>
where
    I: IntoIterator<Item = &'a TrackRecord>,
{
    let mut acc = BTreeMap::<CellId, (f64, u64)>::new();
    for r in records.into_iter().filter(|r| r.score > 0.0) {
        let e = acc.entry(r.cell_id).or_default();
        e.0 += f64::from(r.score);
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(cell, (sum, n))| (cell, (sum / n as f64) as f32))
        .collect()
}

pub(crate) fn cell_traffic<'a, I>(records: I) -> Vec<(CellId, u64)>
where
    I: IntoIterator<Item = &'a TrackRecord>,
{
    let mut acc = BTreeMap::<CellId, u64>::new();
    for r in records {
        *acc.entry(r.cell_id).or_default() += 1;
    }
    acc.into_iter().collect()
}

pub(crate) fn track_durations<'a, I>(records: I) -> Vec<TrackDuration>
where
    I: IntoIterator<Item = &'a TrackRecord>,
{
    let mut acc = BTreeMap::<TrackId, (i64, i64)>::new();
    for r in records {
        let e = acc.entry(r.track_id).or_insert((r.timestamp, r.timestamp));
        e.0 = e.0.min(r.timestamp);
        e.1 = e.1.max(r.timestamp);
    }
    acc.into_iter()
        .map(|(track_id, (first, last))| TrackDuration {
            track_id,
            first,
            last,
        })
        .collect()
}

pub(crate) fn track_ids<'a, I>(records: I) -> Vec<TrackId>
where
    I: IntoIterator<Item = &'a TrackRecord>,
{
    records
        .into_iter()
        .map(|r| r.track_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn track_points<'a, I>(records: I, track_id: TrackId) -> Vec<TrackRecord>
where
    I: IntoIterator<Item = &'a TrackRecord>,
{
    let mut points = records
        .into_iter()
        .filter(|r| r.track_id == track_id)
        .cloned()
        .collect::<Vec<_>>();
    points.sort_by_key(|r| (r.step, r.timestamp));
    points
}

#[cfg(test)]
pub(crate) fn record(track_id: TrackId, cell_id: CellId, score: f32, timestamp: i64) -> TrackRecord {
    TrackRecord {
        track_id,
        position: (0.0, 0.0),
        direction: (0.0, 0.0),
        cell_id,
        step: 0,
        roi_id: 1,
        score,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::{
        cell_scores, cell_traffic, record, track_durations, track_ids, track_points,
        TrackDuration, TrackRecord,
    };

    #[test]
    fn analytics() {
        let records = vec![
            record(2, 5, 0.5, 100),
            record(1, 3, 0.9, 50),
            record(2, 5, 1.0, 300),
            record(1, 5, 0.0, 20),
        ];
        assert_eq!(cell_scores(&records), vec![(3, 0.9), (5, 0.75)]);
        assert_eq!(cell_traffic(&records), vec![(3, 1), (5, 3)]);
        let d = track_durations(&records);
        assert_eq!(
            d,
            vec![
                TrackDuration {
                    track_id: 1,
                    first: 20,
                    last: 50
                },
                TrackDuration {
                    track_id: 2,
                    first: 100,
                    last: 300
                }
            ]
        );
        assert_eq!(d[1].dwell().num_milliseconds(), 200);
    }

    #[test]
    fn trajectories() {
        let point = |track_id, cell_id, step, timestamp| TrackRecord {
            step,
            ..record(track_id, cell_id, 0.5, timestamp)
        };
        let records = vec![
            point(9, 4, 3, 300),
            point(2, 1, 1, 100),
            point(9, 5, 1, 100),
            point(9, 6, 2, 200),
            point(2, 2, 2, 200),
            // same step written twice, the timestamp decides
            point(9, 7, 3, 250),
        ];
        assert_eq!(track_ids(&records), vec![2, 9]);
        assert_eq!(
            track_points(&records, 9)
                .iter()
                .map(|r| r.cell_id)
                .collect::<Vec<_>>(),
            vec![5, 6, 7, 4]
        );
        assert_eq!(track_points(&records, 2).len(), 2);
        assert!(track_points(&records, 3).is_empty());
        assert!(track_ids(&[]).is_empty());
    }
}
