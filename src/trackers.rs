/// Tracker options and their builder
pub mod options;

/// Greedy IoU association of detections with tracks
pub mod matching;

/// Multi-object tracker: association, track lifecycle, population delta
pub mod mot;
