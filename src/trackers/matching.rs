use crate::utils::bbox::BoundingBox;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Result of the association step, indexes refer to the inputs of [greedy_match]
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// (detection, track) pairs, a detection may appear twice on a multi-match
    pub matches: Vec<(usize, usize)>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<usize>,
}

/// IoU of every detection (rows) against every track (columns). Non-finite values
/// are reported as `0.0`.
///
pub fn iou_matrix(detections: &[BoundingBox], tracks: &[BoundingBox]) -> Vec<Vec<f32>> {
    detections
        .par_iter()
        .map(|d| {
            tracks
                .iter()
                .map(|t| {
                    let iou = BoundingBox::iou(d, t);
                    if iou.is_finite() {
                        iou
                    } else {
                        0.0
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Greedy best-IoU association.
///
/// Pairs are visited in descending IoU order, ties are resolved by detection order and
/// then by track order. Pairs under `min_iou` are rejected. A track is matched at most
/// once; a detection that is already matched may additionally correct a free track only
/// if their IoU reaches `multi_match_min_iou`.
///
pub fn greedy_match(
    iou: &[Vec<f32>],
    tracks: usize,
    min_iou: f32,
    multi_match_min_iou: f32,
) -> Assignment {
    let mut candidates = iou
        .iter()
        .enumerate()
        .flat_map(|(d, row)| row.iter().enumerate().map(move |(t, v)| (d, t, *v)))
        .filter(|(_, _, v)| *v >= min_iou && *v > 0.0)
        .collect::<Vec<_>>();

    candidates.sort_by(|(ld, lt, lv), (rd, rt, rv)| {
        rv.partial_cmp(lv)
            .unwrap_or(Ordering::Equal)
            .then(ld.cmp(rd))
            .then(lt.cmp(rt))
    });

    let mut detection_matched = vec![false; iou.len()];
    let mut track_matched = vec![false; tracks];
    let mut matches = Vec::default();

    for (d, t, v) in candidates {
        if track_matched[t] {
            continue;
        }
        if detection_matched[d] && v < multi_match_min_iou {
            continue;
        }
        detection_matched[d] = true;
        track_matched[t] = true;
        matches.push((d, t));
    }

    Assignment {
        matches,
        unmatched_detections: detection_matched
            .iter()
            .enumerate()
            .filter(|(_, m)| !**m)
            .map(|(d, _)| d)
            .collect(),
        unmatched_tracks: track_matched
            .iter()
            .enumerate()
            .filter(|(_, m)| !**m)
            .map(|(t, _)| t)
            .collect(),
    }
}
