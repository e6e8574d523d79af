//! Matching utilities for multi-object tracking.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::tracker::lap::lapjv;
use crate::tracker::rect::{Rect, tlbr_iou};
use crate::tracker::strack::STrack;

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box, stored in TLWH format
    pub bbox: Rect,
    /// Class or identity tag, carried unchanged onto the track
    pub label: i32,
    /// Detection confidence score
    pub score: f32,
}

impl Detection {
    /// Detection from the inference output convention: box center, width
    /// and height.
    pub fn new(cx: f32, cy: f32, w: f32, h: f32, label: i32, score: f32) -> Self {
        Self::from_rect(Rect::from_xywh(cx, cy, w, h), label, score)
    }

    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32, label: i32, score: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), label, score)
    }

    pub fn from_rect(bbox: Rect, label: i32, score: f32) -> Self {
        Self { bbox, label, score }
    }
}

/// IoU matrix between two sets of `[x1, y1, x2, y2]` boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `atlbrs`
/// and N is the length of `btlbrs`.
pub fn ious(atlbrs: &[[f32; 4]], btlbrs: &[[f32; 4]]) -> Array2<f32> {
    Array2::from_shape_fn((atlbrs.len(), btlbrs.len()), |(i, j)| {
        tlbr_iou(&atlbrs[i], &btlbrs[j])
    })
}

/// IoU distance (`1 - IoU`) between the current boxes of two track sets.
///
/// When either side is empty the result has a zero dimension but keeps
/// the other one, so callers can still enumerate unmatched indices.
pub fn iou_distance(atracks: &[STrack], btracks: &[STrack]) -> Array2<f32> {
    let atlbrs: Vec<[f32; 4]> = atracks.iter().map(STrack::tlbr).collect();
    let btlbrs: Vec<[f32; 4]> = btracks.iter().map(STrack::tlbr).collect();
    ious(&atlbrs, &btlbrs).mapv_into(|iou| 1.0 - iou)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    /// Result with nothing matched.
    pub fn unmatched(num_rows: usize, num_cols: usize) -> Self {
        Self {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        }
    }
}

/// Optimal assignment under a cost threshold.
///
/// Rows are tracks and columns detections; pairs costing more than
/// `thresh` are never matched.
pub fn linear_assignment(
    cost_matrix: &Array2<f32>,
    thresh: f32,
) -> Result<AssignmentResult, TrackerError> {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult::unmatched(num_rows, num_cols));
    }

    let solution = lapjv(cost_matrix, true, Some(f64::from(thresh)))?;

    let mut result = AssignmentResult::default();
    for (row, &col) in solution.rowsol.iter().enumerate() {
        if col >= 0 {
            result.matches.push((row, col as usize));
        } else {
            result.unmatched_tracks.push(row);
        }
    }
    result.unmatched_detections = solution
        .colsol
        .iter()
        .enumerate()
        .filter_map(|(col, &row)| (row < 0).then_some(col))
        .collect();

    Ok(result)
}

/// Fold detection confidence into an IoU cost: `1 - (1 - cost) * score`.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[STrack]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        let iou_sim = 1.0 - *cost;
        *cost = 1.0 - iou_sim * detections[j].score;
    }
}
