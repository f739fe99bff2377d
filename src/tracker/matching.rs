//! Matching utilities for multi-object tracking.

use std::fmt;

use ndarray::Array2;

use crate::error::TrackerError;
use crate::tracker::rect::Rect;

/// Detection input for the tracker: one object reported by the upstream
/// detector for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Detection {
    /// Bounding box in pixel coordinates
    pub bbox: Rect,
    /// Class id reported by the detector
    pub class_id: usize,
    /// Detection confidence score in [0, 1]
    pub score: f32,
}

/// Why a detection was rejected at the tracker boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDetection {
    /// A coordinate or the score is NaN or infinite.
    NonFinite,
    /// Width or height is zero or negative.
    NonPositiveSize,
    /// Score lies outside [0, 1].
    ScoreOutOfRange,
}

impl fmt::Display for InvalidDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite => write!(f, "non-finite coordinates or score"),
            Self::NonPositiveSize => write!(f, "non-positive width or height"),
            Self::ScoreOutOfRange => write!(f, "score outside [0, 1]"),
        }
    }
}

impl Detection {
    /// Create a detection from a TLWH box.
    pub fn new(x: f32, y: f32, w: f32, h: f32, class_id: usize, score: f32) -> Self {
        Self {
            bbox: Rect::new(x, y, w, h),
            class_id,
            score,
        }
    }

    /// Create a detection from a TLBR box.
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize, score: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), class_id, score)
    }

    pub fn from_rect(bbox: Rect, class_id: usize, score: f32) -> Self {
        Self {
            bbox,
            class_id,
            score,
        }
    }

    /// Check that the detection can safely enter the filter math.
    pub fn validate(&self) -> Result<(), InvalidDetection> {
        if !self.bbox.is_finite() || !self.score.is_finite() {
            return Err(InvalidDetection::NonFinite);
        }
        if self.bbox.width <= 0.0 || self.bbox.height <= 0.0 {
            return Err(InvalidDetection::NonPositiveSize);
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(InvalidDetection::ScoreOutOfRange);
        }
        Ok(())
    }
}

/// Compute the IoU distance matrix (`1 - IoU`) between tracks and detections.
///
/// Every cell lies in [0, 1]. The backing buffer is reserved fallibly so an
/// oversized frame surfaces as [`TrackerError::Allocation`].
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Result<Array2<f32>, TrackerError> {
    let (rows, cols) = (track_boxes.len(), det_boxes.len());
    let mut data = Vec::new();
    data.try_reserve_exact(rows * cols)?;
    for t in track_boxes {
        data.extend(det_boxes.iter().map(|d| 1.0 - t.iou(d)));
    }
    Ok(Array2::from_shape_vec((rows, cols), data)
        .unwrap_or_else(|_| unreachable!("buffer holds rows * cols costs")))
}

/// Weight IoU similarity by detection confidence: `1 - iou * score`.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, scores: &[f32]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        let iou_sim = 1.0 - *cost;
        *cost = 1.0 - iou_sim * scores[j];
    }
}

/// Outcome of a linear assignment over a cost matrix.
///
/// Indices refer to rows (tracks) and columns (detections) of the matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    /// Result for a matrix with no rows or no columns.
    pub fn all_unmatched(num_rows: usize, num_cols: usize) -> Self {
        Self {
            matches: Vec::new(),
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        }
    }

    /// Build a result from a row -> column assignment, keeping only pairs
    /// whose cost does not exceed `thresh`.
    pub(crate) fn from_row_assignment(
        cost_matrix: &Array2<f32>,
        row_to_col: impl IntoIterator<Item = (usize, Option<usize>)>,
        thresh: f32,
    ) -> Self {
        let (num_rows, num_cols) = cost_matrix.dim();
        let mut matches = Vec::new();
        let mut row_matched = vec![false; num_rows];
        let mut col_matched = vec![false; num_cols];

        for (row, col) in row_to_col {
            let Some(col) = col else { continue };
            if row >= num_rows || col >= num_cols || col_matched[col] {
                continue;
            }
            if cost_matrix[[row, col]] <= thresh {
                matches.push((row, col));
                row_matched[row] = true;
                col_matched[col] = true;
            }
        }
        matches.sort_unstable();

        Self {
            matches,
            unmatched_tracks: unset_indices(&row_matched),
            unmatched_detections: unset_indices(&col_matched),
        }
    }
}

fn unset_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &set)| (!set).then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_iou_distance() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(100.0, 100.0, 10.0, 10.0)];
        let dets = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(5.0, 5.0, 10.0, 10.0),
            Rect::new(500.0, 500.0, 10.0, 10.0),
        ];
        let dists = iou_distance(&tracks, &dets).unwrap();
        assert_eq!(dists.dim(), (2, 3));
        assert_abs_diff_eq!(dists[[0, 0]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(dists[[0, 1]], 1.0 - 25.0 / 175.0, epsilon = 1e-6);
        assert_eq!(dists[[0, 2]], 1.0);
        assert_eq!(dists[[1, 0]], 1.0);
        assert!(dists.iter().all(|&c| (0.0..=1.0).contains(&c)));
    }

    #[test]
    fn test_iou_distance_empty() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        assert_eq!(iou_distance(&tracks, &[]).unwrap().dim(), (1, 0));
        assert_eq!(iou_distance(&[], &tracks).unwrap().dim(), (0, 1));
    }

    #[test]
    fn test_iou_distance_degenerate_box_saturates() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        let dets = [Rect::new(0.0, 0.0, 0.0, 10.0)];
        assert_eq!(iou_distance(&tracks, &dets).unwrap()[[0, 0]], 1.0);
    }

    #[test]
    fn test_fuse_score() {
        let mut costs = array![[0.2_f32, 1.0], [0.5, 0.0]];
        fuse_score(&mut costs, &[0.5, 1.0]);
        assert_abs_diff_eq!(costs[[0, 0]], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(costs[[0, 1]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(costs[[1, 0]], 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(costs[[1, 1]], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_detection_validate() {
        assert!(Detection::new(10.0, 10.0, 20.0, 20.0, 0, 0.9).validate().is_ok());
        assert_eq!(
            Detection::new(10.0, 10.0, -1.0, 20.0, 0, 0.9).validate(),
            Err(InvalidDetection::NonPositiveSize)
        );
        assert_eq!(
            Detection::new(f32::NAN, 10.0, 20.0, 20.0, 0, 0.9).validate(),
            Err(InvalidDetection::NonFinite)
        );
        assert_eq!(
            Detection::new(10.0, 10.0, 20.0, 20.0, 0, f32::INFINITY).validate(),
            Err(InvalidDetection::NonFinite)
        );
        assert_eq!(
            Detection::new(10.0, 10.0, 20.0, 20.0, 0, 1.5).validate(),
            Err(InvalidDetection::ScoreOutOfRange)
        );
    }

    #[test]
    fn test_from_row_assignment_applies_threshold() {
        let costs = array![[0.1_f32, 0.9], [0.9, 0.7]];
        let result =
            AssignmentResult::from_row_assignment(&costs, [(0, Some(0)), (1, Some(1))], 0.5);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }
}
