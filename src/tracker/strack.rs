//! Single object track (STrack) owned by the tracker, and the read-only
//! [`Track`] snapshot handed back to callers each frame.

use std::collections::VecDeque;

use log::warn;

use crate::tracker::kalman_filter::{KalmanFilter, KalmanState};
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Snapshot of one track after an update.
///
/// Owned copy; later updates never change it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    /// Unique track id, starting at 1 and never reused
    pub id: u64,
    /// Filter estimate of the box for this frame (TLWH)
    pub rect: Rect,
    /// Score of the last associated detection
    pub score: f32,
    /// Class id of the last associated detection
    pub class_id: usize,
    pub state: TrackState,
    /// True when the track had no matching detection this frame
    pub lost: bool,
    /// Frame the track was created on
    pub start_frame_id: u32,
    /// Last frame the track was matched on
    pub frame_id: u32,
    /// Consecutive frames without a match
    pub lost_frames: u32,
    /// Matched detections, oldest first
    pub history: VecDeque<Detection>,
}

/// Single object track.
#[derive(Debug, Clone)]
pub struct STrack {
    pub(crate) track_id: u64,
    pub(crate) state: TrackState,
    pub(crate) score: f32,
    pub(crate) class_id: usize,
    pub(crate) frame_id: u32,
    pub(crate) start_frame: u32,
    pub(crate) lost_frames: u32,
    kalman: Option<KalmanState>,
    /// Last measured box (TLWH)
    tlwh: Rect,
    history: VecDeque<Detection>,
}

impl STrack {
    /// Create an inactive track from a detection.
    pub fn new(det: &Detection) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            score: det.score,
            class_id: det.class_id,
            frame_id: 0,
            start_frame: 0,
            lost_frames: 0,
            kalman: None,
            tlwh: det.bbox,
            history: VecDeque::new(),
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Current box: the filter estimate once initiated, otherwise the
    /// measured box. Degenerate estimates fall back to the last measurement.
    pub fn rect(&self) -> Rect {
        let Some(kalman) = &self.kalman else {
            return self.tlwh;
        };
        let [cx, cy, a, h] = kalman.xyah().map(|v| v as f32);
        let rect = Rect::from_xyah(cx, cy, a, h);
        if rect.is_finite() && a > 0.0 && h > 0.0 {
            rect.clamped()
        } else {
            self.tlwh
        }
    }

    /// Frames since this track was first seen, as used to break duplicate ties.
    pub(crate) fn age(&self) -> u32 {
        self.frame_id - self.start_frame
    }

    /// Start tracking: assign the id, initiate the filter, record history.
    pub fn activate(
        &mut self,
        kalman_filter: &KalmanFilter,
        track_id: u64,
        frame_id: u32,
        max_history: usize,
    ) {
        self.track_id = track_id;
        self.kalman = Some(kalman_filter.initiate(measurement(&self.tlwh)));
        self.lost_frames = 0;
        self.state = TrackState::Tracked;
        self.frame_id = frame_id;
        self.start_frame = frame_id;

        let first = Detection::from_rect(self.tlwh, self.class_id, self.score);
        self.push_history(first, max_history);
    }

    /// Associate a detection with this track. Lost tracks are re-activated
    /// under the same id.
    pub fn update(
        &mut self,
        det: &Detection,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
        max_history: usize,
    ) {
        let z = measurement(&det.bbox);
        match &mut self.kalman {
            Some(kalman) => {
                if !kalman_filter.update(kalman, z) {
                    warn!(
                        "track {}: singular innovation covariance, re-initiating filter",
                        self.track_id
                    );
                    *kalman = kalman_filter.initiate(z);
                }
            }
            None => self.kalman = Some(kalman_filter.initiate(z)),
        }

        self.state = TrackState::Tracked;
        self.lost_frames = 0;
        self.frame_id = frame_id;
        self.score = det.score;
        self.class_id = det.class_id;
        self.tlwh = det.bbox;
        self.push_history(*det, max_history);
    }

    /// Advance the filter one frame. Lost tracks stop growing in height.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let Some(kalman) = &mut self.kalman {
            if self.state != TrackState::Tracked {
                kalman.mean[7] = 0.0;
            }
            kalman_filter.predict(kalman);
        }
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }

    /// Record one more frame without a match.
    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
        self.lost_frames += 1;
    }

    fn push_history(&mut self, det: Detection, max_history: usize) {
        if max_history == 0 {
            return;
        }
        while self.history.len() >= max_history {
            self.history.pop_front();
        }
        self.history.push_back(det);
    }

    pub fn snapshot(&self) -> Track {
        Track {
            id: self.track_id,
            rect: self.rect(),
            score: self.score,
            class_id: self.class_id,
            state: self.state,
            lost: self.state == TrackState::Lost,
            start_frame_id: self.start_frame,
            frame_id: self.frame_id,
            lost_frames: self.lost_frames,
            history: self.history.clone(),
        }
    }
}

fn measurement(rect: &Rect) -> [f64; 4] {
    rect.to_xyah().map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn det(x: f32, y: f32) -> Detection {
        Detection::new(x, y, 20.0, 40.0, 3, 0.9)
    }

    #[test]
    fn test_activate() {
        let kf = KalmanFilter::default();
        let mut track = STrack::new(&det(10.0, 10.0));
        assert_eq!(track.state(), TrackState::New);

        track.activate(&kf, 7, 5, 4);
        let snap = track.snapshot();
        assert_eq!(snap.id, 7);
        assert_eq!(snap.state, TrackState::Tracked);
        assert!(!snap.lost);
        assert_eq!(snap.start_frame_id, 5);
        assert_eq!(snap.frame_id, 5);
        assert_eq!(snap.class_id, 3);
        assert_eq!(snap.history.len(), 1);
        assert_abs_diff_eq!(snap.rect.x, 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(snap.rect.width, 20.0, epsilon = 1e-4);
    }

    #[test]
    fn test_history_is_bounded() {
        let kf = KalmanFilter::default();
        let mut track = STrack::new(&det(0.0, 0.0));
        track.activate(&kf, 1, 1, 3);
        for frame in 2..=6 {
            track.predict(&kf);
            track.update(&det(frame as f32, 0.0), &kf, frame, 3);
        }
        let xs: Vec<f32> = track.snapshot().history.iter().map(|d| d.bbox.x).collect();
        assert_eq!(xs, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zero_history() {
        let kf = KalmanFilter::default();
        let mut track = STrack::new(&det(0.0, 0.0));
        track.activate(&kf, 1, 1, 0);
        track.predict(&kf);
        track.update(&det(1.0, 0.0), &kf, 2, 0);
        assert!(track.snapshot().history.is_empty());
    }

    #[test]
    fn test_lost_and_reactivated() {
        let kf = KalmanFilter::default();
        let mut track = STrack::new(&det(0.0, 0.0));
        track.activate(&kf, 1, 1, 10);

        track.predict(&kf);
        track.mark_lost();
        track.predict(&kf);
        track.mark_lost();
        let snap = track.snapshot();
        assert!(snap.lost);
        assert_eq!(snap.lost_frames, 2);
        assert_eq!(snap.frame_id, 1);

        track.predict(&kf);
        track.update(&det(1.0, 0.0), &kf, 4, 10);
        let snap = track.snapshot();
        assert_eq!(snap.id, 1);
        assert!(!snap.lost);
        assert_eq!(snap.lost_frames, 0);
        assert_eq!(snap.frame_id, 4);
        assert!(snap.frame_id >= snap.start_frame_id);
    }

    #[test]
    fn test_rect_stays_positive() {
        let kf = KalmanFilter::default();
        let mut track = STrack::new(&det(0.0, 0.0));
        track.activate(&kf, 1, 1, 10);
        // Shrink quickly, then coast while lost.
        for (frame, h) in (2..6).zip([30.0, 20.0, 10.0, 2.0]) {
            track.predict(&kf);
            track.update(&Detection::new(0.0, 0.0, h / 2.0, h, 0, 0.9), &kf, frame, 10);
        }
        for _ in 0..20 {
            track.predict(&kf);
            track.mark_lost();
            let rect = track.rect();
            assert!(rect.width > 0.0 && rect.height > 0.0);
            assert!(rect.is_finite());
        }
    }
}
