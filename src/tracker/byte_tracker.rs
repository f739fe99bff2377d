//! Main ByteTrack algorithm implementation.

use log::{debug, trace, warn};

use crate::error::TrackerError;
use crate::tracker::assignment::{AssignmentSolver, Solver};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::strack::{STrack, Track};
use crate::tracker::track_state::TrackState;

/// Configuration for the ByteTracker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Frames a lost track survives before it is removed.
    pub max_lost_buff_num: u32,
    /// Detections scoring below this are ignored.
    pub track_thresh: f32,
    /// Detections scoring at least this are high-confidence and may start tracks.
    pub high_thresh: f32,
    /// Largest `1 - IoU` accepted when matching high-confidence detections.
    pub match_thresh: f32,
    /// Largest `1 - IoU` accepted when matching low-confidence detections.
    pub low_match_thresh: f32,
    /// Number of past boxes kept per track.
    pub max_history: usize,
    /// Scale IoU by detection score in the first association.
    pub fuse_score: bool,
    /// Tracked/lost pairs overlapping more than this are merged, keeping the older track.
    pub duplicate_iou_thresh: Option<f32>,
    pub solver: Solver,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_lost_buff_num: 60,
            track_thresh: 0.5,
            high_thresh: 0.6,
            match_thresh: 0.8,
            low_match_thresh: 0.5,
            max_history: 20,
            fuse_score: false,
            duplicate_iou_thresh: Some(0.85),
            solver: Solver::default(),
        }
    }
}

impl TrackerConfig {
    pub fn new(
        max_lost_buff_num: u32,
        track_thresh: f32,
        high_thresh: f32,
        match_thresh: f32,
        max_history: usize,
    ) -> Self {
        Self {
            max_lost_buff_num,
            track_thresh,
            high_thresh,
            match_thresh,
            max_history,
            ..Self::default()
        }
    }

    pub fn with_low_match_thresh(mut self, thresh: f32) -> Self {
        self.low_match_thresh = thresh;
        self
    }

    pub fn with_fuse_score(mut self, fuse: bool) -> Self {
        self.fuse_score = fuse;
        self
    }

    pub fn with_duplicate_iou_thresh(mut self, thresh: Option<f32>) -> Self {
        self.duplicate_iou_thresh = thresh;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// Reject out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.max_lost_buff_num == 0 {
            return Err(TrackerError::invalid(
                "max_lost_buff_num",
                self.max_lost_buff_num,
                "must be greater than zero",
            ));
        }

        let unit_thresholds = [
            ("track_thresh", self.track_thresh),
            ("high_thresh", self.high_thresh),
            ("match_thresh", self.match_thresh),
            ("low_match_thresh", self.low_match_thresh),
        ];
        let duplicate = self
            .duplicate_iou_thresh
            .map(|thresh| ("duplicate_iou_thresh", thresh));
        for (name, value) in unit_thresholds.into_iter().chain(duplicate) {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrackerError::invalid(name, value, "must be within [0, 1]"));
            }
        }

        if self.track_thresh > self.high_thresh {
            return Err(TrackerError::ThresholdOrder {
                track_thresh: self.track_thresh,
                high_thresh: self.high_thresh,
            });
        }
        Ok(())
    }
}

/// Multi-object tracker.
///
/// Owns every live track. Each call to [`ByteTracker::update`] consumes one
/// frame of detections and returns owned snapshots of all tracked and lost
/// tracks in ascending id order. Calls must be serialized by the caller.
pub struct ByteTracker<S = Solver> {
    /// Tracked and lost tracks, ascending by id.
    tracks: Vec<STrack>,
    frame_id: u32,
    next_id: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
    solver: S,
}

impl ByteTracker<Solver> {
    /// Build a tracker using the solver named in the config.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        let solver = config.solver;
        Self::with_solver(config, solver)
    }

    pub fn with_params(
        max_lost_buff_num: u32,
        track_thresh: f32,
        high_thresh: f32,
        match_thresh: f32,
        max_history: usize,
    ) -> Result<Self, TrackerError> {
        Self::new(TrackerConfig::new(
            max_lost_buff_num,
            track_thresh,
            high_thresh,
            match_thresh,
            max_history,
        ))
    }
}

impl<S: AssignmentSolver> ByteTracker<S> {
    /// Build a tracker with a custom assignment strategy; `config.solver` is ignored.
    pub fn with_solver(config: TrackerConfig, solver: S) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            tracks: Vec::new(),
            frame_id: 0,
            next_id: 1,
            config,
            kalman_filter: KalmanFilter::default(),
            solver,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames processed so far.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Snapshot of the current tracks without advancing a frame.
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.iter().map(STrack::snapshot).collect()
    }

    /// Drop every track and restart frame numbering. Ids keep increasing.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.frame_id = 0;
    }

    pub fn update(&mut self, detections: &[Detection]) -> Result<Vec<Track>, TrackerError> {
        self.frame_id += 1;
        let frame_id = self.frame_id;
        let max_history = self.config.max_history;

        // Step 1: Split detections into high-score and low-score
        let (detections_high, detections_low) = self.split_detections(detections)?;

        // Step 2: First association, tracked and lost tracks with high score detections
        STrack::multi_predict(&mut self.tracks, &self.kalman_filter);

        let pool_rects: Vec<Rect> = self.tracks.iter().map(STrack::rect).collect();
        let high_rects: Vec<Rect> = detections_high.iter().map(|d| d.bbox).collect();
        let mut dists = matching::iou_distance(&pool_rects, &high_rects)?;
        if self.config.fuse_score {
            let scores: Vec<f32> = detections_high.iter().map(|d| d.score).collect();
            matching::fuse_score(&mut dists, &scores);
        }

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = self.solver.solve(&dists, self.config.match_thresh);

        for &(itracked, idet) in &matches {
            self.associate(itracked, &detections_high[idet]);
        }

        // Step 3: Second association, remaining tracked tracks with low score detections
        let (r_tracked, mut unmatched_lost): (Vec<usize>, Vec<usize>) = unmatched_tracks
            .into_iter()
            .partition(|&i| self.tracks[i].state == TrackState::Tracked);

        let r_rects: Vec<Rect> = r_tracked.iter().map(|&i| self.tracks[i].rect()).collect();
        let low_rects: Vec<Rect> = detections_low.iter().map(|d| d.bbox).collect();
        let dists_second = matching::iou_distance(&r_rects, &low_rects)?;

        let AssignmentResult {
            matches: matches_second,
            unmatched_tracks: unmatched_second,
            ..
        } = self.solver.solve(&dists_second, self.config.low_match_thresh);

        for &(ir, idet) in &matches_second {
            self.associate(r_tracked[ir], &detections_low[idet]);
        }

        trace!(
            "frame {frame_id}: {} tracks, {} high / {} low detections, {} + {} matched",
            self.tracks.len(),
            detections_high.len(),
            detections_low.len(),
            matches.len(),
            matches_second.len(),
        );

        // Step 4: Age unmatched tracks, expire those lost for too long
        unmatched_lost.extend(unmatched_second.into_iter().map(|ir| r_tracked[ir]));
        let mut keep = vec![true; self.tracks.len()];
        for i in unmatched_lost {
            let track = &mut self.tracks[i];
            if track.lost_frames > self.config.max_lost_buff_num {
                debug!(
                    "track {} removed after {} lost frames",
                    track.track_id, track.lost_frames
                );
                keep[i] = false;
            } else {
                if track.state == TrackState::Tracked {
                    debug!("track {} lost at frame {frame_id}", track.track_id);
                }
                track.mark_lost();
            }
        }
        if let Some(thresh) = self.config.duplicate_iou_thresh {
            self.mark_duplicates(thresh, &mut keep);
        }
        let mut keep = keep.into_iter();
        self.tracks.retain(|_| keep.next().unwrap_or(true));

        // Step 5: Init new tracks from unmatched high score detections
        self.tracks.try_reserve(unmatched_detections.len())?;
        for idet in unmatched_detections {
            let mut track = STrack::new(&detections_high[idet]);
            track.activate(&self.kalman_filter, self.next_id, frame_id, max_history);
            debug!("track {} started at frame {frame_id}", self.next_id);
            self.next_id += 1;
            self.tracks.push(track);
        }

        // Step 6: Report tracked and lost tracks
        let mut output = Vec::new();
        output.try_reserve_exact(self.tracks.len())?;
        output.extend(self.tracks.iter().map(STrack::snapshot));
        Ok(output)
    }

    /// Validate and partition one frame of detections by score.
    fn split_detections(
        &self,
        detections: &[Detection],
    ) -> Result<(Vec<Detection>, Vec<Detection>), TrackerError> {
        let mut high = Vec::new();
        let mut low = Vec::new();
        high.try_reserve(detections.len())?;
        low.try_reserve(detections.len())?;

        for det in detections {
            if let Err(reason) = det.validate() {
                warn!("frame {}: discarding detection {det:?}: {reason}", self.frame_id);
                continue;
            }
            if det.score >= self.config.high_thresh {
                high.push(*det);
            } else if det.score >= self.config.track_thresh {
                low.push(*det);
            }
        }
        Ok((high, low))
    }

    fn associate(&mut self, index: usize, det: &Detection) {
        let track = &mut self.tracks[index];
        if track.state == TrackState::Lost {
            debug!(
                "track {} re-acquired at frame {} after {} lost frames",
                track.track_id, self.frame_id, track.lost_frames
            );
        }
        track.update(
            det,
            &self.kalman_filter,
            self.frame_id,
            self.config.max_history,
        );
    }

    /// Among surviving tracks, clear `keep` for the younger of any
    /// tracked/lost pair overlapping more than `thresh`.
    fn mark_duplicates(&self, thresh: f32, keep: &mut [bool]) {
        let (tracked, lost): (Vec<usize>, Vec<usize>) = (0..self.tracks.len())
            .filter(|&i| keep[i])
            .partition(|&i| self.tracks[i].state == TrackState::Tracked);
        if tracked.is_empty() || lost.is_empty() {
            return;
        }

        let tracked_rects: Vec<Rect> = tracked.iter().map(|&i| self.tracks[i].rect()).collect();
        let lost_rects: Vec<Rect> = lost.iter().map(|&i| self.tracks[i].rect()).collect();
        let ious = iou_batch(&tracked_rects, &lost_rects);

        for ((a, b), &iou) in ious.indexed_iter() {
            if iou <= thresh {
                continue;
            }
            let (ia, ib) = (tracked[a], lost[b]);
            let drop = if self.tracks[ia].age() > self.tracks[ib].age() {
                ib
            } else {
                ia
            };
            if keep[drop] {
                debug!(
                    "track {} dropped as duplicate of track {}",
                    self.tracks[drop].track_id,
                    self.tracks[if drop == ia { ib } else { ia }].track_id
                );
            }
            keep[drop] = false;
        }
    }
}
