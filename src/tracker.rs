//! ByteTrack tracker core: box geometry, motion model, association and
//! track lifecycle.

mod assignment;
mod byte_tracker;
mod kalman_filter;
mod matching;
mod rect;
mod strack;
mod track_state;

pub use assignment::{AssignmentSolver, Greedy, Hungarian, JonkerVolgenant, Solver};
pub use byte_tracker::{ByteTracker, TrackerConfig};
pub use kalman_filter::{KalmanFilter, KalmanState, STD_WEIGHT_POSITION, STD_WEIGHT_VELOCITY};
pub use matching::{AssignmentResult, Detection, InvalidDetection, fuse_score, iou_distance};
pub use rect::{Rect, iou_batch};
pub use strack::{STrack, Track};
pub use track_state::TrackState;
