//! Multi-object tracking for camera pipelines.
//!
//! [`ByteTracker`] keeps object identities stable across frames using the
//! ByteTrack two-stage association: high-confidence detections are matched
//! first against every live track, then low-confidence detections rescue
//! tracks that are still unmatched. Motion is modelled with a
//! constant-velocity Kalman filter and association cost is `1 - IoU`.
//!
//! ```
//! use maixtrack::{ByteTracker, Detection, TrackerConfig};
//!
//! let mut tracker = ByteTracker::new(TrackerConfig::default())?;
//! let tracks = tracker.update(&[Detection::new(10.0, 10.0, 20.0, 20.0, 0, 0.9)])?;
//! assert_eq!(tracks[0].id, 1);
//! # Ok::<(), maixtrack::TrackerError>(())
//! ```

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::TrackerError;
pub use integration::{DetectionBuilder, DetectionSource, IntoDetections, PipelineError, TrackerPipeline};
pub use tracker::{ByteTracker, Detection, Rect, Solver, Track, TrackState, TrackerConfig};
