//! Seams for connecting an object detector to the tracker.
//!
//! The tracker itself only consumes [`Detection`](crate::Detection) lists.
//! This module provides the detector trait, a detection builder and a small
//! pipeline that runs detection and tracking for one frame.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use pipeline::{PipelineError, TrackerPipeline};
