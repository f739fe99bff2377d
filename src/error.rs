//! Error types for tracker construction and per-frame updates.

use std::collections::TryReserveError;

/// Errors reported by the tracker.
///
/// Individual malformed detections are not errors; they are dropped at the
/// input boundary with a warning. Only invalid configuration and allocation
/// failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A configuration value is outside its allowed range.
    #[error("invalid tracker parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// `track_thresh` must not exceed `high_thresh`.
    #[error("track_thresh ({track_thresh}) must not exceed high_thresh ({high_thresh})")]
    ThresholdOrder { track_thresh: f32, high_thresh: f32 },

    /// Buffers for the track set or the cost matrix could not be reserved.
    #[error("failed to allocate tracker buffers: {0}")]
    Allocation(#[from] TryReserveError),
}

impl TrackerError {
    pub(crate) fn invalid(name: &'static str, value: impl Into<f64>, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into(),
            reason,
        }
    }
}
