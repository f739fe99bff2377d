/// Lifecycle state of a track held by the tracker.
///
/// Removed tracks are deleted from the tracker rather than flagged, so there
/// is no stored `Removed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackState {
    /// Created from a detection, filter not yet initiated
    #[default]
    New,
    /// Actively tracked object
    Tracked,
    /// Temporarily lost track
    Lost,
}
