//! TrackerPipeline for combining detection with tracking.

use crate::error::TrackerError;
use crate::tracker::{ByteTracker, Track, TrackerConfig};

use super::DetectionSource;

/// Failure of one pipeline frame.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E> {
    #[error("detection failed: {0}")]
    Detect(E),
    #[error(transparent)]
    Track(#[from] TrackerError),
}

/// Bundles a [`DetectionSource`] with a [`ByteTracker`] so each camera
/// frame goes through detection and tracking in one call.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: ByteTracker,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    pub fn new(detector: D, config: TrackerConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            detector,
            tracker: ByteTracker::new(config)?,
        })
    }

    pub fn with_default_config(detector: D) -> Result<Self, TrackerError> {
        Self::new(detector, TrackerConfig::default())
    }

    /// Run detection on one frame and feed the result to the tracker.
    ///
    /// A detector error leaves the tracker untouched, so the caller may skip
    /// the frame and keep the previous tracks.
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Track>, PipelineError<D::Error>> {
        let detections = self
            .detector
            .detect(input, width, height)
            .map_err(PipelineError::Detect)?;
        Ok(self.tracker.update(&detections)?)
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tracker(&self) -> &ByteTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ByteTracker {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Detection;

    struct MockDetector {
        frames: Vec<Result<Vec<Detection>, &'static str>>,
    }

    impl DetectionSource for MockDetector {
        type Error = &'static str;

        fn detect(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Detection>, Self::Error> {
            self.frames.remove(0)
        }
    }

    #[test]
    fn test_tracker_pipeline() {
        let det = Detection::new(10.0, 20.0, 40.0, 60.0, 0, 0.9);
        let detector = MockDetector {
            frames: vec![Ok(vec![det]), Err("sensor timeout"), Ok(vec![det])],
        };

        let mut pipeline = TrackerPipeline::with_default_config(detector).unwrap();
        let tracks = pipeline.process_frame(&[], 640, 480).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, 1);

        let err = pipeline.process_frame(&[], 640, 480).unwrap_err();
        assert!(matches!(err, PipelineError::Detect("sensor timeout")));
        assert_eq!(pipeline.tracker().frame_id(), 1);

        let tracks = pipeline.process_frame(&[], 640, 480).unwrap();
        assert_eq!(tracks[0].id, 1);
        assert!(!tracks[0].lost);
    }
}
