//! Trait for the upstream object detector.

use crate::tracker::Detection;

/// Source of per-frame detections.
///
/// Implement this to connect any detection model to the tracker. Boxes must
/// be reported in the same pixel space for every frame; the tracker compares
/// them by IoU and has no notion of image size.
///
/// # Example
///
/// ```
/// use maixtrack::{Detection, DetectionSource};
///
/// struct FixedDetector(Vec<Detection>);
///
/// impl DetectionSource for FixedDetector {
///     type Error = std::convert::Infallible;
///
///     fn detect(&mut self, _input: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>, Self::Error> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on raw image data and return detections.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}

/// Conversion from a model-specific output into tracker detections.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

/// `(x, y, w, h, class_id, score)` tuples, the layout most detector
/// bindings hand out.
impl IntoDetections for Vec<(f32, f32, f32, f32, usize, f32)> {
    fn into_detections(self) -> Vec<Detection> {
        self.into_iter()
            .map(|(x, y, w, h, class_id, score)| Detection::new(x, y, w, h, class_id, score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_conversion() {
        let raw: Vec<(f32, f32, f32, f32, usize, f32)> = vec![(1.0, 2.0, 3.0, 4.0, 5, 0.5)];
        let dets = raw.into_detections();
        assert_eq!(dets, vec![Detection::new(1.0, 2.0, 3.0, 4.0, 5, 0.5)]);
    }
}
