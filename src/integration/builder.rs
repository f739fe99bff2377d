//! Builder for creating Detection objects from various box layouts.

use crate::tracker::{Detection, Rect};

/// Builder for creating [`Detection`] objects from various box layouts.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    bbox: Rect,
    class_id: usize,
    score: f32,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(x, y, w, h);
        self
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(cx - w / 2.0, cy - h / 2.0, w, h);
        self
    }

    pub fn class_id(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn build(self) -> Detection {
        Detection::from_rect(self.bbox, self.class_id, self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .tlbr(10.0, 20.0, 50.0, 80.0)
            .class_id(2)
            .score(0.95)
            .build();

        assert_eq!(det.score, 0.95);
        assert_eq!(det.class_id, 2);
        assert_eq!(det.bbox.to_tlwh(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_box_layouts_agree() {
        let a = DetectionBuilder::new().tlwh(10.0, 20.0, 40.0, 60.0).build();
        let b = DetectionBuilder::new().xywh(30.0, 50.0, 40.0, 60.0).build();
        assert_eq!(a.bbox, b.bbox);
    }
}
