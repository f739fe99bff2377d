/// Axis-aligned bounding box in pixel coordinates.
///
/// Stored as TLWH (top-left x, top-left y, width, height). Conversions are
/// provided for the two other layouts the tracker deals with:
/// - TLBR: top-left x, top-left y, bottom-right x, bottom-right y
/// - XYAH: center x, center y, aspect ratio (w/h), height, the Kalman
///   measurement space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

/// Smallest side length a box derived from filter state may have.
pub(crate) const MIN_SIDE: f32 = 1e-3;

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Create a Rect from XYAH format (center x, center y, aspect ratio, height).
    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Convert to XYAH format: (center_x, center_y, aspect_ratio, height).
    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx, cy, aspect_ratio, self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Area of the box; boxes with a non-positive side have zero area.
    #[inline]
    pub fn area(&self) -> f32 {
        if self.width <= 0.0 || self.height <= 0.0 {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// True when every coordinate is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// True when the box is finite with strictly positive width and height.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Copy of this box with width and height raised to at least [`MIN_SIDE`].
    pub(crate) fn clamped(&self) -> Self {
        Self::new(
            self.x,
            self.y,
            self.width.max(MIN_SIDE),
            self.height.max(MIN_SIDE),
        )
    }

    /// Intersection over Union with another box.
    ///
    /// Returns 0 for disjoint boxes and whenever either box has zero area.
    pub fn iou(&self, other: &Rect) -> f32 {
        let area_a = self.area();
        let area_b = other.area();
        if area_a <= 0.0 || area_b <= 0.0 {
            return 0.0;
        }

        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = area_a + area_b - inter_area;

        if union_area > 0.0 {
            (inter_area / union_area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

use ndarray::Array2;

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((boxes_a.len(), boxes_b.len()), |(i, j)| {
        boxes_a[i].iou(&boxes_b[j])
    })
}
