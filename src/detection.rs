use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Contains left-top (x1,y1) and right-bottom (x2,y2) corners of bbox in pixels
///
/// Detector specific fields (confidence, class) are ignored on deserialization.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Detection {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Ltrb> {
        BBox::ltrb(self.x1, self.y1, self.x2, self.y2)
    }

    #[inline(always)]
    pub fn pixel_width(&self) -> f32 {
        self.bbox().width()
    }

    /// True for boxes that cannot be measured: `x2 <= x1` or non-finite corners
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        let w = self.pixel_width();

        !(w > 0.0 && w.is_finite())
    }

    #[inline]
    pub fn centroid(&self) -> na::Point2<f32> {
        self.bbox().center()
    }

    /// Overlap ratio of two boxes, 0 if either is degenerate
    pub fn iou(&self, other: &Detection) -> f32 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }

        self.bbox().iou(&other.bbox())
    }
}

impl From<[f32; 4]> for Detection {
    fn from(v: [f32; 4]) -> Self {
        Detection::new(v[0], v[1], v[2], v[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_and_centroid() {
        let det = Detection::new(100.0, 20.0, 150.0, 60.0);

        assert_eq!(det.pixel_width(), 50.0);
        assert_eq!(det.centroid(), na::Point2::new(125.0, 40.0));
        assert!(!det.is_degenerate());
    }

    #[test]
    fn zero_and_inverted_widths_are_degenerate() {
        assert!(Detection::new(10.0, 0.0, 10.0, 5.0).is_degenerate());
        assert!(Detection::new(12.0, 0.0, 10.0, 5.0).is_degenerate());
        assert!(Detection::new(f32::NAN, 0.0, 10.0, 5.0).is_degenerate());
    }

    #[test]
    fn iou_overlapping_disjoint_identical() {
        let a = Detection::new(0.0, 0.0, 20.0, 10.0);
        let b = Detection::new(10.0, 0.0, 30.0, 10.0);
        let far = Detection::new(100.0, 100.0, 120.0, 110.0);

        assert!((a.iou(&b) - 100.0 / 300.0).abs() < 1e-6);
        assert_eq!(a.iou(&far), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn iou_with_degenerate_box_is_zero() {
        let a = Detection::new(0.0, 0.0, 20.0, 10.0);
        let flat = Detection::new(10.0, 0.0, 10.0, 10.0);
        let inverted = Detection::new(15.0, 0.0, 5.0, 10.0);

        assert_eq!(a.iou(&flat), 0.0);
        assert_eq!(a.iou(&inverted), 0.0);
        assert_eq!(inverted.iou(&a), 0.0);
    }

    #[test]
    fn ignores_detector_fields() {
        let det: Detection =
            serde_json::from_str(r#"{"x1":1.0,"y1":2.0,"x2":3.0,"y2":4.0,"p":0.9,"c":3}"#)
                .unwrap();

        assert_eq!(det, Detection::new(1.0, 2.0, 3.0, 4.0));
    }
}
