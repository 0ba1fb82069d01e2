use crate::detection::domain::detected_face::BoundingBox;

/// Pixel-space rectangle that may extend past the surface it targets.
///
/// Produced by denormalizing a face's fractional box against a surface's
/// actual dimensions. Effects clamp it before touching pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// In-bounds, non-empty rectangle produced by [`PixelRect::clamp_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClampedRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scales a normalized box to a `surface_w` x `surface_h` pixel grid.
    ///
    /// Edges are rounded independently so adjacent boxes tile without gaps.
    pub fn from_normalized(bbox: &BoundingBox, surface_w: u32, surface_h: u32) -> Self {
        let sw = surface_w as f64;
        let sh = surface_h as f64;
        let x1 = (bbox.x * sw).round() as i32;
        let y1 = (bbox.y * sh).round() as i32;
        let x2 = ((bbox.x + bbox.width) * sw).round() as i32;
        let y2 = ((bbox.y + bbox.height) * sh).round() as i32;
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Intersects the rectangle with `[0, surface_w) x [0, surface_h)`.
    ///
    /// Returns `None` when nothing of the rectangle is visible.
    pub fn clamp_to(&self, surface_w: u32, surface_h: u32) -> Option<ClampedRect> {
        let x1 = (self.x as i64).max(0);
        let y1 = (self.y as i64).max(0);
        let x2 = (self.x as i64 + self.width as i64).min(surface_w as i64);
        let y2 = (self.y as i64 + self.height as i64).min(surface_h as i64);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(ClampedRect {
            x: x1 as usize,
            y: y1 as usize,
            w: (x2 - x1) as usize,
            h: (y2 - y1) as usize,
        })
    }
}

impl ClampedRect {
    pub fn right(&self) -> usize {
        self.x + self.w
    }

    pub fn bottom(&self) -> usize {
        self.y + self.h
    }

    pub fn to_pixel_rect(self) -> PixelRect {
        PixelRect::new(self.x as i32, self.y as i32, self.w as i32, self.h as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_from_normalized_scales_to_surface() {
        let bbox = BoundingBox::new(0.5, 0.5, 0.1, 0.1);
        let rect = PixelRect::from_normalized(&bbox, 200, 100);
        assert_eq!(rect, PixelRect::new(100, 50, 20, 10));
    }

    #[test]
    fn test_from_normalized_full_frame() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let rect = PixelRect::from_normalized(&bbox, 640, 480);
        assert_eq!(rect, PixelRect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_clamp_inside_is_identity() {
        let rect = PixelRect::new(10, 20, 30, 40);
        let clamped = rect.clamp_to(100, 100).unwrap();
        assert_eq!(
            clamped,
            ClampedRect {
                x: 10,
                y: 20,
                w: 30,
                h: 40
            }
        );
        assert_eq!(clamped.to_pixel_rect(), rect);
    }

    #[test]
    fn test_clamp_past_right_and_bottom_edges() {
        let rect = PixelRect::new(90, 95, 20, 15);
        let clamped = rect.clamp_to(100, 100).unwrap();
        assert_eq!(clamped.right(), 100);
        assert_eq!(clamped.bottom(), 100);
        assert_eq!((clamped.w, clamped.h), (10, 5));
    }

    #[test]
    fn test_clamp_negative_origin() {
        let rect = PixelRect::new(-10, -5, 30, 30);
        let clamped = rect.clamp_to(100, 100).unwrap();
        assert_eq!((clamped.x, clamped.y, clamped.w, clamped.h), (0, 0, 20, 25));
    }

    #[rstest]
    #[case::zero_width(PixelRect::new(10, 10, 0, 10))]
    #[case::zero_height(PixelRect::new(10, 10, 10, 0))]
    #[case::negative_size(PixelRect::new(10, 10, -5, 10))]
    #[case::fully_right(PixelRect::new(100, 10, 10, 10))]
    #[case::fully_above(PixelRect::new(10, -20, 10, 10))]
    fn test_clamp_invisible_is_none(#[case] rect: PixelRect) {
        assert!(rect.clamp_to(100, 100).is_none());
    }

    #[test]
    fn test_area_ignores_negative_dimensions() {
        assert_eq!(PixelRect::new(0, 0, -3, 4).area(), 0);
        assert_eq!(PixelRect::new(0, 0, 3, 4).area(), 12);
    }
}
