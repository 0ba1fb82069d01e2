use crate::shared::region::ClampedRect;

/// 8-bit color with straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Blends this color over `dst` (first three channels only).
    pub fn blend_over(&self, dst: &mut [u8]) {
        let a = self.a as u32;
        let inv = 255 - a;
        for (d, s) in dst.iter_mut().zip([self.r, self.g, self.b]) {
            *d = ((*d as u32 * inv + s as u32 * a + 127) / 255) as u8;
        }
    }
}

/// Minimal raster primitives the effect engine needs.
///
/// Blocks are tightly packed rows of `rect.w * channels()` bytes.
/// Implementations must tolerate rectangles that reach past their bounds
/// by ignoring the out-of-range part.
pub trait RasterSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn channels(&self) -> usize;

    fn read_block(&self, rect: ClampedRect) -> Vec<u8>;

    fn write_block(&mut self, rect: ClampedRect, pixels: &[u8]);

    /// Alpha-blends `color` over every pixel of `rect`.
    fn fill_rect(&mut self, rect: ClampedRect, color: Rgba);

    /// Draws `text` centered in `bounds`, clipped to `bounds`.
    fn draw_text(&mut self, text: &str, bounds: ClampedRect, font_px: u32, color: Rgba);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_blend_replaces() {
        let mut px = [10u8, 20, 30];
        Rgba::new(200, 100, 50, 255).blend_over(&mut px);
        assert_eq!(px, [200, 100, 50]);
    }

    #[test]
    fn test_transparent_blend_keeps() {
        let mut px = [10u8, 20, 30];
        Rgba::new(200, 100, 50, 0).blend_over(&mut px);
        assert_eq!(px, [10, 20, 30]);
    }

    #[test]
    fn test_near_opaque_black_darkens() {
        let mut px = [255u8, 255, 255, 255];
        Rgba::new(0, 0, 0, 230).blend_over(&mut px);
        assert_eq!(&px[..3], &[25, 25, 25]);
        // alpha channel of the destination is left alone
        assert_eq!(px[3], 255);
    }
}
