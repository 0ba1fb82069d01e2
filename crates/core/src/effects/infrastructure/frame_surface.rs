use crate::effects::domain::raster_surface::{RasterSurface, Rgba};
use crate::shared::frame::Frame;
use crate::shared::region::ClampedRect;

use super::bitmap_font;

/// The frame buffer itself is the raster surface effects paint on.
impl RasterSurface for Frame {
    fn width(&self) -> u32 {
        Frame::width(self)
    }

    fn height(&self) -> u32 {
        Frame::height(self)
    }

    fn channels(&self) -> usize {
        Frame::channels(self) as usize
    }

    fn read_block(&self, rect: ClampedRect) -> Vec<u8> {
        let ch = Frame::channels(self) as usize;
        let mut block = vec![0u8; rect.w * rect.h * ch];
        let Some(visible) = visible_part(self, rect) else {
            return block;
        };
        let fw = Frame::width(self) as usize;
        let data = self.data();
        for row in visible.y..visible.bottom() {
            let src = (row * fw + visible.x) * ch;
            let dst = ((row - rect.y) * rect.w + (visible.x - rect.x)) * ch;
            let len = visible.w * ch;
            block[dst..dst + len].copy_from_slice(&data[src..src + len]);
        }
        block
    }

    fn write_block(&mut self, rect: ClampedRect, pixels: &[u8]) {
        let ch = Frame::channels(self) as usize;
        if pixels.len() < rect.w * rect.h * ch {
            log::warn!(
                "write_block: {} bytes supplied for a {}x{} block, ignoring",
                pixels.len(),
                rect.w,
                rect.h
            );
            return;
        }
        let Some(visible) = visible_part(self, rect) else {
            return;
        };
        let fw = Frame::width(self) as usize;
        let data = self.data_mut();
        for row in visible.y..visible.bottom() {
            let dst = (row * fw + visible.x) * ch;
            let src = ((row - rect.y) * rect.w + (visible.x - rect.x)) * ch;
            let len = visible.w * ch;
            data[dst..dst + len].copy_from_slice(&pixels[src..src + len]);
        }
    }

    fn fill_rect(&mut self, rect: ClampedRect, color: Rgba) {
        let Some(visible) = visible_part(self, rect) else {
            return;
        };
        let ch = Frame::channels(self) as usize;
        let fw = Frame::width(self) as usize;
        let data = self.data_mut();
        for row in visible.y..visible.bottom() {
            let start = (row * fw + visible.x) * ch;
            for px in data[start..start + visible.w * ch].chunks_exact_mut(ch) {
                color.blend_over(px);
            }
        }
    }

    fn draw_text(&mut self, text: &str, bounds: ClampedRect, font_px: u32, color: Rgba) {
        let Some(clip) = visible_part(self, bounds) else {
            return;
        };
        let scale = bitmap_font::scale_for(font_px);
        let (text_w, text_h) = bitmap_font::text_extent(text, scale);
        if text_w == 0 {
            return;
        }
        // Centered origin; may be negative when the text is wider than the bounds.
        let origin_x = bounds.x as i64 + (bounds.w as i64 - text_w as i64) / 2;
        let origin_y = bounds.y as i64 + (bounds.h as i64 - text_h as i64) / 2;

        let ch = Frame::channels(self) as usize;
        let fw = Frame::width(self) as usize;
        let data = self.data_mut();
        bitmap_font::for_each_lit_pixel(text, scale, |dx, dy| {
            let x = origin_x + dx as i64;
            let y = origin_y + dy as i64;
            if x < clip.x as i64
                || y < clip.y as i64
                || x >= clip.right() as i64
                || y >= clip.bottom() as i64
            {
                return;
            }
            let start = (y as usize * fw + x as usize) * ch;
            color.blend_over(&mut data[start..start + ch]);
        });
    }
}

fn visible_part(frame: &Frame, rect: ClampedRect) -> Option<ClampedRect> {
    rect.to_pixel_rect().clamp_to(frame.width(), frame.height())
}
