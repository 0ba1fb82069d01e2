use crate::effects::domain::raster_surface::RasterSurface;
use crate::effects::domain::region_effect::{AnonymizationMode, RegionEffect};
use crate::shared::region::PixelRect;

const MIN_BLOCK_SIZE: u32 = 8;

/// Mosaic effect: square blocks of side `max(8, intensity)` laid from the
/// region's own top-left corner, so the grid stays put while a face slides
/// past the frame edge.
///
/// Each block takes the color of its top-left visible pixel rather than
/// the block average. Blocks cut by the frame or region edges are filled
/// too.
pub struct PixelateEffect {
    block_size: usize,
}

impl PixelateEffect {
    pub fn new(intensity: u32) -> Self {
        Self {
            block_size: block_size_for(intensity) as usize,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

pub fn block_size_for(intensity: u32) -> u32 {
    intensity.max(MIN_BLOCK_SIZE)
}

/// How far into its grid cell the visible edge `visible` falls, for a grid
/// starting at `origin`.
fn grid_phase(origin: i32, visible: usize, size: usize) -> usize {
    (visible as i64 - origin as i64).rem_euclid(size as i64) as usize
}

impl RegionEffect for PixelateEffect {
    fn mode(&self) -> AnonymizationMode {
        AnonymizationMode::Pixelate
    }

    fn apply(&self, surface: &mut dyn RasterSurface, region: PixelRect) {
        let Some(rect) = region.clamp_to(surface.width(), surface.height()) else {
            return;
        };
        let ch = surface.channels();
        if ch == 0 || ch > 4 {
            return;
        }
        let mut block = surface.read_block(rect);
        let stride = rect.w * ch;
        let size = self.block_size;
        let phase_x = grid_phase(region.x, rect.x, size);
        let phase_y = grid_phase(region.y, rect.y, size);

        let mut by = 0;
        while by < rect.h {
            let bh = (size - if by == 0 { phase_y } else { 0 }).min(rect.h - by);
            let mut bx = 0;
            while bx < rect.w {
                let bw = (size - if bx == 0 { phase_x } else { 0 }).min(rect.w - bx);
                let sample_at = by * stride + bx * ch;
                let mut sample = [0u8; 4];
                sample[..ch].copy_from_slice(&block[sample_at..sample_at + ch]);

                for y in by..by + bh {
                    let row = y * stride;
                    for x in bx..bx + bw {
                        let at = row + x * ch;
                        block[at..at + ch].copy_from_slice(&sample[..ch]);
                    }
                }
                bx += bw;
            }
            by += bh;
        }

        surface.write_block(rect, &block);
    }
}
