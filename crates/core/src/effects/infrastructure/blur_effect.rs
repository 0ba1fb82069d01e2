use std::cell::RefCell;

use crate::effects::domain::raster_surface::RasterSurface;
use crate::effects::domain::region_effect::{AnonymizationMode, RegionEffect};
use crate::shared::region::PixelRect;

use super::gaussian;

const MIN_RADIUS: u32 = 2;

/// Gaussian blur confined to the region.
///
/// Radius is `max(2, intensity / 2)`; pixels outside the region are never
/// read or written, so the blur does not bleed into the background.
pub struct BlurEffect {
    radius: u32,
    kernel: Vec<f32>,
    temp: RefCell<Vec<f32>>,
}

impl BlurEffect {
    pub fn new(intensity: u32) -> Self {
        let radius = radius_for(intensity);
        Self {
            radius,
            kernel: gaussian::gaussian_kernel_1d(radius as usize),
            temp: RefCell::new(Vec::new()),
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }
}

pub fn radius_for(intensity: u32) -> u32 {
    (intensity / 2).max(MIN_RADIUS)
}

impl RegionEffect for BlurEffect {
    fn mode(&self) -> AnonymizationMode {
        AnonymizationMode::Blur
    }

    fn apply(&self, surface: &mut dyn RasterSurface, region: PixelRect) {
        let Some(rect) = region.clamp_to(surface.width(), surface.height()) else {
            return;
        };
        let channels = surface.channels();
        let mut block = surface.read_block(rect);
        let mut temp = self.temp.borrow_mut();
        gaussian::blur_block(&mut block, rect.w, rect.h, channels, &self.kernel, &mut temp);
        surface.write_block(rect, &block);
    }
}
