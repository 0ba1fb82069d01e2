use crate::effects::domain::raster_surface::{RasterSurface, Rgba};
use crate::effects::domain::region_effect::{AnonymizationMode, RegionEffect};
use crate::shared::constants::DEFAULT_LABEL;
use crate::shared::region::PixelRect;

use super::label_font::LabelFont;

/// Near-opaque dark fill (alpha 230/255).
pub const BOX_FILL: Rgba = Rgba::new(0, 0, 0, 230);
const LABEL_COLOR: Rgba = Rgba::WHITE;
const MIN_FONT_PX: u32 = 6;
const FONT_DIVISOR: usize = 6;

/// Covers the region with a dark box and a centered text label.
pub struct BlackBoxEffect {
    label: String,
    font: LabelFont,
}

impl BlackBoxEffect {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            font: LabelFont::default(),
        }
    }

    pub fn with_font(mut self, font: LabelFont) -> Self {
        self.font = font;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for BlackBoxEffect {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL)
    }
}

/// Label size scales with the smaller side of the visible box.
pub fn font_px_for(width: usize, height: usize) -> u32 {
    ((width.min(height) / FONT_DIVISOR) as u32).max(MIN_FONT_PX)
}

impl RegionEffect for BlackBoxEffect {
    fn mode(&self) -> AnonymizationMode {
        AnonymizationMode::BlackBox
    }

    fn apply(&self, surface: &mut dyn RasterSurface, region: PixelRect) {
        let Some(rect) = region.clamp_to(surface.width(), surface.height()) else {
            return;
        };
        surface.fill_rect(rect, BOX_FILL);
        if !self.label.is_empty() {
            let font_px = font_px_for(rect.w, rect.h);
            self.font.draw(surface, &self.label, rect, font_px, LABEL_COLOR);
        }
    }
}
