use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use image::{ImageBuffer, Pixel, Rgb};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::effects::domain::raster_surface::{RasterSurface, Rgba};
use crate::shared::region::ClampedRect;

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read label font {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a TrueType or OpenType font", .path.display())]
    Invalid { path: PathBuf },
}

/// Typeface for black-box labels.
///
/// The built-in 5x7 bitmap glyphs need no font file and cover A-Z, 0-9
/// and basic punctuation. A font file loaded at runtime renders any
/// script it covers, anti-aliased.
#[derive(Clone, Default)]
pub enum LabelFont {
    #[default]
    Builtin,
    Outline(Arc<FontVec>),
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| FontError::Invalid {
            path: path.to_path_buf(),
        })?;
        log::debug!("Loaded label font {}", path.display());
        Ok(Self::Outline(Arc::new(font)))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, LabelFont::Builtin)
    }

    /// Draws `text` centered in `bounds` and clipped to it.
    pub fn draw(
        &self,
        surface: &mut dyn RasterSurface,
        text: &str,
        bounds: ClampedRect,
        font_px: u32,
        color: Rgba,
    ) {
        match self {
            LabelFont::Builtin => surface.draw_text(text, bounds, font_px, color),
            LabelFont::Outline(font) => {
                draw_outline_text(surface, font, text, bounds, font_px, color)
            }
        }
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelFont::Builtin => write!(f, "Builtin"),
            LabelFont::Outline(_) => write!(f, "Outline"),
        }
    }
}

/// Renders through `imageproc` on a copy of the block, so glyphs never
/// reach outside `bounds`.
fn draw_outline_text(
    surface: &mut dyn RasterSurface,
    font: &FontVec,
    text: &str,
    bounds: ClampedRect,
    font_px: u32,
    color: Rgba,
) {
    if bounds.w == 0 || bounds.h == 0 || text.is_empty() {
        return;
    }
    let scale = PxScale::from(font_px as f32);
    let (text_w, text_h) = text_size(scale, font, text);
    let x = (bounds.w as i64 - text_w as i64) / 2;
    let y = (bounds.h as i64 - text_h as i64) / 2;
    let (x, y) = (x as i32, y as i32);
    let (w, h) = (bounds.w as u32, bounds.h as u32);
    let block = surface.read_block(bounds);

    match surface.channels() {
        3 => {
            let Some(mut canvas) = ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, block) else {
                return;
            };
            let ink = Rgb([color.r, color.g, color.b]);
            draw_text_mut(&mut canvas, ink, x, y, scale, font, text);
            surface.write_block(bounds, canvas.as_raw());
        }
        4 => {
            let canvas = ImageBuffer::<image::Rgba<u8>, _>::from_raw(w, h, block);
            let Some(mut canvas) = canvas else {
                return;
            };
            let ink = image::Rgba([color.r, color.g, color.b, color.a]);
            draw_text_mut(&mut canvas, ink, x, y, scale, font, text);
            // glyph edges must not change the frame's own alpha
            let original = surface.read_block(bounds);
            for (px, before) in canvas.pixels_mut().zip(original.chunks_exact(4)) {
                px.channels_mut()[3] = before[3];
            }
            surface.write_block(bounds, canvas.as_raw());
        }
        _ => {}
    }
}
