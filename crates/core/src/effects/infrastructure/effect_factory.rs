use crate::effects::domain::raster_surface::RasterSurface;
use crate::effects::domain::region_effect::{AnonymizationMode, RegionEffect};
use crate::shared::config::{AnonymizerConfig, ConfigError};
use crate::shared::constants::DEFAULT_LABEL;
use crate::shared::region::PixelRect;

use super::black_box_effect::BlackBoxEffect;
use super::blur_effect::BlurEffect;
use super::label_font::LabelFont;
use super::pixelate_effect::PixelateEffect;

/// Creates the effect for `mode`. `label` is only used by the black box,
/// which draws it with the built-in font.
pub fn create_effect(
    mode: AnonymizationMode,
    intensity: u32,
    label: &str,
) -> Box<dyn RegionEffect> {
    build(mode, intensity, label, LabelFont::default())
}

/// Creates the configured effect, loading the label font file when the
/// black box needs one.
pub fn effect_for_config(config: &AnonymizerConfig) -> Result<Box<dyn RegionEffect>, ConfigError> {
    let font = match (&config.label_font, config.anonymization_mode) {
        (Some(path), AnonymizationMode::BlackBox) => LabelFont::load(path)?,
        _ => LabelFont::default(),
    };
    Ok(build(
        config.anonymization_mode,
        config.intensity,
        &config.label,
        font,
    ))
}

fn build(
    mode: AnonymizationMode,
    intensity: u32,
    label: &str,
    font: LabelFont,
) -> Box<dyn RegionEffect> {
    log::debug!("Creating {mode} effect (intensity={intensity}, font={font:?})");
    match mode {
        AnonymizationMode::Blur => Box::new(BlurEffect::new(intensity)),
        AnonymizationMode::Pixelate => Box::new(PixelateEffect::new(intensity)),
        AnonymizationMode::BlackBox => Box::new(BlackBoxEffect::new(label).with_font(font)),
    }
}

/// One-shot convenience: builds the effect and paints `region`.
///
/// Callers processing many regions per frame should hold on to the result of
/// [`create_effect`] instead, which reuses the blur kernel.
pub fn apply_effect(
    surface: &mut dyn RasterSurface,
    region: PixelRect,
    mode: AnonymizationMode,
    intensity: u32,
) {
    create_effect(mode, intensity, DEFAULT_LABEL).apply(surface, region);
}
