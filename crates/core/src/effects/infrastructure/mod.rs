pub mod black_box_effect;
pub mod blur_effect;
pub mod effect_factory;
mod bitmap_font;
mod frame_surface;
mod gaussian;
pub mod label_font;
pub mod pixelate_effect;
