//! Built-in 5x7 bitmap glyphs for effect labels.
//!
//! Each glyph is seven rows; bit 4 of a row is the leftmost column.
//! Lowercase letters render as uppercase; unsupported characters render
//! as blank cells.

pub const GLYPH_WIDTH: usize = 5;
pub const GLYPH_HEIGHT: usize = 7;
const GLYPH_SPACING: usize = 1;

const BLANK: [u8; 7] = [0; 7];

pub fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        _ => BLANK,
    }
}

/// Integer upscale factor that brings the 7-row glyph close to `font_px`.
pub fn scale_for(font_px: u32) -> usize {
    ((font_px as usize + GLYPH_HEIGHT / 2) / GLYPH_HEIGHT).max(1)
}

/// Pixel size of `text` rendered at `scale`, without trailing spacing.
pub fn text_extent(text: &str, scale: usize) -> (usize, usize) {
    let chars = text.chars().count();
    if chars == 0 {
        return (0, 0);
    }
    let advance = (GLYPH_WIDTH + GLYPH_SPACING) * scale;
    (chars * advance - GLYPH_SPACING * scale, GLYPH_HEIGHT * scale)
}

/// Calls `plot(x, y)` for every lit pixel of `text` rendered at `scale`,
/// relative to the text's top-left corner.
pub fn for_each_lit_pixel(text: &str, scale: usize, mut plot: impl FnMut(usize, usize)) {
    let advance = (GLYPH_WIDTH + GLYPH_SPACING) * scale;
    for (i, c) in text.chars().enumerate() {
        let rows = glyph(c);
        let origin_x = i * advance;
        for (gy, bits) in rows.iter().enumerate() {
            for gx in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - gx)) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        plot(origin_x + gx * scale + sx, gy * scale + sy);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_matches_uppercase() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('z'), glyph('Z'));
    }

    #[test]
    fn test_unknown_and_space_are_blank() {
        assert_eq!(glyph(' '), BLANK);
        assert_eq!(glyph('€'), BLANK);
    }

    #[test]
    fn test_every_glyph_fits_five_columns() {
        for c in ('A'..='Z').chain('0'..='9') {
            assert!(glyph(c).iter().all(|row| *row < 32), "{c} overflows");
            assert_ne!(glyph(c), BLANK, "{c} should be visible");
        }
    }

    #[test]
    fn test_extent() {
        assert_eq!(text_extent("", 1), (0, 0));
        assert_eq!(text_extent("A", 1), (5, 7));
        assert_eq!(text_extent("AB", 2), (22, 14));
    }

    #[test]
    fn test_scale_for_font_size() {
        assert_eq!(scale_for(0), 1);
        assert_eq!(scale_for(7), 1);
        assert_eq!(scale_for(14), 2);
        assert_eq!(scale_for(30), 4);
    }

    #[test]
    fn test_lit_pixels_stay_within_extent() {
        let (w, h) = text_extent("HI!", 3);
        let mut count = 0;
        for_each_lit_pixel("HI!", 3, |x, y| {
            assert!(x < w && y < h);
            count += 1;
        });
        assert!(count > 0);
    }
}
