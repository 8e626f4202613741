//! Boot title glyphs
//!
//! 8x7 bitmaps, one byte per row, most significant bit leftmost.

use crate::bus::Retro24Bus;

pub type Glyph = [u8; 7];

pub const GLYPH_R: Glyph = [
    0b01111100, 0b01000010, 0b01000010, 0b01111100, 0b01001000, 0b01000100, 0b01000010,
];
pub const GLYPH_E: Glyph = [
    0b01111110, 0b01000000, 0b01000000, 0b01111100, 0b01000000, 0b01000000, 0b01111110,
];
pub const GLYPH_T: Glyph = [
    0b01111110, 0b00010000, 0b00010000, 0b00010000, 0b00010000, 0b00010000, 0b00010000,
];
pub const GLYPH_O: Glyph = [
    0b00111100, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b00111100,
];
pub const GLYPH_2: Glyph = [
    0b00111100, 0b01000010, 0b00000100, 0b00001000, 0b00010000, 0b00100000, 0b01111110,
];
pub const GLYPH_4: Glyph = [
    0b00001000, 0b00011000, 0b00101000, 0b01001000, 0b01111110, 0b00001000, 0b00001000,
];

/// Horizontal advance between glyphs
const GLYPH_ADVANCE: usize = 8;

const TITLE_LINES: [(&[Glyph], usize, usize); 2] = [
    (&[GLYPH_R, GLYPH_E, GLYPH_T, GLYPH_R, GLYPH_O], 12, 21),
    (&[GLYPH_2, GLYPH_4], 24, 31),
];

/// Draw a run of glyphs left to right starting at pixel (`column`, `row`)
pub fn write_text(bus: &mut Retro24Bus, glyphs: &[Glyph], column: usize, row: usize) {
    for (i, glyph) in glyphs.iter().enumerate() {
        bus.write_glyph_pattern(glyph, column + i * GLYPH_ADVANCE, row);
    }
}

/// Draw the "RETRO 24" boot title into the brightness plane
pub fn write_title(bus: &mut Retro24Bus) {
    for (glyphs, column, row) in TITLE_LINES {
        write_text(bus, glyphs, column, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_only_touches_brightness() {
        let mut bus = Retro24Bus::new();
        write_title(&mut bus);
        let lit = bus.brightness_plane().iter().filter(|&&b| b != 0).count();
        assert!(lit > 0);
        assert!(bus.color_plane().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_title_rows() {
        let mut bus = Retro24Bus::new();
        write_title(&mut bus);
        let plane = bus.brightness_plane();
        // top bar of the first R starts one pixel in
        assert_eq!(plane[21 * 64 + 12], 0);
        assert_eq!(plane[21 * 64 + 13], 1);
        // nothing above the title
        assert!(plane[..21 * 64].iter().all(|&b| b == 0));
        // nothing below "24"
        assert!(plane[38 * 64..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_text_advances() {
        let mut bus = Retro24Bus::new();
        write_text(&mut bus, &[GLYPH_T, GLYPH_T], 0, 0);
        let plane = bus.brightness_plane();
        // the stem of T sits at bit 3
        assert_eq!(plane[64 + 3], 1);
        assert_eq!(plane[64 + 11], 1);
    }
}
