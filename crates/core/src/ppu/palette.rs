//! Indexed palettes for bitplane video hardware.
//!
//! Bitplane displays store one bit of per-pixel information in each plane.
//! The bits of a pixel, taken across all planes, form an index into a small
//! palette of ARGB colors (0xAARRGGBB).

/// Palette that maps color indices to ARGB values.
pub trait IndexedPalette {
    /// ARGB color for a palette index.
    fn get_color(&self, index: usize) -> u32;

    fn set_color(&mut self, index: usize, color: u32);

    /// Number of colors in this palette.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Combine per-plane bits into a palette index.
///
/// The first plane is the most significant bit, so `[bright, color]`
/// yields `bright << 1 | color`.
pub fn plane_index(bits: &[bool]) -> usize {
    bits.iter()
        .fold(0, |index, &bit| (index << 1) | usize::from(bit))
}

/// RAM-backed palette storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamPalette {
    colors: Vec<u32>,
}

const OPAQUE_BLACK: u32 = 0xFF000000;

impl RamPalette {
    /// Palette of `size` entries, all opaque black.
    pub fn new(size: usize) -> Self {
        Self {
            colors: vec![OPAQUE_BLACK; size],
        }
    }

    pub fn from_colors(colors: Vec<u32>) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }
}

impl IndexedPalette for RamPalette {
    fn get_color(&self, index: usize) -> u32 {
        self.colors.get(index).copied().unwrap_or(OPAQUE_BLACK)
    }

    fn set_color(&mut self, index: usize, color: u32) {
        if let Some(slot) = self.colors.get_mut(index) {
            *slot = color;
        }
    }

    fn len(&self) -> usize {
        self.colors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_palette_is_black() {
        let palette = RamPalette::new(4);
        assert_eq!(palette.len(), 4);
        assert!(!palette.is_empty());
        assert!(palette.colors().iter().all(|&c| c == OPAQUE_BLACK));
    }

    #[test]
    fn test_set_and_get() {
        let mut palette = RamPalette::new(2);
        palette.set_color(1, 0xFFFFFF00);
        assert_eq!(palette.get_color(1), 0xFFFFFF00);
        assert_eq!(palette.get_color(0), OPAQUE_BLACK);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut palette = RamPalette::from_colors(vec![0xFFFFFFFF]);
        assert_eq!(palette.get_color(7), OPAQUE_BLACK);
        palette.set_color(7, 0xFF0000FF);
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn test_plane_index_msb_first() {
        assert_eq!(plane_index(&[false, false]), 0);
        assert_eq!(plane_index(&[false, true]), 1);
        assert_eq!(plane_index(&[true, false]), 2);
        assert_eq!(plane_index(&[true, true]), 3);
        assert_eq!(plane_index(&[]), 0);
    }
}
