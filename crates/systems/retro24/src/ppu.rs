//! Retro-24 rasterizer
//!
//! The screen is 64x64 pixels. Pixel `i = y * 64 + x` takes one bit from the
//! brightness plane ($E000 + i) and one from the color plane ($F000 + i); a
//! plane byte counts as set when it is non-zero. The two bits select one of
//! four fixed colors.

use crate::bus::Retro24Bus;
use retro24_core::ppu::{plane_index, IndexedPalette, RamPalette};
use retro24_core::types::Frame;

pub const SCREEN_WIDTH: u32 = 64;
pub const SCREEN_HEIGHT: u32 = 64;
pub const PIXEL_COUNT: usize = (SCREEN_WIDTH * SCREEN_HEIGHT) as usize;

/// The four displayable colors, in palette index order (`bright << 1 | color`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelColor {
    Black,
    Blue,
    White,
    Yellow,
}

impl PixelColor {
    pub fn from_planes(bright: bool, color: bool) -> Self {
        match (bright, color) {
            (true, true) => PixelColor::Yellow,
            (true, false) => PixelColor::White,
            (false, true) => PixelColor::Blue,
            (false, false) => PixelColor::Black,
        }
    }

    /// Default ARGB value
    pub fn argb(self) -> u32 {
        match self {
            PixelColor::Black => 0xFF000000,
            PixelColor::Blue => 0xFF0000FF,
            PixelColor::White => 0xFFFFFFFF,
            PixelColor::Yellow => 0xFFFFFF00,
        }
    }

    /// Single-character stand-in for text previews
    pub fn symbol(self) -> char {
        match self {
            PixelColor::Black => ' ',
            PixelColor::Blue => '+',
            PixelColor::White => '#',
            PixelColor::Yellow => '@',
        }
    }
}

/// Bitplane rasterizer
#[derive(Debug, Clone)]
pub struct Ppu {
    palette: RamPalette,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        let colors = [
            PixelColor::Black,
            PixelColor::Blue,
            PixelColor::White,
            PixelColor::Yellow,
        ];
        Self {
            palette: RamPalette::from_colors(colors.iter().map(|c| c.argb()).collect()),
        }
    }

    /// Replace the ARGB value shown for one of the four colors
    pub fn set_color(&mut self, which: PixelColor, argb: u32) {
        let index = match which {
            PixelColor::Black => 0,
            PixelColor::Blue => 1,
            PixelColor::White => 2,
            PixelColor::Yellow => 3,
        };
        self.palette.set_color(index, argb);
    }

    /// True when a program has requested a redraw through the draw flag
    pub fn should_redraw(&self, bus: &Retro24Bus) -> bool {
        bus.redraw_requested()
    }

    /// Classify pixel `index` (0..4096)
    pub fn pixel_color(&self, bus: &Retro24Bus, index: usize) -> PixelColor {
        let bright = bus.brightness_plane()[index] != 0;
        let color = bus.color_plane()[index] != 0;
        PixelColor::from_planes(bright, color)
    }

    /// Rasterize both planes into a fresh frame. Leaves the draw flag alone.
    pub fn render(&self, bus: &Retro24Bus) -> Frame {
        let mut frame = Frame::new(SCREEN_WIDTH, SCREEN_HEIGHT);
        self.render_into(bus, &mut frame);
        frame
    }

    /// Rasterize into an existing 64x64 frame
    pub fn render_into(&self, bus: &Retro24Bus, frame: &mut Frame) {
        let planes = bus.brightness_plane().iter().zip(bus.color_plane());
        for (pixel, (&bright, &color)) in frame.pixels.iter_mut().zip(planes) {
            *pixel = self
                .palette
                .get_color(plane_index(&[bright != 0, color != 0]));
        }
    }

    /// Text rendering of the screen, one character per pixel and one line per row
    pub fn render_text(&self, bus: &Retro24Bus) -> String {
        let width = SCREEN_WIDTH as usize;
        let mut out = String::with_capacity(PIXEL_COUNT + SCREEN_HEIGHT as usize);
        for y in 0..SCREEN_HEIGHT as usize {
            for x in 0..width {
                out.push(self.pixel_color(bus, y * width + x).symbol());
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BRIGHTNESS_START, COLOR_START, DRAW_FLAG_ADDR};
    use retro24_core::cpu_retro24::MemoryRetro24;

    fn set_pixel(bus: &mut Retro24Bus, index: u16, bright: bool, color: bool) {
        bus.write(BRIGHTNESS_START + index, bright as u8);
        bus.write(COLOR_START + index, color as u8);
    }

    #[test]
    fn test_truth_table_at_both_ends() {
        let ppu = Ppu::new();
        let cases = [
            (true, true, 0xFFFFFF00),
            (true, false, 0xFFFFFFFF),
            (false, true, 0xFF0000FF),
            (false, false, 0xFF000000),
        ];
        for index in [0u16, 4095] {
            for (bright, color, expected) in cases {
                let mut bus = Retro24Bus::new();
                set_pixel(&mut bus, index, bright, color);
                let frame = ppu.render(&bus);
                assert_eq!(
                    frame.pixels[index as usize], expected,
                    "pixel {} bright={} color={}",
                    index, bright, color
                );
                assert_eq!(
                    ppu.pixel_color(&bus, index as usize),
                    PixelColor::from_planes(bright, color)
                );
            }
        }
    }

    #[test]
    fn test_any_nonzero_byte_counts_as_set() {
        let ppu = Ppu::new();
        let mut bus = Retro24Bus::new();
        bus.write(BRIGHTNESS_START + 5, 0x80);
        bus.write(COLOR_START + 5, 0xFF);
        assert_eq!(ppu.pixel_color(&bus, 5), PixelColor::Yellow);
    }

    #[test]
    fn test_frame_geometry_and_layout() {
        let ppu = Ppu::new();
        let mut bus = Retro24Bus::new();
        // x = 3, y = 2
        set_pixel(&mut bus, 2 * 64 + 3, true, false);
        let frame = ppu.render(&bus);
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 64);
        assert_eq!(frame.pixels.len(), PIXEL_COUNT);
        assert_eq!(frame.pixel(3, 2), Some(0xFFFFFFFF));
        assert_eq!(frame.pixel(2, 3), Some(0xFF000000));
    }

    #[test]
    fn test_render_does_not_clear_draw_flag() {
        let ppu = Ppu::new();
        let mut bus = Retro24Bus::new();
        bus.write(DRAW_FLAG_ADDR, 1);
        assert!(ppu.should_redraw(&bus));
        let _ = ppu.render(&bus);
        assert!(ppu.should_redraw(&bus));
    }

    #[test]
    fn test_custom_color() {
        let mut ppu = Ppu::new();
        ppu.set_color(PixelColor::Black, 0xFF202020);
        let frame = ppu.render(&Retro24Bus::new());
        assert!(frame.pixels.iter().all(|&p| p == 0xFF202020));
    }

    #[test]
    fn test_render_text() {
        let ppu = Ppu::new();
        let mut bus = Retro24Bus::new();
        set_pixel(&mut bus, 0, true, true);
        set_pixel(&mut bus, 64, false, true);
        let text = ppu.render_text(&bus);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 64);
        assert!(lines[0].starts_with('@'));
        assert!(lines[1].starts_with('+'));
        assert_eq!(lines[0].chars().count(), 64);
    }
}
