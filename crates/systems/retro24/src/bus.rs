//! Retro-24 memory bus implementation
//!
//! The full 16-bit address space is backed by three regions:
//! $0000-$00FF: IO page (watchdogs, draw flag, keyboard)
//! $0100-$DFFF: RAM, filled with $FF when unprogrammed
//! $E000-$EFFF: Video brightness plane (one byte per pixel)
//! $F000-$FFFF: Video color plane (one byte per pixel)

use retro24_core::cpu_retro24::MemoryRetro24;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const IO_START: u16 = 0x0000;
pub const RAM_START: u16 = 0x0100;
pub const BRIGHTNESS_START: u16 = 0xE000;
pub const COLOR_START: u16 = 0xF000;

pub const IO_SIZE: usize = 0x0100;
pub const RAM_SIZE: usize = 0xDF00;
pub const PLANE_SIZE: usize = 0x1000;
pub const VIDEO_SIZE: usize = 2 * PLANE_SIZE;

/// Size of the whole address space
pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

/// Fill value marking unprogrammed RAM
pub const RAM_FILL: u8 = 0xFF;

/// IO byte requesting a redraw when non-zero
pub const DRAW_FLAG_ADDR: u16 = 0x000A;

/// Width in pixels of one row of either video plane
const PLANE_WIDTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("invalid address ${0:X}")]
    InvalidAddress(usize),
}

/// Backing region an address routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Io,
    Ram,
    Brightness,
    Color,
}

impl Region {
    /// Route an address to its region and the offset inside it
    pub fn locate(addr: u16) -> (Region, usize) {
        match addr {
            0x0000..=0x00FF => (Region::Io, addr as usize),
            0x0100..=0xDFFF => (Region::Ram, (addr - RAM_START) as usize),
            0xE000..=0xEFFF => (Region::Brightness, (addr - BRIGHTNESS_START) as usize),
            0xF000..=0xFFFF => (Region::Color, (addr - COLOR_START) as usize),
        }
    }

    pub fn start(self) -> u16 {
        match self {
            Region::Io => IO_START,
            Region::Ram => RAM_START,
            Region::Brightness => BRIGHTNESS_START,
            Region::Color => COLOR_START,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Region::Io => IO_SIZE,
            Region::Ram => RAM_SIZE,
            Region::Brightness | Region::Color => PLANE_SIZE,
        }
    }

    pub fn from_name(name: &str) -> Option<Region> {
        match name.to_lowercase().as_str() {
            "io" => Some(Region::Io),
            "ram" | "program" => Some(Region::Ram),
            "brightness" | "bright" => Some(Region::Brightness),
            "color" | "colour" => Some(Region::Color),
            _ => None,
        }
    }
}

/// Retro-24 address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retro24Bus {
    io: Vec<u8>,
    ram: Vec<u8>,
    /// Brightness plane followed by the color plane
    video: Vec<u8>,
}

impl Default for Retro24Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Retro24Bus {
    /// Create a bus with every region at its default fill
    pub fn new() -> Self {
        Self {
            io: vec![0x00; IO_SIZE],
            ram: vec![RAM_FILL; RAM_SIZE],
            video: vec![0x00; VIDEO_SIZE],
        }
    }

    /// True when every region has the size the address map requires.
    /// Deserialized buses must pass this before use.
    pub fn is_well_formed(&self) -> bool {
        self.io.len() == IO_SIZE && self.ram.len() == RAM_SIZE && self.video.len() == VIDEO_SIZE
    }

    /// Read through an address that may not fit in 16 bits
    pub fn try_read(&self, addr: usize) -> Result<u8, BusError> {
        let addr = u16::try_from(addr).map_err(|_| BusError::InvalidAddress(addr))?;
        Ok(self.read(addr))
    }

    /// Write through an address that may not fit in 16 bits
    pub fn try_write(&mut self, addr: usize, val: u8) -> Result<(), BusError> {
        let addr = u16::try_from(addr).map_err(|_| BusError::InvalidAddress(addr))?;
        self.write(addr, val);
        Ok(())
    }

    /// Check that `len` bytes starting at `start` stay inside the address space
    pub fn check_span(&self, start: u16, len: usize) -> Result<(), BusError> {
        let end = start as usize + len;
        if end > ADDRESS_SPACE_SIZE {
            return Err(BusError::InvalidAddress(end - 1));
        }
        Ok(())
    }

    /// Copy `data` verbatim into consecutive addresses from `start`.
    /// Nothing is written unless the whole span fits.
    pub fn load_image(&mut self, start: u16, data: &[u8]) -> Result<(), BusError> {
        self.check_span(start, data.len())?;
        for (offset, &byte) in data.iter().enumerate() {
            self.try_write(start as usize + offset, byte)?;
        }
        Ok(())
    }

    /// Backing storage of one region
    pub fn region(&self, region: Region) -> &[u8] {
        match region {
            Region::Io => &self.io,
            Region::Ram => &self.ram,
            Region::Brightness => &self.video[..PLANE_SIZE],
            Region::Color => &self.video[PLANE_SIZE..],
        }
    }

    pub fn brightness_plane(&self) -> &[u8] {
        self.region(Region::Brightness)
    }

    pub fn color_plane(&self) -> &[u8] {
        self.region(Region::Color)
    }

    pub fn clear_video(&mut self) {
        self.video.fill(0x00);
    }

    /// Reset RAM to the unprogrammed sentinel
    pub fn clear_ram(&mut self) {
        self.ram.fill(RAM_FILL);
    }

    pub fn clear_io(&mut self) {
        self.io.fill(0x00);
    }

    pub fn clear_all(&mut self) {
        self.clear_video();
        self.clear_ram();
        self.clear_io();
    }

    pub fn redraw_requested(&self) -> bool {
        self.read(DRAW_FLAG_ADDR) != 0
    }

    pub fn clear_redraw(&mut self) {
        self.write(DRAW_FLAG_ADDR, 0x00);
    }

    /// Draw a bitmap into the brightness plane with its top-left corner at
    /// pixel (`column`, `row`).
    ///
    /// Each pattern byte is one row, most significant bit leftmost. Set bits
    /// light their pixel; clear bits leave the plane untouched. Pixels
    /// falling outside the 64x64 screen are dropped.
    pub fn write_glyph_pattern(&mut self, pattern: &[u8], column: usize, row: usize) {
        for (dy, bits) in pattern.iter().enumerate() {
            let y = row + dy;
            if y >= PLANE_WIDTH {
                break;
            }
            for dx in 0..8 {
                let x = column + dx;
                if x >= PLANE_WIDTH {
                    break;
                }
                if bits & (0x80 >> dx) != 0 {
                    self.video[y * PLANE_WIDTH + x] = 0x01;
                }
            }
        }
    }
}

impl MemoryRetro24 for Retro24Bus {
    #[inline]
    fn read(&self, addr: u16) -> u8 {
        match Region::locate(addr) {
            (Region::Io, offset) => self.io[offset],
            (Region::Ram, offset) => self.ram[offset],
            (Region::Brightness, offset) => self.video[offset],
            (Region::Color, offset) => self.video[PLANE_SIZE + offset],
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        match Region::locate(addr) {
            (Region::Io, offset) => self.io[offset] = val,
            (Region::Ram, offset) => self.ram[offset] = val,
            (Region::Brightness, offset) => self.video[offset] = val,
            (Region::Color, offset) => self.video[PLANE_SIZE + offset] = val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fill() {
        let bus = Retro24Bus::new();
        assert!(bus.region(Region::Io).iter().all(|&b| b == 0x00));
        assert!(bus.region(Region::Ram).iter().all(|&b| b == RAM_FILL));
        assert!(bus.brightness_plane().iter().all(|&b| b == 0x00));
        assert!(bus.color_plane().iter().all(|&b| b == 0x00));
        assert!(bus.is_well_formed());
    }

    #[test]
    fn test_regions_cover_address_space() {
        let total: usize = [Region::Io, Region::Ram, Region::Brightness, Region::Color]
            .iter()
            .map(|r| r.size())
            .sum();
        assert_eq!(total, ADDRESS_SPACE_SIZE);
    }

    #[test]
    fn test_routing_boundaries() {
        assert_eq!(Region::locate(0x00FF), (Region::Io, 0xFF));
        assert_eq!(Region::locate(0x0100), (Region::Ram, 0));
        assert_eq!(Region::locate(0xDFFF), (Region::Ram, RAM_SIZE - 1));
        assert_eq!(Region::locate(0xE000), (Region::Brightness, 0));
        assert_eq!(Region::locate(0xEFFF), (Region::Brightness, 0xFFF));
        assert_eq!(Region::locate(0xF000), (Region::Color, 0));
        assert_eq!(Region::locate(0xFFFF), (Region::Color, 0xFFF));
    }

    #[test]
    fn test_read_write_lands_in_region() {
        let mut bus = Retro24Bus::new();
        bus.write(0x00FF, 0x11);
        bus.write(0x0100, 0x22);
        bus.write(0xDFFF, 0x33);
        bus.write(0xE000, 0x44);
        bus.write(0xFFFF, 0x55);

        assert_eq!(bus.region(Region::Io)[0xFF], 0x11);
        assert_eq!(bus.region(Region::Ram)[0], 0x22);
        assert_eq!(bus.region(Region::Ram)[RAM_SIZE - 1], 0x33);
        assert_eq!(bus.brightness_plane()[0], 0x44);
        assert_eq!(bus.color_plane()[0xFFF], 0x55);
        assert_eq!(bus.read(0xFFFF), 0x55);
    }

    #[test]
    fn test_try_access_rejects_wide_addresses() {
        let mut bus = Retro24Bus::new();
        assert_eq!(bus.try_read(0x10000), Err(BusError::InvalidAddress(0x10000)));
        assert_eq!(
            bus.try_write(0x12345, 0),
            Err(BusError::InvalidAddress(0x12345))
        );
        assert_eq!(bus.try_read(0xFFFF), Ok(0x00));
        assert!(bus.try_write(0x0200, 0x42).is_ok());
        assert_eq!(bus.read(0x0200), 0x42);
    }

    #[test]
    fn test_clear_fills_differ() {
        let mut bus = Retro24Bus::new();
        bus.write(0x0020, 0x01);
        bus.write(0x0500, 0x00);
        bus.write(0xE123, 0x01);
        bus.write(0xF123, 0x01);

        bus.clear_ram();
        assert_eq!(bus.read(0x0500), 0xFF);
        assert_eq!(bus.read(0x0020), 0x01);

        bus.clear_video();
        assert_eq!(bus.read(0xE123), 0x00);
        assert_eq!(bus.read(0xF123), 0x00);

        bus.clear_io();
        assert_eq!(bus.read(0x0020), 0x00);
    }

    #[test]
    fn test_clear_all() {
        let mut bus = Retro24Bus::new();
        bus.write(0x0001, 0x01);
        bus.write(0x1000, 0x01);
        bus.write(0xF000, 0x01);
        bus.clear_all();
        assert_eq!(bus, Retro24Bus::new());
    }

    #[test]
    fn test_load_image_is_all_or_nothing() {
        let mut bus = Retro24Bus::new();
        assert!(bus.load_image(0x0100, &[1, 2, 3]).is_ok());
        assert_eq!(bus.region(Region::Ram)[..4], [1, 2, 3, 0xFF]);

        let mut bus = Retro24Bus::new();
        let result = bus.load_image(0xFFFE, &[9, 9, 9]);
        assert_eq!(result, Err(BusError::InvalidAddress(0x10000)));
        assert_eq!(bus, Retro24Bus::new());
    }

    #[test]
    fn test_draw_flag() {
        let mut bus = Retro24Bus::new();
        assert!(!bus.redraw_requested());
        bus.write(DRAW_FLAG_ADDR, 0x02);
        assert!(bus.redraw_requested());
        bus.clear_redraw();
        assert!(!bus.redraw_requested());
    }

    #[test]
    fn test_glyph_pattern_lands_in_brightness_plane() {
        let mut bus = Retro24Bus::new();
        bus.write_glyph_pattern(&[0b1000_0001, 0b0100_0000], 10, 3);
        let plane = bus.brightness_plane();
        assert_eq!(plane[3 * 64 + 10], 0x01);
        assert_eq!(plane[3 * 64 + 17], 0x01);
        assert_eq!(plane[3 * 64 + 11], 0x00);
        assert_eq!(plane[4 * 64 + 11], 0x01);
        assert!(bus.color_plane().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_glyph_pattern_clips_at_edges() {
        let mut bus = Retro24Bus::new();
        bus.write_glyph_pattern(&[0xFF, 0xFF], 60, 63);
        let plane = bus.brightness_plane();
        assert_eq!(plane[63 * 64 + 60..], [1, 1, 1, 1]);
        assert_eq!(plane.iter().filter(|&&b| b != 0).count(), 4);
    }

    #[test]
    fn test_region_names() {
        assert_eq!(Region::from_name("IO"), Some(Region::Io));
        assert_eq!(Region::from_name("ram"), Some(Region::Ram));
        assert_eq!(Region::from_name("colour"), Some(Region::Color));
        assert_eq!(Region::from_name("rom"), None);
    }
}
