//! Program images
//!
//! A program image is a raw, headerless byte stream copied verbatim into the
//! address space from $0100 upward. Images longer than RAM continue into the
//! video planes; images that would run past $FFFF are rejected before any
//! byte is written.

use crate::bus::{BusError, Retro24Bus, RAM_START};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Load address of every program image
pub const PROGRAM_START: u16 = RAM_START;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read program image {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("program image of {len} bytes does not fit: {source}")]
    TooLarge {
        len: usize,
        #[source]
        source: BusError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: Vec<u8>,
    path: Option<PathBuf>,
}

impl ProgramImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, path: None }
    }

    /// Read a whole stream as an image
    pub fn from_reader(reader: &mut impl Read) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Read an image from disk. Missing or unreadable files are reported,
    /// never fatal.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            bytes,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File the image was read from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fail early if the image cannot be placed at `PROGRAM_START`
    pub fn check_fits(&self, bus: &Retro24Bus) -> Result<(), LoadError> {
        bus.check_span(PROGRAM_START, self.len())
            .map_err(|source| LoadError::TooLarge {
                len: self.len(),
                source,
            })
    }

    /// Copy the image to `PROGRAM_START`
    pub fn write_into(&self, bus: &mut Retro24Bus) -> Result<(), LoadError> {
        bus.load_image(PROGRAM_START, &self.bytes)
            .map_err(|source| LoadError::TooLarge {
                len: self.len(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Region, ADDRESS_SPACE_SIZE};
    use retro24_core::cpu_retro24::MemoryRetro24;

    #[test]
    fn test_write_copies_verbatim_from_0100() {
        let mut bus = Retro24Bus::new();
        let image = ProgramImage::from_bytes(vec![0x00, 0x80, 0xFF, 0x17]);
        image.write_into(&mut bus).unwrap();
        assert_eq!(bus.region(Region::Ram)[..5], [0x00, 0x80, 0xFF, 0x17, 0xFF]);
        assert_eq!(bus.read(0x0100), 0x00);
        assert_eq!(bus.read(0x0103), 0x17);
    }

    #[test]
    fn test_from_reader() {
        let mut src: &[u8] = &[0x05, 0xFF];
        let image = ProgramImage::from_reader(&mut src).unwrap();
        assert_eq!(image.bytes(), &[0x05, 0xFF]);
        assert_eq!(image.path(), None);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let path = std::env::temp_dir().join("retro24_loader_test_missing.bin");
        let _ = fs::remove_file(&path);
        match ProgramImage::from_file(&path) {
            Err(LoadError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join("retro24_loader_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prog.bin");
        fs::write(&path, [0x17, 0x2A, 0xFF]).unwrap();

        let image = ProgramImage::from_file(&path).unwrap();
        assert_eq!(image.len(), 3);
        assert_eq!(image.path(), Some(path.as_path()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_long_image_spills_into_video() {
        let mut bus = Retro24Bus::new();
        let len = ADDRESS_SPACE_SIZE - PROGRAM_START as usize;
        let image = ProgramImage::from_bytes(vec![0x01; len]);
        image.write_into(&mut bus).unwrap();
        assert_eq!(bus.read(0xFFFF), 0x01);
    }

    #[test]
    fn test_oversized_image_leaves_memory_alone() {
        let mut bus = Retro24Bus::new();
        let len = ADDRESS_SPACE_SIZE - PROGRAM_START as usize + 1;
        let image = ProgramImage::from_bytes(vec![0x01; len]);
        assert!(matches!(
            image.check_fits(&bus),
            Err(LoadError::TooLarge { .. })
        ));
        assert!(image.write_into(&mut bus).is_err());
        assert_eq!(bus, Retro24Bus::new());
    }
}
