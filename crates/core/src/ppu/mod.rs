//! Reusable video building blocks shared by system rasterizers.

pub mod palette;

pub use palette::{plane_index, IndexedPalette, RamPalette};
