//! Core emulator primitives and traits.

pub mod cpu_retro24;
pub mod ppu;
pub mod types {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// ARGB value at (x, y); `None` outside the frame
        pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.pixels.get((y * self.width + x) as usize).copied()
        }
    }
}

use serde_json::Value;

/// A CPU-like component that can be stepped one instruction at a time.
pub trait Cpu {
    type Error: std::error::Error + Send + Sync + 'static;

    fn reset(&mut self);

    /// Execute one instruction; returns cycles consumed.
    fn step(&mut self) -> Result<u32, Self::Error>;

    /// Advisory halt latch. Drivers stop stepping while it is set.
    fn halted(&self) -> bool;
}

/// Step `cpu` until it halts or `max_steps` instructions have run.
/// Returns the number of instructions executed.
pub fn run_until_halted<C: Cpu>(cpu: &mut C, max_steps: u64) -> Result<u64, C::Error> {
    let mut steps = 0;
    while steps < max_steps && !cpu.halted() {
        cpu.step()?;
        steps += 1;
    }
    Ok(steps)
}

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Program")
    pub id: String,
    /// User-friendly name for display
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["bin"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate one frame's worth of cycles and return the current framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Return a JSON-serializable save state.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
