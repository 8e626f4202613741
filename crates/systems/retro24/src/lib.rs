//! Retro-24 system implementation

pub mod bus;
pub mod driver;
pub mod font;
pub mod input;
pub mod loader;
pub mod ppu;

use bus::{BusError, Retro24Bus};
use input::{Key, KEYBOARD_ADDR};
use loader::{LoadError, ProgramImage};
use log::{debug, warn};
use ppu::Ppu;
use retro24_core::cpu_retro24::{CpuError, CpuRetro24, MemoryRetro24, Registers};
use retro24_core::{types::Frame, MountPointInfo, System};
use serde::de::Error as _;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Cycles between draw-flag checks unless configured otherwise
pub const DEFAULT_CYCLES_PER_FRAME: u32 = 100;

const PROGRAM_MOUNT: &str = "Program";
const STATE_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum Retro24Error {
    #[error("CPU fault: {0}")]
    Cpu(#[from] CpuError),
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
    #[error("Program load failed: {0}")]
    Load(#[from] LoadError),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
}

/// Outcome of a batch of cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Cycles actually executed
    pub cycles: u32,
    /// A redraw was requested and the frame re-rendered
    pub redrawn: bool,
    /// The CPU is halted at the end of the batch
    pub halted: bool,
}

/// Retro-24 system: CPU, address space and rasterizer
pub struct Retro24System {
    cpu: CpuRetro24<Retro24Bus>,
    ppu: Ppu,
    frame: Frame,
    program: Option<ProgramImage>,
    cycles_per_frame: u32,
    frames_rendered: u64,
}

impl Default for Retro24System {
    fn default() -> Self {
        Self::new()
    }
}

impl Retro24System {
    /// Power on: default memory fill, boot title on screen
    pub fn new() -> Self {
        let cpu = CpuRetro24::new(Retro24Bus::new());
        let ppu = Ppu::new();
        let frame = ppu.render(&cpu.memory);
        let mut sys = Self {
            cpu,
            ppu,
            frame,
            program: None,
            cycles_per_frame: DEFAULT_CYCLES_PER_FRAME,
            frames_rendered: 0,
        };
        sys.hard_reset();
        sys
    }

    /// Set how many cycles `step_frame` runs before checking the draw flag
    pub fn with_cycles_per_frame(mut self, cycles: u32) -> Self {
        self.set_cycles_per_frame(cycles);
        self
    }

    pub fn set_cycles_per_frame(&mut self, cycles: u32) {
        self.cycles_per_frame = cycles.max(1);
    }

    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    pub fn cpu(&self) -> &CpuRetro24<Retro24Bus> {
        &self.cpu
    }

    pub fn registers(&self) -> Registers {
        self.cpu.registers()
    }

    pub fn bus(&self) -> &Retro24Bus {
        &self.cpu.memory
    }

    pub fn bus_mut(&mut self) -> &mut Retro24Bus {
        &mut self.cpu.memory
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn halted(&self) -> bool {
        self.cpu.halted()
    }

    /// Most recently rendered frame
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn program(&self) -> Option<&ProgramImage> {
        self.program.as_ref()
    }

    /// Run one cycle unless the CPU is halted. Returns whether a cycle ran.
    pub fn step(&mut self) -> Result<bool, Retro24Error> {
        if self.cpu.halted() {
            return Ok(false);
        }
        self.cpu.cycle()?;
        Ok(true)
    }

    /// Run up to `cycles` cycles (stopping early on halt), then service the
    /// draw flag once.
    pub fn run_cycles(&mut self, cycles: u32) -> Result<StepReport, Retro24Error> {
        let mut report = StepReport::default();
        while report.cycles < cycles && self.step()? {
            report.cycles += 1;
        }
        report.redrawn = self.refresh_display();
        report.halted = self.cpu.halted();
        Ok(report)
    }

    /// Render and clear the draw flag if a redraw was requested
    pub fn refresh_display(&mut self) -> bool {
        if !self.ppu.should_redraw(&self.cpu.memory) {
            return false;
        }
        self.render_now();
        self.cpu.memory.clear_redraw();
        debug!("PPU: redraw #{}", self.frames_rendered);
        true
    }

    /// Render the current planes regardless of the draw flag
    pub fn render_now(&mut self) -> &Frame {
        self.ppu.render_into(&self.cpu.memory, &mut self.frame);
        self.frames_rendered += 1;
        &self.frame
    }

    /// Clear RAM and video and reset registers. IO (apart from the
    /// watchdogs) and the boot title are left alone.
    pub fn soft_reset(&mut self) {
        self.cpu.memory.clear_ram();
        self.cpu.memory.clear_video();
        self.cpu.reset();
        self.render_now();
        debug!("System: soft reset");
    }

    /// Clear all memory, reset registers and redraw the boot title
    pub fn hard_reset(&mut self) {
        self.cpu.memory.clear_all();
        self.cpu.reset();
        font::write_title(&mut self.cpu.memory);
        self.render_now();
        debug!("System: hard reset");
    }

    /// Soft reset and copy `image` to $0100. Memory is untouched when the
    /// image does not fit.
    pub fn load_program(&mut self, image: ProgramImage) -> Result<(), Retro24Error> {
        image.check_fits(&self.cpu.memory)?;
        self.soft_reset();
        image.write_into(&mut self.cpu.memory)?;
        debug!(
            "System: loaded {} byte program{}",
            image.len(),
            image
                .path()
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        );
        self.program = Some(image);
        Ok(())
    }

    /// Read and load a program file. A missing or unreadable file leaves the
    /// system exactly as it was.
    pub fn load_program_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Retro24Error> {
        let image = ProgramImage::from_file(path).map_err(|e| {
            warn!("{}", e);
            e
        })?;
        self.load_program(image)
    }

    /// Soft reset and write the last loaded program again.
    /// Returns `false` when no program has been loaded.
    pub fn reload(&mut self) -> Result<bool, Retro24Error> {
        let Some(image) = self.program.clone() else {
            return Ok(false);
        };
        self.load_program(image)?;
        Ok(true)
    }

    /// Hold `key`; replaces any previously held key
    pub fn press_key(&mut self, key: Key) {
        self.cpu.memory.write(KEYBOARD_ADDR, key.mask());
    }

    pub fn release_key(&mut self) {
        self.cpu.memory.write(KEYBOARD_ADDR, 0x00);
    }

    pub fn held_key(&self) -> Option<Key> {
        Key::from_mask(self.cpu.memory.read(KEYBOARD_ADDR))
    }
}

fn invalid_state(msg: &str) -> serde_json::Error {
    serde_json::Error::custom(msg)
}

impl System for Retro24System {
    type Error = Retro24Error;

    fn reset(&mut self) {
        self.hard_reset();
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        self.run_cycles(self.cycles_per_frame)?;
        Ok(self.frame.clone())
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": STATE_VERSION,
            "system": "retro24",
            "cycles": self.cpu.cycles,
            "registers": self.cpu.registers(),
            "bus": self.cpu.memory,
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        if v["version"].as_u64() != Some(STATE_VERSION) {
            return Err(invalid_state("unsupported save state version"));
        }
        if v["system"].as_str() != Some("retro24") {
            return Err(invalid_state("save state is not for retro24"));
        }

        let registers: Registers = serde_json::from_value(v["registers"].clone())?;
        let bus: Retro24Bus = serde_json::from_value(v["bus"].clone())?;
        if !bus.is_well_formed() {
            return Err(invalid_state("save state memory regions have the wrong size"));
        }

        self.cpu.memory = bus;
        self.cpu.load_registers(registers);
        self.cpu.cycles = v["cycles"].as_u64().unwrap_or(0);
        self.render_now();
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: PROGRAM_MOUNT.to_string(),
            name: "Program Image".to_string(),
            extensions: vec!["bin".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != PROGRAM_MOUNT {
            return Err(Retro24Error::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.load_program(ProgramImage::from_bytes(data.to_vec()))
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != PROGRAM_MOUNT {
            return Err(Retro24Error::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.program = None;
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == PROGRAM_MOUNT && self.program.is_some()
    }
}
