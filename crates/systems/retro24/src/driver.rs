//! Run loop for a Retro-24 system
//!
//! The driver owns the system and executes it in batches of
//! `cycles_per_frame`, servicing the draw flag after each batch. Other
//! threads control it through a cloneable [`DriverHandle`]: pause and
//! resume, single steps, clock-speed changes, resets and key input all
//! arrive as [`DriverCommand`] messages over an mpsc channel.

use crate::input::Key;
use crate::{Retro24Error, Retro24System, StepReport};
use log::{debug, info};
use retro24_core::types::Frame;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// Nominal clock rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockSpeed {
    /// One cycle every 100 microseconds
    #[default]
    Fast,
    /// One cycle every 10 milliseconds
    Slow,
}

impl ClockSpeed {
    /// Wall-clock time per cycle
    pub fn period(self) -> Duration {
        match self {
            ClockSpeed::Fast => Duration::from_micros(100),
            ClockSpeed::Slow => Duration::from_millis(10),
        }
    }

    pub fn hz(self) -> u32 {
        match self {
            ClockSpeed::Fast => 10_000,
            ClockSpeed::Slow => 100,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ClockSpeed::Fast => ClockSpeed::Slow,
            ClockSpeed::Slow => ClockSpeed::Fast,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "fast" => Some(ClockSpeed::Fast),
            "slow" => Some(ClockSpeed::Slow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    Pause,
    Resume,
    /// Execute a single cycle, typically while paused
    Step,
    ToggleClockSpeed,
    SetClockSpeed(ClockSpeed),
    Press(Key),
    Release,
    SoftReset,
    HardReset,
    Reload,
    Stop,
}

/// Sending side of the driver's command channel
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: Sender<DriverCommand>,
}

impl DriverHandle {
    /// Queue a command. Returns `false` once the driver has been dropped.
    pub fn send(&self, cmd: DriverCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Halted,
    BudgetExhausted,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub frames: u64,
    pub reason: StopReason,
}

pub struct Driver {
    system: Retro24System,
    rx: Receiver<DriverCommand>,
    speed: ClockSpeed,
    paused: bool,
    stopped: bool,
}

impl Driver {
    pub fn new(system: Retro24System) -> (Self, DriverHandle) {
        let (tx, rx) = channel();
        let driver = Self {
            system,
            rx,
            speed: ClockSpeed::default(),
            paused: false,
            stopped: false,
        };
        (driver, DriverHandle { tx })
    }

    pub fn system(&self) -> &Retro24System {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut Retro24System {
        &mut self.system
    }

    pub fn into_system(self) -> Retro24System {
        self.system
    }

    pub fn speed(&self) -> ClockSpeed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: ClockSpeed) {
        if speed != self.speed {
            info!("Clock speed: {} Hz", speed.hz());
        }
        self.speed = speed;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Execute exactly one cycle (nothing when halted)
    pub fn step(&mut self) -> Result<StepReport, Retro24Error> {
        self.system.run_cycles(1)
    }

    /// Execute one batch of `cycles_per_frame` cycles
    pub fn run_frame(&mut self) -> Result<StepReport, Retro24Error> {
        let cycles = self.system.cycles_per_frame();
        self.system.run_cycles(cycles)
    }

    fn handle(&mut self, cmd: DriverCommand) -> Result<StepReport, Retro24Error> {
        debug!("Driver: {:?}", cmd);
        match cmd {
            DriverCommand::Pause => self.paused = true,
            DriverCommand::Resume => self.paused = false,
            DriverCommand::Step => return self.step(),
            DriverCommand::ToggleClockSpeed => self.set_speed(self.speed.toggled()),
            DriverCommand::SetClockSpeed(speed) => self.set_speed(speed),
            DriverCommand::Press(key) => self.system.press_key(key),
            DriverCommand::Release => self.system.release_key(),
            DriverCommand::SoftReset => self.system.soft_reset(),
            DriverCommand::HardReset => self.system.hard_reset(),
            DriverCommand::Reload => {
                self.system.reload()?;
            }
            DriverCommand::Stop => self.stopped = true,
        }
        Ok(StepReport::default())
    }

    /// Apply every queued command without blocking. Single steps requested
    /// through the channel are folded into the returned report.
    pub fn poll_commands(&mut self) -> Result<StepReport, Retro24Error> {
        let mut total = StepReport::default();
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => {
                    let report = self.handle(cmd)?;
                    total.cycles += report.cycles;
                    total.redrawn |= report.redrawn;
                    total.halted = report.halted;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(total)
    }

    /// Run until the CPU halts, `max_cycles` have executed, or a `Stop`
    /// command arrives. `on_frame` sees every redrawn frame. With `realtime`
    /// set each batch is paced to the current clock speed.
    ///
    /// While paused the loop blocks on the command channel; if every handle
    /// has been dropped it stops instead of waiting forever.
    pub fn run<F>(
        &mut self,
        max_cycles: Option<u64>,
        realtime: bool,
        mut on_frame: F,
    ) -> Result<RunSummary, Retro24Error>
    where
        F: FnMut(&Frame),
    {
        let mut summary = RunSummary {
            cycles: 0,
            frames: 0,
            reason: StopReason::Stopped,
        };

        loop {
            let report = self.poll_commands()?;
            summary.cycles += report.cycles as u64;
            if report.redrawn {
                summary.frames += 1;
                on_frame(self.system.frame());
            }

            if self.stopped {
                self.stopped = false;
                summary.reason = StopReason::Stopped;
                break;
            }

            if self.paused {
                match self.rx.recv() {
                    Ok(cmd) => {
                        let report = self.handle(cmd)?;
                        summary.cycles += report.cycles as u64;
                        if report.redrawn {
                            summary.frames += 1;
                            on_frame(self.system.frame());
                        }
                    }
                    Err(_) => {
                        summary.reason = StopReason::Stopped;
                        break;
                    }
                }
                continue;
            }

            if self.system.halted() {
                summary.reason = StopReason::Halted;
                break;
            }

            let mut batch = self.system.cycles_per_frame() as u64;
            if let Some(max) = max_cycles {
                let remaining = max.saturating_sub(summary.cycles);
                if remaining == 0 {
                    summary.reason = StopReason::BudgetExhausted;
                    break;
                }
                batch = batch.min(remaining);
            }

            let start = Instant::now();
            let report = self.system.run_cycles(batch as u32)?;
            summary.cycles += report.cycles as u64;
            if report.redrawn {
                summary.frames += 1;
                on_frame(self.system.frame());
            }

            if realtime {
                let target = self.speed.period() * report.cycles;
                let elapsed = start.elapsed();
                if target > elapsed {
                    std::thread::sleep(target - elapsed);
                }
            }
        }

        debug!(
            "Driver: {:?} after {} cycles, {} frames",
            summary.reason, summary.cycles, summary.frames
        );
        Ok(summary)
    }
}
