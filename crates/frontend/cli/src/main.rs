mod screenshot;
mod settings;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use retro24_core::cpu_retro24::disassemble;
use retro24_core::System;
use retro24_system::bus::Region;
use retro24_system::driver::{ClockSpeed, Driver, StopReason};
use retro24_system::input::Key;
use retro24_system::Retro24System;
use settings::Settings;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "retro24", about = "Headless Retro-24 emulator")]
struct Args {
    /// Program image to load at $0100
    program: Option<PathBuf>,

    /// JSON settings file (missing file means defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to this file and continue
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Maximum number of cycles to run (0 = until halt)
    #[arg(long, default_value_t = 1_000_000)]
    cycles: u64,

    /// Cycles between draw-flag checks
    #[arg(long)]
    cycles_per_frame: Option<u32>,

    /// Clock speed: "fast" (10 kHz) or "slow" (100 Hz)
    #[arg(long)]
    speed: Option<String>,

    /// Pace execution to the clock speed instead of running flat out
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Hold a key for the whole run (mapped name or up/down/left/right/action)
    #[arg(long)]
    key: Option<String>,

    /// Log every executed instruction
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Disassemble N instructions from $0100 before running
    #[arg(long)]
    disasm: Option<usize>,

    /// Hex-dump a memory region after the run: io, ram, brightness or color
    #[arg(long)]
    dump: Option<String>,

    /// Restore a JSON save state before running
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Dump a JSON save state after the run
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print the final frame as text
    #[arg(long, default_value_t = false)]
    show: bool,

    /// Write the final frame to a PNG file
    #[arg(long)]
    png: Option<PathBuf>,

    /// Pixel scale for --png
    #[arg(long)]
    scale: Option<u8>,
}

fn init_logging(trace: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if trace {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();
}

/// Resolve a key name, first through the configured mapping
fn resolve_key(name: &str, settings: &Settings) -> Option<Key> {
    settings
        .keyboard
        .key_for(name)
        .or_else(|| Key::from_name(name))
}

/// Classic 16-bytes-per-line hex dump, addresses relative to `base`
fn hex_dump(base: u16, bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in bytes.chunks(16).enumerate() {
        let addr = base as usize + i * 16;
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        out.push_str(&format!("{:04X}: {}\n", addr, hex.join(" ")));
    }
    out
}

fn apply_overrides(args: &Args, settings: &mut Settings) -> Result<()> {
    if let Some(name) = &args.speed {
        settings.clock_speed = match ClockSpeed::from_name(name) {
            Some(speed) => speed,
            None => bail!("Unknown clock speed: {}", name),
        };
    }
    if let Some(cycles) = args.cycles_per_frame {
        settings.cycles_per_frame = cycles;
    }
    if let Some(scale) = args.scale {
        settings.scale = scale;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.trace);

    let mut settings = match &args.config {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };
    apply_overrides(&args, &mut settings)?;
    if let Some(path) = &args.write_config {
        settings
            .save(path)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
    }

    let mut sys = Retro24System::new().with_cycles_per_frame(settings.cycles_per_frame);

    if let Some(path) = &args.program {
        // The system keeps running on the boot screen if the image is unusable
        if let Err(e) = sys.load_program_file(path) {
            error!("{}", e);
        }
    }

    if let Some(path) = &args.load_state {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let state: serde_json::Value = serde_json::from_str(&text)?;
        sys.load_state(&state)
            .with_context(|| format!("invalid save state {}", path.display()))?;
    }

    if let Some(count) = args.disasm {
        let mut addr = sys.registers().ic;
        for _ in 0..count {
            let dis = disassemble(sys.bus(), addr);
            println!("{:04X}  {}", dis.addr, dis.text);
            addr = addr.wrapping_add(dis.size);
        }
    }

    if let Some(name) = &args.key {
        match resolve_key(name, &settings) {
            Some(key) => sys.press_key(key),
            None => bail!("Unknown key: {}", name),
        }
    }

    let (mut driver, _handle) = Driver::new(sys);
    driver.set_speed(settings.clock_speed);

    let budget = (args.cycles > 0).then_some(args.cycles);
    let result = driver.run(budget, args.realtime, |_| {});
    let sys = driver.into_system();
    let regs = sys.registers();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(
                "AR={:04X} IC={:04X} R0={:02X} R1={:02X} R2={:02X} R3={:02X}",
                regs.ar, regs.ic, regs.r0, regs.r1, regs.r2, regs.r3
            );
            return Err(e).context("execution stopped");
        }
    };

    let reason = match summary.reason {
        StopReason::Halted => "halted",
        StopReason::BudgetExhausted => "cycle budget exhausted",
        StopReason::Stopped => "stopped",
    };
    info!(
        "{} after {} cycles, {} frames redrawn",
        reason, summary.cycles, summary.frames
    );
    println!(
        "AR={:04X} IC={:04X} R0={:02X} R1={:02X} R2={:02X} R3={:02X} HLT={}",
        regs.ar, regs.ic, regs.r0, regs.r1, regs.r2, regs.r3, regs.hlt
    );

    if let Some(name) = &args.dump {
        let region = match Region::from_name(name) {
            Some(region) => region,
            None => bail!("Unknown memory region: {}", name),
        };
        print!("{}", hex_dump(region.start(), sys.bus().region(region)));
    }

    if args.show {
        print!("{}", sys.ppu().render_text(sys.bus()));
    }

    if let Some(path) = &args.png {
        screenshot::write_png(sys.frame(), settings.scale as u32, path)?;
    }

    if let Some(path) = &args.save {
        let state = sys.save_state();
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        let bytes: Vec<u8> = (0..20).collect();
        let dump = hex_dump(0xE000, &bytes);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("E000: 00 01 02"));
        assert_eq!(lines[1], "E010: 10 11 12 13");
    }

    #[test]
    fn test_resolve_key_prefers_mapping() {
        let mut settings = Settings::default();
        settings.keyboard.up = "W".to_string();
        assert_eq!(resolve_key("w", &settings), Some(Key::Up));
        assert_eq!(resolve_key("space", &settings), Some(Key::Action));
        assert_eq!(resolve_key("fire", &settings), Some(Key::Action));
        assert_eq!(resolve_key("enter", &settings), None);
    }

    #[test]
    fn test_cli_overrides_settings() {
        let args = Args::parse_from([
            "retro24",
            "--speed",
            "slow",
            "--cycles-per-frame",
            "7",
            "--scale",
            "2",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&args, &mut settings).unwrap();
        assert_eq!(settings.clock_speed, ClockSpeed::Slow);
        assert_eq!(settings.cycles_per_frame, 7);
        assert_eq!(settings.scale, 2);

        let args = Args::parse_from(["retro24", "--speed", "warp"]);
        assert!(apply_overrides(&args, &mut settings).is_err());
    }
}
