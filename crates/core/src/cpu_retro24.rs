//! Retro-24 CPU core implementation
//!
//! The Retro-24 is a tiny accumulator-style processor with a 16-bit address
//! register (AR), a 16-bit instruction counter (IC) and four 8-bit general
//! registers (R0-R3). There are no flags, no stack and no interrupts: every
//! ALU rule either wraps or saturates, so no instruction can fault. The only
//! failure mode is fetching a byte with no entry in the opcode table.
//!
//! Systems provide memory by implementing the `MemoryRetro24` trait.

use log::{error, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory interface trait for the Retro-24 CPU
pub trait MemoryRetro24 {
    /// Read a byte from memory at the given address
    fn read(&self, addr: u16) -> u8;

    /// Write a byte to memory at the given address
    fn write(&mut self, addr: u16, val: u8);
}

/// IO byte incremented by one on every cycle
pub const WATCHDOG_TICK_ADDR: u16 = 0x0010;
/// IO byte decremented by one on every cycle
pub const WATCHDOG_TOCK_ADDR: u16 = 0x0011;

/// Power-on value of IC (first RAM byte)
pub const RESET_IC: u16 = 0x0100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("unknown opcode ${opcode:02X} at IC=${ic:04X}")]
    UnknownOpcode { opcode: u8, ic: u16 },
}

/// The instruction set. Discriminants are the encoded opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nul = 0x00,
    Mar = 0x01,
    Sic = 0x02,
    Rar = 0x03,
    Aar = 0x04,
    Ir0 = 0x05,
    A01 = 0x06,
    Dr0 = 0x07,
    S01 = 0x08,
    X12 = 0x09,
    X01 = 0x10,
    Jmp = 0x11,
    Sr0 = 0x12,
    Srw = 0x13,
    Lr0 = 0x14,
    Lrw = 0x15,
    Taw = 0x16,
    Mr0 = 0x17,
    Mrw = 0x18,
    Jz0 = 0x19,
    Jgw = 0x20,
    Jew = 0x21,
    Or0 = 0x22,
    An0 = 0x23,
    Je0 = 0x24,
    C01 = 0x25,
    C02 = 0x26,
    Irw = 0x27,
    Drw = 0x28,
    X03 = 0x29,
    C03 = 0x2A,
    C30 = 0x2B,
    Pl0 = 0x2C,
    Pr0 = 0x2D,
    Hlt = 0xFF,
}

const ALL_OPCODES: [Opcode; 35] = [
    Opcode::Nul,
    Opcode::Mar,
    Opcode::Sic,
    Opcode::Rar,
    Opcode::Aar,
    Opcode::Ir0,
    Opcode::A01,
    Opcode::Dr0,
    Opcode::S01,
    Opcode::X12,
    Opcode::X01,
    Opcode::Jmp,
    Opcode::Sr0,
    Opcode::Srw,
    Opcode::Lr0,
    Opcode::Lrw,
    Opcode::Taw,
    Opcode::Mr0,
    Opcode::Mrw,
    Opcode::Jz0,
    Opcode::Jgw,
    Opcode::Jew,
    Opcode::Or0,
    Opcode::An0,
    Opcode::Je0,
    Opcode::C01,
    Opcode::C02,
    Opcode::Irw,
    Opcode::Drw,
    Opcode::X03,
    Opcode::C03,
    Opcode::C30,
    Opcode::Pl0,
    Opcode::Pr0,
    Opcode::Hlt,
];

const fn build_opcode_table() -> [Option<Opcode>; 256] {
    let mut table = [None; 256];
    let mut i = 0;
    while i < ALL_OPCODES.len() {
        table[ALL_OPCODES[i] as usize] = Some(ALL_OPCODES[i]);
        i += 1;
    }
    table
}

/// Dispatch table indexed directly by the fetched byte. Empty slots are unmapped opcodes.
pub static OPCODE_TABLE: [Option<Opcode>; 256] = build_opcode_table();

impl Opcode {
    /// Look up an opcode byte in the dispatch table
    #[inline]
    pub fn decode(byte: u8) -> Option<Opcode> {
        OPCODE_TABLE[byte as usize]
    }

    /// Every mapped opcode, in encoding order
    pub fn all() -> &'static [Opcode] {
        &ALL_OPCODES
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Encoded size in bytes, including the opcode byte
    pub fn size(self) -> u16 {
        match self {
            Opcode::Mar | Opcode::Mrw => 3,
            Opcode::Mr0 | Opcode::Or0 | Opcode::An0 | Opcode::Je0 => 2,
            _ => 1,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nul => "NUL",
            Opcode::Mar => "MAR",
            Opcode::Sic => "SIC",
            Opcode::Rar => "RAR",
            Opcode::Aar => "AAR",
            Opcode::Ir0 => "IR0",
            Opcode::A01 => "A01",
            Opcode::Dr0 => "DR0",
            Opcode::S01 => "S01",
            Opcode::X12 => "X12",
            Opcode::X01 => "X01",
            Opcode::Jmp => "JMP",
            Opcode::Sr0 => "SR0",
            Opcode::Srw => "SRW",
            Opcode::Lr0 => "LR0",
            Opcode::Lrw => "LRW",
            Opcode::Taw => "TAW",
            Opcode::Mr0 => "MR0",
            Opcode::Mrw => "MRW",
            Opcode::Jz0 => "JZ0",
            Opcode::Jgw => "JGW",
            Opcode::Jew => "JEW",
            Opcode::Or0 => "OR0",
            Opcode::An0 => "AN0",
            Opcode::Je0 => "JE0",
            Opcode::C01 => "C01",
            Opcode::C02 => "C02",
            Opcode::Irw => "IRW",
            Opcode::Drw => "DRW",
            Opcode::X03 => "X03",
            Opcode::C03 => "C03",
            Opcode::C30 => "C30",
            Opcode::Pl0 => "PL0",
            Opcode::Pr0 => "PR0",
            Opcode::Hlt => "HLT",
        }
    }
}

/// One decoded instruction in text form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub addr: u16,
    pub text: String,
    /// Bytes consumed, 1 for unmapped bytes
    pub size: u16,
}

/// Disassemble the instruction at `addr`. Unmapped bytes render as `DB $xx`.
pub fn disassemble<M: MemoryRetro24 + ?Sized>(mem: &M, addr: u16) -> Disassembly {
    let byte = mem.read(addr);
    let arg = |n: u16| mem.read(addr.wrapping_add(n));

    let (text, size) = match Opcode::decode(byte) {
        None => (format!("DB ${:02X}", byte), 1),
        Some(op) => {
            let text = match op {
                Opcode::Mar => {
                    let target = u16::from_le_bytes([arg(1), arg(2)]);
                    format!("MAR ${:04X}", target)
                }
                Opcode::Mrw => format!("MRW #${:02X}, #${:02X}", arg(1), arg(2)),
                Opcode::Mr0 | Opcode::Or0 | Opcode::An0 | Opcode::Je0 => {
                    format!("{} #${:02X}", op.mnemonic(), arg(1))
                }
                _ => op.mnemonic().to_string(),
            };
            (text, op.size())
        }
    };

    Disassembly { addr, text, size }
}

/// Register file snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub ar: u16,
    pub ic: u16,
    pub r0: u8,
    pub r1: u8,
    pub r2: u8,
    pub r3: u8,
    pub hlt: bool,
    /// Last fetched opcode byte
    pub current_opcode: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            ar: 0x0000,
            ic: RESET_IC,
            r0: 0x00,
            r1: 0x00,
            r2: 0x00,
            r3: 0x00,
            hlt: false,
            current_opcode: 0x00,
        }
    }
}

/// Retro-24 CPU state and execution engine
///
/// Registers are only reachable through accessors; the HLT latch is set by
/// the HLT instruction and cleared by `reset`.
#[derive(Debug)]
pub struct CpuRetro24<M: MemoryRetro24> {
    regs: Registers,
    /// Total instructions executed since reset
    pub cycles: u64,
    /// Memory interface
    pub memory: M,
}

impl<M: MemoryRetro24> CpuRetro24<M> {
    /// Create a new CPU in its power-on state
    pub fn new(memory: M) -> Self {
        Self {
            regs: Registers::default(),
            cycles: 0,
            memory,
        }
    }

    /// Restore power-on registers and zero both watchdog bytes.
    /// RAM and video are left alone.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.cycles = 0;
        self.memory.write(WATCHDOG_TICK_ADDR, 0x00);
        self.memory.write(WATCHDOG_TOCK_ADDR, 0x00);
    }

    pub fn ar(&self) -> u16 {
        self.regs.ar
    }

    pub fn ic(&self) -> u16 {
        self.regs.ic
    }

    pub fn r0(&self) -> u8 {
        self.regs.r0
    }

    pub fn r1(&self) -> u8 {
        self.regs.r1
    }

    pub fn r2(&self) -> u8 {
        self.regs.r2
    }

    pub fn r3(&self) -> u8 {
        self.regs.r3
    }

    pub fn halted(&self) -> bool {
        self.regs.hlt
    }

    pub fn current_opcode(&self) -> u8 {
        self.regs.current_opcode
    }

    pub fn registers(&self) -> Registers {
        self.regs
    }

    /// Overwrite the whole register file, used when restoring a save state
    pub fn load_registers(&mut self, regs: Registers) {
        self.regs = regs;
    }

    /// Execute one cycle and return the instruction that ran.
    ///
    /// An unmapped opcode fails before anything is mutated, including the
    /// watchdog bytes. Halt is advisory: callers check `halted()` first.
    pub fn cycle(&mut self) -> Result<Opcode, CpuError> {
        let ic = self.regs.ic;
        let byte = self.memory.read(ic);
        let op = match Opcode::decode(byte) {
            Some(op) => op,
            None => {
                error!("CPU: unknown opcode ${:02X} at ${:04X}", byte, ic);
                return Err(CpuError::UnknownOpcode { opcode: byte, ic });
            }
        };

        self.regs.current_opcode = byte;
        self.tick_watchdogs();

        if log::log_enabled!(log::Level::Trace) {
            let dis = disassemble(&self.memory, ic);
            trace!(
                "{:04X}  {:<16} AR={:04X} R0={:02X} R1={:02X} R2={:02X} R3={:02X}",
                ic,
                dis.text,
                self.regs.ar,
                self.regs.r0,
                self.regs.r1,
                self.regs.r2,
                self.regs.r3
            );
        }

        self.execute(op);
        self.cycles += 1;
        Ok(op)
    }

    fn tick_watchdogs(&mut self) {
        let tick = self.memory.read(WATCHDOG_TICK_ADDR);
        self.memory.write(WATCHDOG_TICK_ADDR, tick.wrapping_add(1));
        let tock = self.memory.read(WATCHDOG_TOCK_ADDR);
        self.memory.write(WATCHDOG_TOCK_ADDR, tock.wrapping_sub(1));
    }

    /// Byte `n` positions after the opcode
    #[inline]
    fn operand(&self, n: u16) -> u8 {
        self.memory.read(self.regs.ic.wrapping_add(n))
    }

    #[inline]
    fn advance(&mut self, n: u16) {
        self.regs.ic = self.regs.ic.wrapping_add(n);
    }

    #[inline]
    fn jump_if(&mut self, cond: bool, fallthrough: u16) {
        if cond {
            self.regs.ic = self.regs.ar;
        } else {
            self.advance(fallthrough);
        }
    }

    /// R1 -= rhs with the R2 borrow rule shared by S01 and DRW.
    /// A negative result leaves its magnitude in R1 and borrows from R2;
    /// when R2 is already zero both collapse to zero.
    fn sub_word(&mut self, rhs: u8) {
        let r1 = self.regs.r1;
        if rhs > r1 {
            self.regs.r1 = rhs - r1;
            match self.regs.r2.checked_sub(1) {
                Some(r2) => self.regs.r2 = r2,
                None => {
                    self.regs.r1 = 0x00;
                    self.regs.r2 = 0x00;
                }
            }
        } else {
            self.regs.r1 = r1 - rhs;
        }
    }

    fn execute(&mut self, op: Opcode) {
        match op {
            Opcode::Nul => {}
            Opcode::Mar => {
                self.regs.ar = u16::from_le_bytes([self.operand(1), self.operand(2)]);
            }
            Opcode::Sic => {
                let [lo, hi] = self.regs.ic.to_le_bytes();
                let ar = self.regs.ar;
                self.memory.write(ar, lo);
                self.memory.write(ar.wrapping_add(1), hi);
            }
            Opcode::Rar => {
                self.regs.ar = u16::from_le_bytes([self.regs.r1, self.regs.r2]);
            }
            Opcode::Aar => {
                self.regs.ar = self.regs.ar.wrapping_add(self.regs.r0 as u16);
            }
            Opcode::Ir0 => self.regs.r0 = self.regs.r0.saturating_add(1),
            Opcode::A01 => {
                let (sum, carry) = self.regs.r1.overflowing_add(self.regs.r0);
                self.regs.r1 = sum;
                if carry {
                    match self.regs.r2.checked_add(1) {
                        Some(r2) => self.regs.r2 = r2,
                        None => {
                            self.regs.r1 = 0xFF;
                            self.regs.r2 = 0xFF;
                        }
                    }
                }
            }
            Opcode::Dr0 => self.regs.r0 = self.regs.r0.saturating_sub(1),
            Opcode::S01 => self.sub_word(self.regs.r0),
            Opcode::X12 => std::mem::swap(&mut self.regs.r1, &mut self.regs.r2),
            Opcode::X01 => std::mem::swap(&mut self.regs.r0, &mut self.regs.r1),
            Opcode::Jmp => {
                self.regs.ic = self.regs.ar;
                return;
            }
            Opcode::Sr0 => self.memory.write(self.regs.ar, self.regs.r0),
            Opcode::Srw => {
                let ar = self.regs.ar;
                self.memory.write(ar, self.regs.r1);
                self.memory.write(ar.wrapping_add(1), self.regs.r2);
            }
            Opcode::Lr0 => self.regs.r0 = self.memory.read(self.regs.ar),
            Opcode::Lrw => {
                let ar = self.regs.ar;
                self.regs.r1 = self.memory.read(ar);
                self.regs.r2 = self.memory.read(ar.wrapping_add(1));
            }
            Opcode::Taw => {
                let [lo, hi] = self.regs.ar.to_le_bytes();
                self.regs.r1 = lo;
                self.regs.r2 = hi;
            }
            Opcode::Mr0 => self.regs.r0 = self.operand(1),
            Opcode::Mrw => {
                self.regs.r1 = self.operand(1);
                self.regs.r2 = self.operand(2);
            }
            Opcode::Jz0 => return self.jump_if(self.regs.r0 == 0x00, 1),
            Opcode::Jgw => return self.jump_if(self.regs.r1 > self.regs.r2, 1),
            Opcode::Jew => return self.jump_if(self.regs.r1 == self.regs.r2, 1),
            Opcode::Or0 => self.regs.r0 |= self.operand(1),
            Opcode::An0 => self.regs.r0 &= self.operand(1),
            Opcode::Je0 => {
                let imm = self.operand(1);
                return self.jump_if(self.regs.r0 == imm, 2);
            }
            Opcode::C01 => self.regs.r1 = self.regs.r0,
            Opcode::C02 => self.regs.r2 = self.regs.r0,
            Opcode::Irw => match self.regs.r1.checked_add(1) {
                Some(r1) => self.regs.r1 = r1,
                None => {
                    self.regs.r1 = 0xFF;
                    self.regs.r2 = self.regs.r2.saturating_add(1);
                }
            },
            Opcode::Drw => self.sub_word(1),
            Opcode::X03 => std::mem::swap(&mut self.regs.r0, &mut self.regs.r3),
            Opcode::C03 => self.regs.r3 = self.regs.r0,
            Opcode::C30 => self.regs.r0 = self.regs.r3,
            // Literal shift directions; the high bit falls off to keep R0 8-bit.
            Opcode::Pl0 => self.regs.r0 <<= 1,
            Opcode::Pr0 => self.regs.r0 >>= 1,
            Opcode::Hlt => self.regs.hlt = true,
        }
        self.advance(op.size());
    }
}

impl<M: MemoryRetro24> crate::Cpu for CpuRetro24<M> {
    type Error = CpuError;

    fn reset(&mut self) {
        self.reset();
    }

    fn step(&mut self) -> Result<u32, CpuError> {
        self.cycle().map(|_| 1)
    }

    fn halted(&self) -> bool {
        self.halted()
    }
}

/// Flat 64KB memory for tests and benchmarks
#[derive(Debug)]
pub struct ArrayMemory {
    pub data: Vec<u8>,
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: vec![0; 0x10000],
        }
    }

    /// Copy `data` into memory starting at `offset`
    pub fn load_program(&mut self, offset: u16, data: &[u8]) {
        let off = offset as usize;
        self.data[off..off + data.len()].copy_from_slice(data);
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRetro24 for ArrayMemory {
    fn read(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize] = val;
    }
}
