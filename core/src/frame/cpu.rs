//! CPU register block stored at the start of the state array.

use std::fmt;

use serde::{Deserialize, Serialize};

/// CPU family of a machine profile. Determines the register block layout
/// at the start of the state array; main memory follows immediately after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuModel {
    Mos6502,
}

impl CpuModel {
    /// Size in bytes of the register block.
    pub fn register_len(self) -> usize {
        match self {
            Self::Mos6502 => M6502Registers::LEN,
        }
    }

    /// Decode the register block and format it for status displays.
    pub fn status_text(self, registers: &[u8]) -> String {
        match self {
            Self::Mos6502 => M6502Registers::from_bytes(registers).to_string(),
        }
    }

    pub fn program_counter(self, registers: &[u8]) -> u16 {
        match self {
            Self::Mos6502 => M6502Registers::from_bytes(registers).pc,
        }
    }

    pub fn set_program_counter(self, registers: &mut [u8], pc: u16) {
        match self {
            Self::Mos6502 => {
                let mut regs = M6502Registers::from_bytes(registers);
                regs.pc = pc;
                regs.write_to(registers);
            }
        }
    }
}

/// 6502 register block: PC (little-endian), A, X, Y, SP, P.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct M6502Registers {
    pub pc: u16, // Program counter
    pub a: u8,   // Accumulator
    pub x: u8,   // X index register
    pub y: u8,   // Y index register
    pub sp: u8,  // Stack pointer (0xFF based)
    pub p: u8,   // Status register (flags)
}

impl M6502Registers {
    pub const LEN: usize = 7;

    /// Power-on register values.
    pub fn power_on() -> Self {
        Self {
            sp: 0xFF,
            ..Self::default()
        }
    }

    /// Decode from a register block. Panics if `bytes` is shorter than
    /// [`Self::LEN`]; layout regions guarantee the length.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            pc: u16::from_le_bytes([bytes[0], bytes[1]]),
            a: bytes[2],
            x: bytes[3],
            y: bytes[4],
            sp: bytes[5],
            p: bytes[6],
        }
    }

    pub fn write_to(&self, bytes: &mut [u8]) {
        bytes[0..2].copy_from_slice(&self.pc.to_le_bytes());
        bytes[2] = self.a;
        bytes[3] = self.x;
        bytes[4] = self.y;
        bytes[5] = self.sp;
        bytes[6] = self.p;
    }
}

impl fmt::Display for M6502Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A={:02x} X={:02x} Y={:02x} SP={:02x} P={:02x} PC={:04x}",
            self.a, self.x, self.y, self.sp, self.p, self.pc
        )
    }
}
