//! Frame-timed reference host with a 6502 register block and 64KB of RAM.
//!
//! Instruction semantics are not modelled: every byte executes as a one-byte,
//! two-cycle no-op that advances PC (wrapping at $FFFF). Everything else a
//! native core owes the session is real: frame timing from the clock and
//! refresh rate, execute-access tracking, breakpoints and watchpoints,
//! instruction-count step halts with mid-frame resumption, and state
//! restore.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use omniframe_core::debugger::{Debugger, StepRequest};
use omniframe_core::error::{EmulatorError, Result};
use omniframe_core::frame::{
    FrameStatus, FrameView, InputBuffer, M6502Registers, MachineProfile, OutputBuffer, access,
};
use omniframe_core::native::NativeCore;

use crate::registry::MachineEntry;

const MEMORY_SIZE: usize = 0x10000;
const CYCLES_PER_INSTRUCTION: u32 = 2;
/// The video frame mirrors memory from here.
pub const VIDEO_BASE: usize = 0x2000;
const AUDIO_SILENCE: u8 = 0x80;
const DRIVES: u8 = 8;

pub const DEFAULT_FREQUENCY_MHZ: f64 = 1.0;
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

pub struct Generic6502 {
    profile: MachineProfile,
    regs: M6502Registers,
    memory: Vec<u8>,
    frequency_mhz: f64,
    refresh_hz: f64,
    cycles_per_frame: u32,
    reset_pc: u16,
    disks: BTreeMap<u8, PathBuf>,
}

impl Default for Generic6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Generic6502 {
    pub fn new() -> Self {
        let mut core = Self {
            profile: MachineProfile::generic_6502(),
            regs: M6502Registers::power_on(),
            memory: vec![0; MEMORY_SIZE],
            frequency_mhz: DEFAULT_FREQUENCY_MHZ,
            refresh_hz: DEFAULT_REFRESH_HZ,
            cycles_per_frame: 0,
            reset_pc: 0,
            disks: BTreeMap::new(),
        };
        core.cycles_per_frame = core.compute_cycles_per_frame();
        core
    }

    fn compute_cycles_per_frame(&self) -> u32 {
        (self.frequency_mhz * 1_000_000.0 / self.refresh_hz) as u32
    }

    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    pub fn registers(&self) -> M6502Registers {
        self.regs
    }

    pub fn disk(&self, drive: u8) -> Option<&Path> {
        self.disks.get(&drive).map(PathBuf::as_path)
    }

    fn apply_arg(&mut self, arg: &str) -> Result<()> {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| EmulatorError::Native(format!("expected key=value, got '{arg}'")))?;
        let number: f64 = value
            .trim()
            .parse()
            .map_err(|e| EmulatorError::Native(format!("{key}: {e}")))?;
        if !(number.is_finite() && number > 0.0) {
            return Err(EmulatorError::Native(format!("{key} must be positive")));
        }
        match key.trim() {
            "frequency_mhz" => self.frequency_mhz = number,
            "refresh_hz" => self.refresh_hz = number,
            other => {
                return Err(EmulatorError::Native(format!(
                    "unknown generic6502 option '{other}'"
                )));
            }
        }
        Ok(())
    }

    /// Copy registers and memory into the state array.
    fn write_state(&self, output: &mut OutputBuffer) {
        self.regs.write_to(output.registers_mut());
        output.main_memory_mut().copy_from_slice(&self.memory);
    }

    fn render(&self, output: &mut OutputBuffer) {
        let video = output.video_mut();
        let src = &self.memory[VIDEO_BASE..];
        let n = video.len().min(src.len());
        video[..n].copy_from_slice(&src[..n]);
        output.audio_mut().fill(AUDIO_SILENCE);
    }
}

/// Per-frame counters, loaded from and stored back to the status header.
struct FrameClock {
    cycles_since_power_on: u64,
    instructions_since_power_on: u64,
    frame_number: u32,
    cycle: u32,
    instruction: u32,
}

impl FrameClock {
    fn load(view: FrameView<'_>) -> Self {
        Self {
            cycles_since_power_on: view.cycles_since_power_on(),
            instructions_since_power_on: view.instructions_since_power_on(),
            frame_number: view.frame_number(),
            cycle: view.current_cycle_in_frame(),
            instruction: view.current_instruction_in_frame(),
        }
    }

    fn store(&self, output: &mut OutputBuffer) {
        output.set_cycles_since_power_on(self.cycles_since_power_on);
        output.set_instructions_since_power_on(self.instructions_since_power_on);
        output.set_frame_number(self.frame_number);
        output.set_current_cycle_in_frame(self.cycle);
        output.set_current_instruction_in_frame(self.instruction);
    }

    fn tick(&mut self, cycles: u32) {
        self.cycle += cycles;
        self.instruction += 1;
        self.cycles_since_power_on += cycles as u64;
        self.instructions_since_power_on += 1;
    }
}

impl NativeCore for Generic6502 {
    fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    fn clear_state_arrays(&mut self, input: &mut InputBuffer, output: &mut OutputBuffer) {
        *input = InputBuffer::new();
        output.clear();
        self.memory.fill(0);
        self.regs = M6502Registers::power_on();
    }

    fn start_emulator(&mut self, args: &[String]) -> Result<()> {
        for arg in args {
            self.apply_arg(arg)?;
        }
        self.cycles_per_frame = self.compute_cycles_per_frame();
        if self.cycles_per_frame < CYCLES_PER_INSTRUCTION {
            return Err(EmulatorError::Native(format!(
                "{} MHz at {} Hz leaves no room for an instruction per frame",
                self.frequency_mhz, self.refresh_hz
            )));
        }
        info!(
            "generic6502: {} MHz, {} Hz, {} cycles per frame",
            self.frequency_mhz, self.refresh_hz, self.cycles_per_frame
        );
        Ok(())
    }

    fn configure_state_arrays(&mut self, _input: &InputBuffer, output: &mut OutputBuffer) {
        output.set_frame_status(FrameStatus::Start);
        output.set_cycles_since_power_on(0);
        output.set_instructions_since_power_on(0);
        output.set_final_cycle_in_frame(self.cycles_per_frame - 1);
        self.write_state(output);
    }

    fn next_frame(
        &mut self,
        _input: &InputBuffer,
        output: &mut OutputBuffer,
        debugger: &Debugger,
    ) -> Result<()> {
        let view = output.view();
        let resuming = !view.is_frame_finished() && view.current_cycle_in_frame() > 0;
        let mut clock = FrameClock::load(view);
        if !resuming {
            clock.cycle = 0;
            clock.instruction = 0;
        }
        let final_cycle = self.cycles_per_frame - 1;
        output.set_final_cycle_in_frame(final_cycle);
        output.set_breakpoint_id(0);

        // A step always makes progress, so a zero count means one instruction.
        let limit = match debugger.step_request() {
            Some(StepRequest::Instructions(n)) => Some(n.max(1)),
            None => None,
        };
        let mut executed = 0u32;

        let halt = loop {
            let pc = self.regs.pc;
            output.mark_access(pc, clock.frame_number, access::EXECUTE);
            self.regs.pc = pc.wrapping_add(1);
            clock.tick(CYCLES_PER_INSTRUCTION);
            executed += 1;

            if let Some(id) = debugger.watchpoint_hit(pc, access::READ | access::EXECUTE) {
                break Some((FrameStatus::Watchpoint, id));
            }
            if let Some(id) = debugger.breakpoint_at(self.regs.pc) {
                break Some((FrameStatus::Breakpoint, id));
            }
            if clock.cycle >= final_cycle {
                break None;
            }
            if limit.is_some_and(|n| executed >= n) {
                debug!(
                    "step halt after {executed} instructions at ${:04x}",
                    self.regs.pc
                );
                break Some((FrameStatus::Start, 0));
            }
        };

        match halt {
            Some((status, id)) => {
                output.set_frame_status(status);
                output.set_breakpoint_id(id);
            }
            None => {
                clock.frame_number = clock.frame_number.wrapping_add(1);
                output.set_frame_status(FrameStatus::Finished);
                self.render(output);
            }
        }
        clock.store(output);
        self.write_state(output);
        Ok(())
    }

    fn restore_state(&mut self, snapshot: FrameView<'_>) -> Result<()> {
        let memory = snapshot.main_memory();
        if memory.len() != self.memory.len() {
            return Err(EmulatorError::Native(format!(
                "snapshot holds {} bytes of memory, machine has {}",
                memory.len(),
                self.memory.len()
            )));
        }
        self.memory.copy_from_slice(memory);
        self.regs = M6502Registers::from_bytes(snapshot.registers());
        Ok(())
    }

    fn load_disk(&mut self, drive: u8, path: &Path) -> Result<()> {
        if drive >= DRIVES {
            return Err(EmulatorError::Native(format!(
                "drive {drive} out of range (0..{DRIVES})"
            )));
        }
        if !path.is_file() {
            return Err(EmulatorError::Native(format!(
                "{}: no such disk image",
                path.display()
            )));
        }
        debug!("drive {drive}: {}", path.display());
        self.disks.insert(drive, path.to_path_buf());
        Ok(())
    }

    /// Power-on: counters and access history reset, memory kept, registers
    /// back to power-on values except PC, which becomes the reset address.
    fn coldstart(&mut self, output: &mut OutputBuffer) -> Result<()> {
        self.reset_pc = self.regs.pc;
        self.regs = M6502Registers {
            pc: self.reset_pc,
            ..M6502Registers::power_on()
        };
        FrameClock {
            cycles_since_power_on: 0,
            instructions_since_power_on: 0,
            frame_number: 0,
            cycle: 0,
            instruction: 0,
        }
        .store(output);
        output.set_frame_status(FrameStatus::Start);
        output.set_breakpoint_id(0);
        output.clear_access_history();
        self.write_state(output);
        Ok(())
    }

    /// Reset button: back to the cold-start address, abandoning any
    /// partially executed frame.
    fn warmstart(&mut self, output: &mut OutputBuffer) -> Result<()> {
        self.regs.pc = self.reset_pc;
        self.regs.sp = 0xFF;
        output.set_current_cycle_in_frame(0);
        output.set_current_instruction_in_frame(0);
        output.set_frame_status(FrameStatus::Start);
        output.set_breakpoint_id(0);
        self.write_state(output);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Machine registry
// ---------------------------------------------------------------------------

fn create_machine() -> Box<dyn NativeCore> {
    Box::new(Generic6502::new())
}

inventory::submit! {
    MachineEntry::new(
        "generic6502",
        "64KB 6502 reference host, bytes execute as 2-cycle no-ops",
        create_machine,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_is_one_mhz_at_sixty_hz() {
        assert_eq!(Generic6502::new().cycles_per_frame(), 16_666);
    }

    #[test]
    fn start_emulator_parses_timing_args() {
        let mut core = Generic6502::new();
        core.start_emulator(&["frequency_mhz=1.79".into(), "refresh_hz=59.94".into()])
            .unwrap();
        assert_eq!(core.cycles_per_frame(), (1.79e6 / 59.94) as u32);
    }

    #[test]
    fn start_emulator_rejects_bad_args() {
        for arg in ["turbo=1", "frequency_mhz", "refresh_hz=abc", "refresh_hz=0"] {
            let mut core = Generic6502::new();
            assert!(core.start_emulator(&[arg.to_string()]).is_err(), "{arg}");
        }
    }

    #[test]
    fn load_disk_checks_drive_and_file() {
        let mut core = Generic6502::new();
        let path = std::env::temp_dir().join("omniframe_generic6502_disk.xex");
        std::fs::write(&path, [0xFF, 0xFF]).unwrap();
        assert!(core.load_disk(DRIVES, &path).is_err());
        core.load_disk(1, &path).unwrap();
        assert_eq!(core.disk(1), Some(path.as_path()));
        std::fs::remove_file(&path).unwrap();
        assert!(core.load_disk(0, &path).is_err());
    }
}
