//! Input and output buffers exchanged with the native core.

use std::sync::Arc;

use crate::error::{EmulatorError, LayoutError, Result};
use crate::frame::layout::{self, LayoutTable, Region};

/// Per-address access type flags written into the access type array.
pub mod access {
    pub const READ: u8 = 1;
    pub const WRITE: u8 = 2;
    pub const EXECUTE: u8 = 4;
    pub const VIDEO: u8 = 8;
    pub const DISPLAY_LIST: u8 = 16;
}

/// Outcome of the most recent native step. Values match the native core's
/// status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameStatus {
    Start = 0,
    Finished = 1,
    Breakpoint = 2,
    Watchpoint = 3,
}

impl TryFrom<u8> for FrameStatus {
    type Error = EmulatorError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Start),
            1 => Ok(Self::Finished),
            2 => Ok(Self::Breakpoint),
            3 => Ok(Self::Watchpoint),
            other => Err(EmulatorError::Consistency(format!(
                "native core reported undefined frame status {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// InputBuffer
// ---------------------------------------------------------------------------

const KEYCHAR: usize = 0;
const KEYCODE: usize = 1;
const SPECIAL: usize = 2;
const JOYSTICK: usize = 3; // two sticks, one direction byte each
const TRIGGER: usize = 5; // bit per stick
pub const INPUT_LEN: usize = 8;

/// Fixed-size record read by the native core each step.
///
/// Only one of key character, key code and special key is active at a time;
/// setting one clears the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    raw: [u8; INPUT_LEN],
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Overwrite from a saved input record. Extra bytes are ignored, missing
    /// bytes are zeroed.
    pub fn load_from(&mut self, src: &[u8]) {
        self.raw = [0; INPUT_LEN];
        let len = src.len().min(INPUT_LEN);
        self.raw[..len].copy_from_slice(&src[..len]);
    }

    pub fn keychar(&self) -> u8 {
        self.raw[KEYCHAR]
    }

    pub fn keycode(&self) -> u8 {
        self.raw[KEYCODE]
    }

    pub fn special(&self) -> u8 {
        self.raw[SPECIAL]
    }

    pub fn send_char(&mut self, key_char: u8) {
        self.set_keys(key_char, 0, 0);
    }

    pub fn send_keycode(&mut self, keycode: u8) {
        self.set_keys(0, keycode, 0);
    }

    pub fn send_special_key(&mut self, key_id: u8) {
        self.set_keys(0, 0, key_id);
    }

    pub fn clear_keys(&mut self) {
        self.set_keys(0, 0, 0);
    }

    fn set_keys(&mut self, key_char: u8, keycode: u8, special: u8) {
        self.raw[KEYCHAR] = key_char;
        self.raw[KEYCODE] = keycode;
        self.raw[SPECIAL] = special;
    }

    /// Set stick direction bits and trigger state. Sticks beyond the second
    /// are ignored.
    pub fn set_joystick(&mut self, stick: usize, direction: u8, trigger: bool) {
        if stick > 1 {
            return;
        }
        self.raw[JOYSTICK + stick] = direction;
        let bit = 1 << stick;
        if trigger {
            self.raw[TRIGGER] |= bit;
        } else {
            self.raw[TRIGGER] &= !bit;
        }
    }

    pub fn joystick(&self, stick: usize) -> (u8, bool) {
        if stick > 1 {
            return (0, false);
        }
        (
            self.raw[JOYSTICK + stick],
            self.raw[TRIGGER] & (1 << stick) != 0,
        )
    }
}

// ---------------------------------------------------------------------------
// FrameView (read-only over any output-shaped bytes)
// ---------------------------------------------------------------------------

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(raw: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&raw[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Read-only view of an output buffer or a stored snapshot of one.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    raw: &'a [u8],
    layout: &'a LayoutTable,
}

impl<'a> FrameView<'a> {
    /// Wrap `raw` with `layout`. Fails if the lengths disagree.
    pub fn new(raw: &'a [u8], layout: &'a LayoutTable) -> Result<Self> {
        if raw.len() != layout.total_len {
            return Err(LayoutError::SizeMismatch {
                expected: layout.total_len,
                actual: raw.len(),
            }
            .into());
        }
        Ok(Self { raw, layout })
    }

    pub fn layout(&self) -> &'a LayoutTable {
        self.layout
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    fn region(&self, region: Region) -> &'a [u8] {
        &self.raw[region.range()]
    }

    pub fn status_header(&self) -> &'a [u8] {
        self.region(self.layout.status_header())
    }

    pub fn payload(&self) -> &'a [u8] {
        self.region(self.layout.payload())
    }

    pub fn cycles_since_power_on(&self) -> u64 {
        read_u64(self.raw, layout::CYCLES_SINCE_POWER_ON)
    }

    pub fn instructions_since_power_on(&self) -> u64 {
        read_u64(self.raw, layout::INSTRUCTIONS_SINCE_POWER_ON)
    }

    pub fn frame_number(&self) -> u32 {
        read_u32(self.raw, layout::FRAME_NUMBER)
    }

    pub fn current_cycle_in_frame(&self) -> u32 {
        read_u32(self.raw, layout::CURRENT_CYCLE_IN_FRAME)
    }

    pub fn final_cycle_in_frame(&self) -> u32 {
        read_u32(self.raw, layout::FINAL_CYCLE_IN_FRAME)
    }

    pub fn current_instruction_in_frame(&self) -> u32 {
        read_u32(self.raw, layout::CURRENT_INSTRUCTION_IN_FRAME)
    }

    /// Raw status byte; see [`Self::frame_status`].
    pub fn frame_status_byte(&self) -> u8 {
        self.raw[layout::FRAME_STATUS]
    }

    pub fn frame_status(&self) -> Result<FrameStatus> {
        FrameStatus::try_from(self.frame_status_byte())
    }

    pub fn is_frame_finished(&self) -> bool {
        self.frame_status_byte() == FrameStatus::Finished as u8
    }

    pub fn breakpoint_id(&self) -> u8 {
        self.raw[layout::BREAKPOINT_ID]
    }

    /// Frame number (truncated to 16 bits) of the last access to `addr`.
    /// Addresses beyond main memory read as 0.
    pub fn memory_access(&self, addr: u16) -> u16 {
        if addr as usize >= self.layout.profile.memory_size {
            return 0;
        }
        let offset = self.layout.memory_access.offset + addr as usize * 2;
        u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]])
    }

    pub fn memory_access_bytes(&self) -> &'a [u8] {
        self.region(self.layout.memory_access)
    }

    pub fn access_type(&self) -> &'a [u8] {
        self.region(self.layout.access_type)
    }

    pub fn state(&self) -> &'a [u8] {
        self.region(self.layout.state)
    }

    pub fn registers(&self) -> &'a [u8] {
        self.region(self.layout.registers)
    }

    pub fn main_memory(&self) -> &'a [u8] {
        self.region(self.layout.main_memory)
    }

    pub fn video(&self) -> &'a [u8] {
        self.region(self.layout.video)
    }

    pub fn audio(&self) -> &'a [u8] {
        self.region(self.layout.audio)
    }

    pub fn program_counter(&self) -> u16 {
        self.layout.profile.cpu.program_counter(self.registers())
    }

    pub fn cpu_status(&self) -> String {
        self.layout.profile.cpu.status_text(self.registers())
    }
}

// ---------------------------------------------------------------------------
// OutputBuffer
// ---------------------------------------------------------------------------

/// The single contiguous output region, owned by the session and lent to
/// the native core for the duration of a step.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    raw: Vec<u8>,
    layout: Arc<LayoutTable>,
}

impl OutputBuffer {
    /// Allocate a zeroed buffer sized by `layout`.
    pub fn new(layout: Arc<LayoutTable>) -> Self {
        Self {
            raw: vec![0; layout.total_len],
            layout,
        }
    }

    pub fn layout(&self) -> &LayoutTable {
        &self.layout
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            raw: &self.raw,
            layout: &self.layout,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Copy of the full buffer: the unit of snapshotting.
    pub fn snapshot(&self) -> Box<[u8]> {
        self.raw.clone().into_boxed_slice()
    }

    /// Overwrite the whole buffer. Fails if `bytes` has a different length.
    pub fn overwrite(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.raw.len() {
            return Err(LayoutError::SizeMismatch {
                expected: self.raw.len(),
                actual: bytes.len(),
            }
            .into());
        }
        self.raw.copy_from_slice(bytes);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.raw.fill(0);
    }

    fn region_mut(&mut self, region: Region) -> &mut [u8] {
        &mut self.raw[region.range()]
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        self.raw[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_cycles_since_power_on(&mut self, value: u64) {
        self.write_u64(layout::CYCLES_SINCE_POWER_ON, value);
    }

    pub fn set_instructions_since_power_on(&mut self, value: u64) {
        self.write_u64(layout::INSTRUCTIONS_SINCE_POWER_ON, value);
    }

    pub fn set_frame_number(&mut self, value: u32) {
        self.write_u32(layout::FRAME_NUMBER, value);
    }

    pub fn set_current_cycle_in_frame(&mut self, value: u32) {
        self.write_u32(layout::CURRENT_CYCLE_IN_FRAME, value);
    }

    pub fn set_final_cycle_in_frame(&mut self, value: u32) {
        self.write_u32(layout::FINAL_CYCLE_IN_FRAME, value);
    }

    pub fn set_current_instruction_in_frame(&mut self, value: u32) {
        self.write_u32(layout::CURRENT_INSTRUCTION_IN_FRAME, value);
    }

    pub fn set_frame_status(&mut self, status: FrameStatus) {
        self.raw[layout::FRAME_STATUS] = status as u8;
    }

    pub fn set_breakpoint_id(&mut self, id: u8) {
        self.raw[layout::BREAKPOINT_ID] = id;
    }

    /// Record an access to `addr` during `frame_number`. Addresses beyond
    /// main memory are not tracked.
    pub fn mark_access(&mut self, addr: u16, frame_number: u32, access_type: u8) {
        if addr as usize >= self.layout.profile.memory_size {
            return;
        }
        let offset = self.layout.memory_access.offset + addr as usize * 2;
        self.raw[offset..offset + 2].copy_from_slice(&(frame_number as u16).to_le_bytes());
        let type_offset = self.layout.access_type.offset + addr as usize;
        self.raw[type_offset] = access_type;
    }

    /// Forget every recorded memory access.
    pub fn clear_access_history(&mut self) {
        let counters = self.layout.memory_access;
        let types = self.layout.access_type;
        self.region_mut(counters).fill(0);
        self.region_mut(types).fill(0);
    }

    pub fn registers_mut(&mut self) -> &mut [u8] {
        let region = self.layout.registers;
        self.region_mut(region)
    }

    pub fn main_memory_mut(&mut self) -> &mut [u8] {
        let region = self.layout.main_memory;
        self.region_mut(region)
    }

    pub fn video_mut(&mut self) -> &mut [u8] {
        let region = self.layout.video;
        self.region_mut(region)
    }

    pub fn audio_mut(&mut self) -> &mut [u8] {
        let region = self.layout.audio;
        self.region_mut(region)
    }

    pub fn set_program_counter(&mut self, pc: u16) {
        let cpu = self.layout.profile.cpu;
        cpu.set_program_counter(self.registers_mut(), pc);
    }
}
