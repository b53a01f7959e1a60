//! Byte layout of the output buffer shared with the native core.
//!
//! The output buffer is one contiguous byte region:
//!
//! ```text
//! +--------------------+  0
//! | status fields      |  STATUS_FIELDS_LEN bytes (counters, frame status, breakpoint id)
//! | memory access      |  u16 per address
//! | access type        |  u8 per address
//! +--------------------+  <- status header / payload boundary
//! | state              |  register block + main memory (+ reserved)
//! | video              |  width * height bytes
//! | audio              |  audio sample bytes
//! +--------------------+  total_len
//! ```
//!
//! The layout is computed once per [`MachineProfile`] and is immutable
//! afterward. Every accessor is a slice over a [`Region`].

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::frame::cpu::CpuModel;

/// Bumped whenever the byte layout changes; stored in save-state metadata.
pub const LAYOUT_VERSION: u32 = 1;

/// Largest address space an 8-bit CPU profile may declare.
pub const MAX_MEMORY_SIZE: usize = 1 << 16;

// Fixed status fields at the start of the buffer (all little-endian).
pub(crate) const CYCLES_SINCE_POWER_ON: usize = 0; // u64
pub(crate) const INSTRUCTIONS_SINCE_POWER_ON: usize = 8; // u64
pub(crate) const FRAME_NUMBER: usize = 16; // u32
pub(crate) const CURRENT_CYCLE_IN_FRAME: usize = 20; // u32
pub(crate) const FINAL_CYCLE_IN_FRAME: usize = 24; // u32
pub(crate) const CURRENT_INSTRUCTION_IN_FRAME: usize = 28; // u32
pub(crate) const FRAME_STATUS: usize = 32; // u8
pub(crate) const BREAKPOINT_ID: usize = 33; // u8
// Two unused padding bytes keep the per-address arrays 4-byte aligned.
pub const STATUS_FIELDS_LEN: usize = 36;

/// Size parameters of an emulated machine. Determines the output buffer
/// layout exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineProfile {
    pub name: String,
    pub cpu: CpuModel,
    /// Bytes of addressable main memory (at most 64KB).
    pub memory_size: usize,
    /// Bytes reserved for the state array: register block, main memory and
    /// any machine-specific trailer.
    pub state_size: usize,
    pub video_width: usize,
    pub video_height: usize,
    /// Bytes of audio sample data produced per frame.
    pub audio_size: usize,
}

impl MachineProfile {
    /// Profile of the generic 6502 machine: 64KB memory, 280x192 video,
    /// 2048 audio bytes, 256 state bytes beyond main memory.
    pub fn generic_6502() -> Self {
        Self {
            name: "generic6502".to_string(),
            cpu: CpuModel::Mos6502,
            memory_size: MAX_MEMORY_SIZE,
            state_size: MAX_MEMORY_SIZE + 256,
            video_width: 280,
            video_height: 192,
            audio_size: 2048,
        }
    }

    /// Saturates for dimensions that fail [`validate`](Self::validate).
    pub fn video_size(&self) -> usize {
        self.video_width.saturating_mul(self.video_height)
    }

    /// Total output buffer size this profile requires. Saturates for
    /// profiles that fail [`validate`](Self::validate).
    pub fn output_len(&self) -> usize {
        self.checked_output_len().unwrap_or(usize::MAX)
    }

    fn checked_output_len(&self) -> Option<usize> {
        let video = self.video_width.checked_mul(self.video_height)?;
        STATUS_FIELDS_LEN
            .checked_add(self.memory_size.checked_mul(3)?)?
            .checked_add(self.state_size)?
            .checked_add(video)?
            .checked_add(self.audio_size)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let invalid = |reason: String| LayoutError::InvalidProfile {
            profile: self.name.clone(),
            reason,
        };
        if self.memory_size == 0 || self.memory_size > MAX_MEMORY_SIZE {
            return Err(invalid(format!(
                "memory size {} not in 1..={MAX_MEMORY_SIZE}",
                self.memory_size
            )));
        }
        let needed = self.cpu.register_len() + self.memory_size;
        if self.state_size < needed {
            return Err(invalid(format!(
                "state size {} smaller than registers + memory ({needed})",
                self.state_size
            )));
        }
        if self.video_size() == 0 {
            return Err(invalid("video dimensions must be nonzero".to_string()));
        }
        if self.checked_output_len().is_none() {
            return Err(invalid(format!(
                "output buffer size overflows ({}x{} video, {} state, {} audio bytes)",
                self.video_width, self.video_height, self.state_size, self.audio_size
            )));
        }
        Ok(())
    }
}

/// Offset + length of a named sub-array within the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    /// Region nested inside this one, `offset` relative to our start.
    pub fn sub(&self, offset: usize, len: usize) -> Self {
        debug_assert!(offset + len <= self.len, "sub-region exceeds parent");
        Self::new(self.offset + offset, len)
    }
}

/// A named block of the save-state image, as presented to memory viewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub name: &'static str,
    pub region: Region,
}

/// Offsets of every named sub-array. Computed once by [`compute_layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutTable {
    pub version: u32,
    pub profile: MachineProfile,
    pub total_len: usize,
    pub status_fields: Region,
    pub memory_access: Region,
    pub access_type: Region,
    pub state: Region,
    pub video: Region,
    pub audio: Region,
    /// Register block at the start of `state`.
    pub registers: Region,
    /// Main memory, directly after the register block within `state`.
    pub main_memory: Region,
}

impl LayoutTable {
    /// Top-level regions in buffer order. Together they tile the buffer.
    pub fn regions(&self) -> [(&'static str, Region); 6] {
        [
            ("status", self.status_fields),
            ("memory_access", self.memory_access),
            ("access_type", self.access_type),
            ("state", self.state),
            ("video", self.video),
            ("audio", self.audio),
        ]
    }

    /// Status header: fixed fields plus both per-address access arrays.
    pub fn status_header(&self) -> Region {
        Region::new(0, self.state.offset)
    }

    /// Payload: state, video and audio.
    pub fn payload(&self) -> Region {
        Region::new(self.state.offset, self.total_len - self.state.offset)
    }

    /// Named blocks shown alongside main memory in save-state viewers.
    pub fn memory_blocks(&self) -> Vec<MemoryBlock> {
        vec![
            MemoryBlock {
                name: "Memory Access",
                region: self.memory_access,
            },
            MemoryBlock {
                name: "Access Type",
                region: self.access_type,
            },
            MemoryBlock {
                name: "Video Frame",
                region: self.video,
            },
            MemoryBlock {
                name: "Audio Data",
                region: self.audio,
            },
        ]
    }
}

/// Compute the layout for `profile` and check it against the size of the
/// buffer the native core expects.
///
/// Fails if the profile is invalid, if any sub-array would lie outside a
/// `buffer_len`-byte buffer, or if the regions do not fill it exactly.
pub fn compute_layout(
    profile: &MachineProfile,
    buffer_len: usize,
) -> Result<LayoutTable, LayoutError> {
    profile.validate()?;

    let mut cursor = 0;
    let mut next = |len: usize| {
        let region = Region::new(cursor, len);
        cursor += len;
        region
    };
    let status_fields = next(STATUS_FIELDS_LEN);
    let memory_access = next(profile.memory_size * 2);
    let access_type = next(profile.memory_size);
    let state = next(profile.state_size);
    let video = next(profile.video_size());
    let audio = next(profile.audio_size);

    let register_len = profile.cpu.register_len();
    let table = LayoutTable {
        version: LAYOUT_VERSION,
        profile: profile.clone(),
        total_len: audio.end(),
        status_fields,
        memory_access,
        access_type,
        state,
        video,
        audio,
        registers: state.sub(0, register_len),
        main_memory: state.sub(register_len, profile.memory_size),
    };

    for (name, region) in table.regions() {
        if region.end() > buffer_len {
            return Err(LayoutError::RegionOutOfBounds {
                name,
                offset: region.offset,
                len: region.len,
                buffer_len,
            });
        }
    }
    if table.total_len != buffer_len {
        return Err(LayoutError::SizeMismatch {
            expected: table.total_len,
            actual: buffer_len,
        });
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_profile() -> MachineProfile {
        MachineProfile {
            name: "small".to_string(),
            cpu: CpuModel::Mos6502,
            memory_size: 0x100,
            state_size: 0x100 + 16,
            video_width: 8,
            video_height: 4,
            audio_size: 16,
        }
    }

    fn assert_tiles(table: &LayoutTable) {
        let mut expected_offset = 0;
        for (name, region) in table.regions() {
            assert_eq!(region.offset, expected_offset, "{name} leaves a gap");
            expected_offset = region.end();
        }
        assert_eq!(expected_offset, table.total_len);
    }

    #[test]
    fn regions_tile_buffer_for_every_profile() {
        for profile in [MachineProfile::generic_6502(), small_profile()] {
            let table = compute_layout(&profile, profile.output_len()).unwrap();
            assert_tiles(&table);
            assert_eq!(
                table.status_header().len + table.payload().len,
                table.total_len
            );
        }
    }

    #[test]
    fn generic_6502_offsets() {
        let profile = MachineProfile::generic_6502();
        let table = compute_layout(&profile, profile.output_len()).unwrap();
        assert_eq!(table.memory_access, Region::new(36, 0x20000));
        assert_eq!(table.access_type, Region::new(36 + 0x20000, 0x10000));
        assert_eq!(table.state.offset, 36 + 0x30000);
        assert_eq!(table.state.len, 0x10100);
        assert_eq!(table.video.len, 280 * 192);
        assert_eq!(table.audio.len, 2048);
        assert_eq!(table.status_header().len, table.state.offset);
    }

    #[test]
    fn registers_and_memory_nest_in_state() {
        let profile = small_profile();
        let table = compute_layout(&profile, profile.output_len()).unwrap();
        assert_eq!(table.registers.offset, table.state.offset);
        assert_eq!(table.registers.len, 7);
        assert_eq!(table.main_memory.offset, table.state.offset + 7);
        assert!(table.main_memory.end() <= table.state.end());
    }

    #[test]
    fn short_buffer_reports_region_out_of_bounds() {
        let profile = small_profile();
        let err = compute_layout(&profile, profile.output_len() - 1).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::RegionOutOfBounds { name: "audio", .. }
        ));
    }

    #[test]
    fn long_buffer_reports_size_mismatch() {
        let profile = small_profile();
        let err = compute_layout(&profile, profile.output_len() + 4).unwrap_err();
        assert_eq!(
            err,
            LayoutError::SizeMismatch {
                expected: profile.output_len(),
                actual: profile.output_len() + 4,
            }
        );
    }

    #[test]
    fn state_smaller_than_memory_is_invalid() {
        let mut profile = small_profile();
        profile.state_size = 0x80;
        assert!(matches!(
            compute_layout(&profile, profile.output_len()),
            Err(LayoutError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn oversized_dimensions_are_invalid() {
        let mut profile = small_profile();
        profile.video_width = usize::MAX;
        profile.video_height = 2;
        assert_eq!(profile.output_len(), usize::MAX);
        assert!(matches!(
            compute_layout(&profile, 1024),
            Err(LayoutError::InvalidProfile { .. })
        ));

        let mut profile = small_profile();
        profile.audio_size = usize::MAX - 8;
        assert!(matches!(
            profile.validate(),
            Err(LayoutError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn memory_blocks_cover_access_video_audio() {
        let profile = small_profile();
        let table = compute_layout(&profile, profile.output_len()).unwrap();
        let names: Vec<_> = table.memory_blocks().iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            vec!["Memory Access", "Access Type", "Video Frame", "Audio Data"]
        );
        assert_eq!(table.memory_blocks()[2].region, table.video);
    }
}
