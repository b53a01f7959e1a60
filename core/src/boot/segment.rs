use std::fmt;
use std::path::Path;

use log::{debug, warn};

use crate::error::BootError;

/// A contiguous block of bytes destined for main memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSegment {
    pub name: String,
    pub origin: u16,
    pub data: Vec<u8>,
    /// Explicit entry point carried by the image, if any.
    pub run_address: Option<u16>,
}

impl BootSegment {
    pub fn new(origin: u16, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: String::new(),
            origin,
            data: data.into(),
            run_address: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_run_address(mut self, addr: u16) -> Self {
        self.run_address = Some(addr);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for BootSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.origin as usize + self.data.len();
        if self.name.is_empty() {
            write!(f, "${:04x}-${end:04x}", self.origin)
        } else {
            write!(f, "{} ${:04x}-${end:04x}", self.name, self.origin)
        }
    }
}

/// Parser/writer for a bootable disk image format.
pub trait DiskImageFormat {
    /// File extension used for temporary boot images.
    fn extension(&self) -> &str;

    /// Split image bytes into segments. `path` is used for error messages.
    fn parse_bytes(&self, path: &Path, data: &[u8]) -> Result<Vec<BootSegment>, BootError>;

    /// Serialize segments into an image that [`parse_bytes`](Self::parse_bytes)
    /// reads back with the same origins and data. A run address attribute is
    /// written in whatever form the format uses for entry points.
    fn encode(&self, segments: &[BootSegment]) -> Vec<u8>;

    fn parse(&self, path: &Path) -> Result<Vec<BootSegment>, BootError> {
        let data = std::fs::read(path)?;
        self.parse_bytes(path, &data)
    }
}

/// First segment with a nonzero origin: a sensible boot target when the
/// caller does not name one.
pub fn find_default_boot_segment(segments: &[BootSegment]) -> Option<&BootSegment> {
    segments.iter().find(|s| s.origin > 0)
}

/// Entry point for a parsed image: the first explicit run address, else the
/// origin of the first segment.
pub fn run_address(segments: &[BootSegment]) -> Option<u16> {
    segments
        .iter()
        .find_map(|s| s.run_address)
        .or_else(|| segments.first().map(|s| s.origin))
}

/// Copy `segment` into `memory` at its origin. Bytes past the end of memory
/// are dropped. Returns the number of bytes copied.
pub fn copy_segment(memory: &mut [u8], segment: &BootSegment) -> usize {
    let start = segment.origin as usize;
    if start >= memory.len() {
        warn!("segment {segment} lies outside {}-byte memory", memory.len());
        return 0;
    }
    let count = segment.data.len().min(memory.len() - start);
    if count < segment.data.len() {
        warn!(
            "segment {segment} truncated: {} bytes past end of memory",
            segment.data.len() - count
        );
    }
    debug!("Copying {segment} to memory: ${start:04x}-${:04x}", start + count);
    memory[start..start + count].copy_from_slice(&segment.data[..count]);
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_boot_segment_skips_zero_origin() {
        let segments = vec![
            BootSegment::new(0, vec![1, 2]),
            BootSegment::new(0x600, vec![3]),
            BootSegment::new(0x2000, vec![4]),
        ];
        assert_eq!(
            find_default_boot_segment(&segments).map(|s| s.origin),
            Some(0x600)
        );
        assert!(find_default_boot_segment(&segments[..1]).is_none());
        assert!(find_default_boot_segment(&[]).is_none());
    }

    #[test]
    fn run_address_prefers_explicit_attribute() {
        let segments = vec![
            BootSegment::new(0x2000, vec![0xEA]),
            BootSegment::new(0x3000, vec![0xEA]).with_run_address(0x3000),
            BootSegment::new(0x4000, vec![0xEA]).with_run_address(0x4000),
        ];
        assert_eq!(run_address(&segments), Some(0x3000));
        assert_eq!(run_address(&segments[..1]), Some(0x2000));
        assert_eq!(run_address(&[]), None);
    }

    #[test]
    fn copy_segment_leaves_rest_of_memory_untouched() {
        let mut memory = vec![0xEEu8; 0x10000];
        let copied = copy_segment(&mut memory, &BootSegment::new(0x2000, vec![1, 2, 3, 4]));
        assert_eq!(copied, 4);
        assert_eq!(memory[0x2000..0x2004], [1, 2, 3, 4]);
        assert_eq!(memory[0x1FFF], 0xEE);
        assert_eq!(memory[0x2004], 0xEE);
    }

    #[test]
    fn copy_segment_truncates_at_end_of_memory() {
        let mut memory = vec![0u8; 0x10000];
        let copied = copy_segment(&mut memory, &BootSegment::new(0xFFFE, vec![1, 2, 3, 4]));
        assert_eq!(copied, 2);
        assert_eq!(memory[0xFFFE..], [1, 2]);
        assert_eq!(memory[0], 0);
    }
}
