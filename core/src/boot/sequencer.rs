//! Temporary boot images and image-to-memory loading.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

use super::segment::{self, BootSegment, DiskImageFormat};
use crate::error::BootError;
use crate::frame::OutputBuffer;

static BOOTFILE_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Segments parsed from an image plus the address execution starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImage {
    pub path: PathBuf,
    pub segments: Vec<BootSegment>,
    pub run_address: u16,
}

impl BootImage {
    /// Copy every segment into main memory and point the CPU at the run
    /// address. Returns the number of bytes copied.
    pub fn apply(&self, output: &mut OutputBuffer) -> usize {
        let memory = output.main_memory_mut();
        let copied = self
            .segments
            .iter()
            .map(|seg| segment::copy_segment(memory, seg))
            .sum();
        output.set_program_counter(self.run_address);
        debug!(
            "booted {}: {copied} bytes, running at ${:04x}",
            self.path.display(),
            self.run_address
        );
        copied
    }
}

/// Owns the temporary backing file for in-memory boot images and turns
/// image files into [`BootImage`]s.
pub struct BootSequencer {
    format: Box<dyn DiskImageFormat>,
    bootfile: Option<PathBuf>,
}

impl BootSequencer {
    pub fn new(format: Box<dyn DiskImageFormat>) -> Self {
        Self {
            format,
            bootfile: None,
        }
    }

    /// Temporary image written by the last in-memory boot, if still present.
    pub fn bootfile(&self) -> Option<&Path> {
        self.bootfile.as_deref()
    }

    /// Delete the temporary boot image. Failure is logged, not returned.
    pub fn release_bootfile(&mut self) {
        if let Some(path) = self.bootfile.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("removed temporary boot file {}", path.display()),
                Err(e) => warn!("Unable to remove temporary boot file {}: {e}", path.display()),
            }
        }
    }

    /// Replace any previous temporary image with `data`.
    pub fn stage_raw(&mut self, data: &[u8]) -> Result<PathBuf, BootError> {
        self.release_bootfile();
        let path = std::env::temp_dir().join(format!(
            "omniframe-{}-{}.boot.{}",
            std::process::id(),
            BOOTFILE_SERIAL.fetch_add(1, Ordering::Relaxed),
            self.format.extension()
        ));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(data)?;
        debug!(
            "Created temporary file {} to use as boot disk image",
            path.display()
        );
        self.bootfile = Some(path.clone());
        Ok(path)
    }

    /// Serialize the bytes of `segment` into a temporary image in this
    /// sequencer's format. The run address attribute is not written; the
    /// caller owns it.
    pub fn stage_segment(&mut self, segment: &BootSegment) -> Result<PathBuf, BootError> {
        let bare = BootSegment {
            run_address: None,
            ..segment.clone()
        };
        let image = self.format.encode(std::slice::from_ref(&bare));
        self.stage_raw(&image)
    }

    /// Parse `path` and determine its run address. Memory is not touched, so
    /// a failure here leaves the machine as it was.
    pub fn load(&self, path: &Path) -> Result<BootImage, BootError> {
        let segments = self.format.parse(path)?;
        let run_address =
            segment::run_address(&segments).ok_or_else(|| BootError::NoSegments(path.to_path_buf()))?;
        Ok(BootImage {
            path: path.to_path_buf(),
            segments,
            run_address,
        })
    }
}

impl Drop for BootSequencer {
    fn drop(&mut self) {
        self.release_bootfile();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::BinaryLoadFormat;
    use crate::frame::{MachineProfile, compute_layout};
    use std::sync::Arc;

    fn output() -> OutputBuffer {
        let profile = MachineProfile::generic_6502();
        let len = profile.output_len();
        OutputBuffer::new(Arc::new(compute_layout(&profile, len).unwrap()))
    }

    #[test]
    fn staged_segment_loads_back() {
        let mut seq = BootSequencer::new(Box::new(BinaryLoadFormat));
        let seg = BootSegment::new(0x2000, vec![1, 2, 3, 4]);
        let path = seq.stage_segment(&seg).unwrap();
        assert!(path.exists());
        let image = seq.load(&path).unwrap();
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.run_address, 0x2000);
    }

    #[test]
    fn staged_segment_omits_run_address() {
        let mut seq = BootSequencer::new(Box::new(BinaryLoadFormat));
        let seg = BootSegment::new(0x2000, vec![1, 2]).with_run_address(0x2001);
        let path = seq.stage_segment(&seg).unwrap();
        let image = seq.load(&path).unwrap();
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.run_address, 0x2000);
    }

    #[test]
    fn release_tolerates_missing_file() {
        let mut seq = BootSequencer::new(Box::new(BinaryLoadFormat));
        let path = seq.stage_raw(&[0xFF, 0xFF]).unwrap();
        std::fs::remove_file(&path).unwrap();
        seq.release_bootfile();
        assert!(seq.bootfile().is_none());
        assert!(seq.stage_raw(&[0xFF, 0xFF]).is_ok());
    }

    #[test]
    fn restaging_removes_previous_file() {
        let mut seq = BootSequencer::new(Box::new(BinaryLoadFormat));
        let first = seq.stage_raw(&[0xFF, 0xFF]).unwrap();
        let second = seq.stage_raw(&[0xFF, 0xFF]).unwrap();
        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());
        seq.release_bootfile();
        assert!(!second.exists());
        assert!(seq.bootfile().is_none());
    }

    #[test]
    fn drop_removes_bootfile() {
        let path = {
            let mut seq = BootSequencer::new(Box::new(BinaryLoadFormat));
            seq.stage_raw(&[0xFF, 0xFF]).unwrap()
        };
        assert!(!path.exists());
    }

    #[test]
    fn apply_copies_segments_and_sets_pc() {
        let mut out = output();
        let image = BootImage {
            path: PathBuf::from("mem"),
            segments: vec![BootSegment::new(0x0600, vec![0xA9, 0x05])],
            run_address: 0x0600,
        };
        assert_eq!(image.apply(&mut out), 2);
        let view = out.view();
        assert_eq!(view.main_memory()[0x0600..0x0602], [0xA9, 0x05]);
        assert_eq!(view.program_counter(), 0x0600);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let seq = BootSequencer::new(Box::new(BinaryLoadFormat));
        let path = std::env::temp_dir().join("omniframe_no_such_image.xex");
        assert!(matches!(seq.load(&path), Err(BootError::Io(_))));
    }
}
