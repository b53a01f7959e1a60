//! Loading executable images into emulated memory.

pub mod binload;
pub mod segment;
pub mod sequencer;

pub use binload::BinaryLoadFormat;
pub use segment::{BootSegment, DiskImageFormat, copy_segment, find_default_boot_segment, run_address};
pub use sequencer::{BootImage, BootSequencer};
