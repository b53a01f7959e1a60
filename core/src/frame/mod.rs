pub mod buffer;
pub mod cpu;
pub mod layout;

pub use buffer::{FrameStatus, FrameView, INPUT_LEN, InputBuffer, OutputBuffer, access};
pub use cpu::{CpuModel, M6502Registers};
pub use layout::{
    LAYOUT_VERSION, LayoutTable, MachineProfile, MemoryBlock, Region, compute_layout,
};
