pub mod boot;
pub mod debugger;
pub mod error;
pub mod events;
pub mod frame;
pub mod history;
pub mod native;
pub mod savestate;
pub mod session;

pub mod prelude {
    pub use crate::boot::{BootSegment, find_default_boot_segment};
    pub use crate::debugger::{BreakCondition, Debugger, StepRequest};
    pub use crate::error::{EmulatorError, Result};
    pub use crate::frame::{
        FrameStatus, FrameView, InputBuffer, LayoutTable, MachineProfile, OutputBuffer, access,
    };
    pub use crate::history::RetentionPolicy;
    pub use crate::native::NativeCore;
    pub use crate::session::{EmulatorSession, InputEvent, SessionConfig, SessionPhase};
}
