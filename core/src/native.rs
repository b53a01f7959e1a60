use std::path::Path;

use log::debug;

use crate::debugger::Debugger;
use crate::error::Result;
use crate::frame::{FrameView, InputBuffer, MachineProfile, OutputBuffer};

/// Host interface to a native CPU engine.
///
/// Each emulated machine implements this trait so the session can drive it
/// one frame at a time without knowing how instructions are executed. The
/// engine reads the input buffer and writes the status header and payload of
/// the output buffer in place; it owns the output buffer only for the
/// duration of a call.
pub trait NativeCore {
    /// Size parameters that fix the output buffer layout.
    fn profile(&self) -> &MachineProfile;

    /// Output buffer length the engine was built for. Must agree with the
    /// layout computed from [`profile`](Self::profile).
    fn output_len(&self) -> usize {
        self.profile().output_len()
    }

    /// Zero-initialize both buffers for a fresh machine.
    fn clear_state_arrays(&mut self, input: &mut InputBuffer, output: &mut OutputBuffer);

    /// One-time bring-up with machine-specific arguments.
    fn start_emulator(&mut self, args: &[String]) -> Result<()>;

    /// Bind the engine to caller-owned buffers for all later steps.
    fn configure_state_arrays(&mut self, input: &InputBuffer, output: &mut OutputBuffer);

    /// Run until the frame finishes, a breakpoint or watchpoint triggers, or
    /// a step request from `debugger` halts mid-frame. A step halt leaves the
    /// status at [`FrameStatus::Start`](crate::frame::FrameStatus::Start) with
    /// a nonzero current cycle. If the status header shows an unfinished
    /// frame on entry, execution resumes that frame.
    fn next_frame(
        &mut self,
        input: &InputBuffer,
        output: &mut OutputBuffer,
        debugger: &Debugger,
    ) -> Result<()>;

    /// Replace internal engine state from a full output buffer snapshot.
    fn restore_state(&mut self, snapshot: FrameView<'_>) -> Result<()>;

    /// Attach a disk image to a drive slot. Machines without drives ignore
    /// the request.
    fn load_disk(&mut self, drive: u8, path: &Path) -> Result<()> {
        debug!(
            "{} has no disk drive {drive}, ignoring {}",
            self.profile().name,
            path.display()
        );
        Ok(())
    }

    /// Simulate an initial power-on startup.
    fn coldstart(&mut self, output: &mut OutputBuffer) -> Result<()> {
        let _ = output;
        Ok(())
    }

    /// Simulate pressing the system reset button.
    fn warmstart(&mut self, output: &mut OutputBuffer) -> Result<()> {
        let _ = output;
        Ok(())
    }
}
