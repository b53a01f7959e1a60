#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use omniframe_core::prelude::*;

/// What the next `next_frame` call reports.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Finish,
    Breakpoint(u8),
    Watchpoint(u8),
    /// Stop mid-frame without a break condition.
    Halt,
}

/// Calls observed by a [`ScriptedCore`], shared with the test after the core
/// is boxed into a session.
#[derive(Debug, Default)]
pub struct CallLog {
    pub args: Vec<String>,
    pub calls: Vec<&'static str>,
    pub restored: Vec<Vec<u8>>,
    pub disks: Vec<(u8, PathBuf)>,
}

/// Minimal native core for testing: replays a script of step outcomes and
/// writes just enough of the status header for the session to act on.
pub struct ScriptedCore {
    profile: MachineProfile,
    output_len: usize,
    script: VecDeque<Outcome>,
    frame_number: u32,
    calls_log: Rc<RefCell<CallLog>>,
}

impl ScriptedCore {
    pub fn new(script: &[Outcome]) -> (Self, Rc<RefCell<CallLog>>) {
        let calls_log = Rc::new(RefCell::new(CallLog::default()));
        let profile = MachineProfile::generic_6502();
        let core = Self {
            output_len: profile.output_len(),
            profile,
            script: script.iter().copied().collect(),
            frame_number: 0,
            calls_log: Rc::clone(&calls_log),
        };
        (core, calls_log)
    }

    /// Claim a buffer size the profile does not produce.
    pub fn with_output_len(mut self, len: usize) -> Self {
        self.output_len = len;
        self
    }
}

impl NativeCore for ScriptedCore {
    fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn clear_state_arrays(&mut self, input: &mut InputBuffer, output: &mut OutputBuffer) {
        self.calls_log.borrow_mut().calls.push("clear_state_arrays");
        *input = InputBuffer::new();
        output.clear();
    }

    fn start_emulator(&mut self, args: &[String]) -> Result<()> {
        let mut calls_log = self.calls_log.borrow_mut();
        calls_log.calls.push("start_emulator");
        calls_log.args = args.to_vec();
        Ok(())
    }

    fn configure_state_arrays(&mut self, _input: &InputBuffer, output: &mut OutputBuffer) {
        self.calls_log.borrow_mut().calls.push("configure_state_arrays");
        output.set_frame_status(FrameStatus::Start);
    }

    fn next_frame(
        &mut self,
        input: &InputBuffer,
        output: &mut OutputBuffer,
        _debugger: &Debugger,
    ) -> Result<()> {
        self.calls_log.borrow_mut().calls.push("next_frame");
        let cycle = output.view().current_cycle_in_frame();
        match self.script.pop_front().unwrap_or(Outcome::Finish) {
            Outcome::Finish => {
                self.frame_number += 1;
                output.set_frame_number(self.frame_number);
                output.set_current_cycle_in_frame(0);
                output.set_frame_status(FrameStatus::Finished);
                output.set_breakpoint_id(0);
                output.video_mut()[0] = self.frame_number as u8;
                output.audio_mut()[0] = input.keychar();
            }
            Outcome::Breakpoint(id) => {
                output.set_current_cycle_in_frame(cycle + 10);
                output.set_frame_status(FrameStatus::Breakpoint);
                output.set_breakpoint_id(id);
            }
            Outcome::Watchpoint(id) => {
                output.set_current_cycle_in_frame(cycle + 10);
                output.set_frame_status(FrameStatus::Watchpoint);
                output.set_breakpoint_id(id);
            }
            Outcome::Halt => {
                output.set_current_cycle_in_frame(cycle + 2);
                output.set_frame_status(FrameStatus::Start);
                output.set_breakpoint_id(0);
            }
        }
        Ok(())
    }

    fn restore_state(&mut self, snapshot: FrameView<'_>) -> Result<()> {
        self.frame_number = snapshot.frame_number();
        self.calls_log
            .borrow_mut()
            .restored
            .push(snapshot.as_bytes().to_vec());
        Ok(())
    }

    fn load_disk(&mut self, drive: u8, path: &Path) -> Result<()> {
        self.calls_log
            .borrow_mut()
            .disks
            .push((drive, path.to_path_buf()));
        Ok(())
    }

    fn coldstart(&mut self, output: &mut OutputBuffer) -> Result<()> {
        self.calls_log.borrow_mut().calls.push("coldstart");
        self.frame_number = 0;
        output.set_frame_number(0);
        output.set_current_cycle_in_frame(0);
        output.set_frame_status(FrameStatus::Start);
        Ok(())
    }
}

pub fn session(script: &[Outcome]) -> (EmulatorSession, Rc<RefCell<CallLog>>) {
    let (core, calls_log) = ScriptedCore::new(script);
    let session = EmulatorSession::new(Box::new(core), SessionConfig::default())
        .expect("scripted core layout");
    (session, calls_log)
}

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("omniframe_test_{}_{name}", std::process::id()))
}
