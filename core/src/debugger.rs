//! Breakpoint and watchpoint registries, and the resolver that turns a
//! post-step frame status into a debugger-facing condition.
//!
//! Ids are the single byte the native core writes into the status header,
//! so at most 255 of each kind can be registered (id 0 means "none").

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EmulatorError, Result};
use crate::frame::FrameStatus;
use crate::frame::access;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub address: u16,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watchpoint {
    pub address: u16,
    /// Mask of [`access`] flags that trigger this watchpoint.
    pub access: u8,
    pub enabled: bool,
}

/// Why the native core halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakCondition {
    Breakpoint { id: u8, breakpoint: Breakpoint },
    Watchpoint { id: u8, watchpoint: Watchpoint },
}

impl fmt::Display for BreakCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breakpoint { id, breakpoint } => {
                write!(f, "breakpoint {id} at ${:04x}", breakpoint.address)
            }
            Self::Watchpoint { id, watchpoint } => {
                let mut kinds = Vec::new();
                if watchpoint.access & access::READ != 0 {
                    kinds.push("read");
                }
                if watchpoint.access & access::WRITE != 0 {
                    kinds.push("write");
                }
                if watchpoint.access & access::EXECUTE != 0 {
                    kinds.push("execute");
                }
                write!(
                    f,
                    "watchpoint {id} ({}) at ${:04x}",
                    kinds.join("/"),
                    watchpoint.address
                )
            }
        }
    }
}

/// Request to stop part-way through a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRequest {
    /// Halt after this many instructions (at least one), leaving the frame
    /// unfinished.
    Instructions(u32),
}

/// Debugger state handed to the native core on every step.
#[derive(Debug, Default)]
pub struct Debugger {
    breakpoints: BTreeMap<u8, Breakpoint>,
    watchpoints: BTreeMap<u8, Watchpoint>,
    step: Option<StepRequest>,
}

fn next_free_id<T>(table: &BTreeMap<u8, T>) -> Option<u8> {
    (1..=u8::MAX).find(|id| !table.contains_key(id))
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enabled breakpoint. Returns `None` when all ids are taken.
    pub fn add_breakpoint(&mut self, address: u16) -> Option<u8> {
        let id = next_free_id(&self.breakpoints)?;
        self.breakpoints.insert(
            id,
            Breakpoint {
                address,
                enabled: true,
            },
        );
        Some(id)
    }

    pub fn remove_breakpoint(&mut self, id: u8) -> Option<Breakpoint> {
        self.breakpoints.remove(&id)
    }

    pub fn set_breakpoint_enabled(&mut self, id: u8, enabled: bool) -> bool {
        match self.breakpoints.get_mut(&id) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get_breakpoint(&self, id: u8) -> Option<&Breakpoint> {
        self.breakpoints.get(&id)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = (u8, &Breakpoint)> {
        self.breakpoints.iter().map(|(id, bp)| (*id, bp))
    }

    /// Id of the first enabled breakpoint at `address`.
    pub fn breakpoint_at(&self, address: u16) -> Option<u8> {
        self.breakpoints
            .iter()
            .find(|(_, bp)| bp.enabled && bp.address == address)
            .map(|(id, _)| *id)
    }

    /// Register an enabled watchpoint triggering on any of the `access` flags.
    pub fn add_watchpoint(&mut self, address: u16, access: u8) -> Option<u8> {
        let id = next_free_id(&self.watchpoints)?;
        self.watchpoints.insert(
            id,
            Watchpoint {
                address,
                access,
                enabled: true,
            },
        );
        Some(id)
    }

    pub fn remove_watchpoint(&mut self, id: u8) -> Option<Watchpoint> {
        self.watchpoints.remove(&id)
    }

    pub fn get_watchpoint(&self, id: u8) -> Option<&Watchpoint> {
        self.watchpoints.get(&id)
    }

    pub fn watchpoints(&self) -> impl Iterator<Item = (u8, &Watchpoint)> {
        self.watchpoints.iter().map(|(id, wp)| (*id, wp))
    }

    /// Id of the first enabled watchpoint matching an access of `access_type`.
    pub fn watchpoint_hit(&self, address: u16, access_type: u8) -> Option<u8> {
        self.watchpoints
            .iter()
            .find(|(_, wp)| wp.enabled && wp.address == address && wp.access & access_type != 0)
            .map(|(id, _)| *id)
    }

    pub fn request_step(&mut self, request: StepRequest) {
        self.step = Some(request);
    }

    pub fn step_request(&self) -> Option<StepRequest> {
        self.step
    }

    /// Step requests apply to a single native call.
    pub fn clear_step_request(&mut self) {
        self.step = None;
    }
}

/// Translate a frame status and breakpoint id into a break condition.
///
/// An id the debugger does not know is a native-core/debugger
/// desynchronization and is reported as [`EmulatorError::Consistency`].
pub fn resolve(status: FrameStatus, id: u8, debugger: &Debugger) -> Result<Option<BreakCondition>> {
    match status {
        FrameStatus::Breakpoint => debugger
            .get_breakpoint(id)
            .map(|bp| {
                Some(BreakCondition::Breakpoint {
                    id,
                    breakpoint: *bp,
                })
            })
            .ok_or_else(|| {
                EmulatorError::Consistency(format!("native core halted on unknown breakpoint {id}"))
            }),
        FrameStatus::Watchpoint => debugger
            .get_watchpoint(id)
            .map(|wp| {
                Some(BreakCondition::Watchpoint {
                    id,
                    watchpoint: *wp,
                })
            })
            .ok_or_else(|| {
                EmulatorError::Consistency(format!("native core halted on unknown watchpoint {id}"))
            }),
        FrameStatus::Start | FrameStatus::Finished => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_reuse_gaps() {
        let mut dbg = Debugger::new();
        assert_eq!(dbg.add_breakpoint(0x2000), Some(1));
        assert_eq!(dbg.add_breakpoint(0x2010), Some(2));
        dbg.remove_breakpoint(1);
        assert_eq!(dbg.add_breakpoint(0x2020), Some(1));
    }

    #[test]
    fn ids_exhaust_at_255() {
        let mut dbg = Debugger::new();
        for addr in 0..255u16 {
            assert!(dbg.add_watchpoint(addr, access::WRITE).is_some());
        }
        assert_eq!(dbg.add_watchpoint(0xFFFF, access::WRITE), None);
        assert_eq!(dbg.remove_watchpoint(7).map(|w| w.address), Some(6));
        assert_eq!(dbg.add_watchpoint(0xFFFF, access::WRITE), Some(7));
    }

    #[test]
    fn disabled_breakpoints_do_not_match() {
        let mut dbg = Debugger::new();
        let id = dbg.add_breakpoint(0x0600).unwrap();
        assert_eq!(dbg.breakpoint_at(0x0600), Some(id));
        dbg.set_breakpoint_enabled(id, false);
        assert_eq!(dbg.breakpoint_at(0x0600), None);
    }

    #[test]
    fn watchpoint_matches_access_mask() {
        let mut dbg = Debugger::new();
        let id = dbg.add_watchpoint(0xD01A, access::WRITE).unwrap();
        assert_eq!(dbg.watchpoint_hit(0xD01A, access::READ), None);
        assert_eq!(dbg.watchpoint_hit(0xD01A, access::WRITE), Some(id));
        assert_eq!(dbg.watchpoint_hit(0xD01B, access::WRITE), None);
    }

    #[test]
    fn resolve_breakpoint_and_watchpoint() {
        let mut dbg = Debugger::new();
        dbg.add_breakpoint(0x1000);
        dbg.add_watchpoint(0x2000, access::READ);

        let bp = resolve(FrameStatus::Breakpoint, 1, &dbg).unwrap().unwrap();
        assert!(matches!(bp, BreakCondition::Breakpoint { id: 1, .. }));
        let wp = resolve(FrameStatus::Watchpoint, 1, &dbg).unwrap().unwrap();
        assert_eq!(wp.to_string(), "watchpoint 1 (read) at $2000");
    }

    #[test]
    fn resolve_start_and_finished_is_none() {
        let dbg = Debugger::new();
        assert_eq!(resolve(FrameStatus::Start, 0, &dbg).unwrap(), None);
        assert_eq!(resolve(FrameStatus::Finished, 5, &dbg).unwrap(), None);
    }

    #[test]
    fn resolve_unknown_id_is_consistency_error() {
        let dbg = Debugger::new();
        assert!(matches!(
            resolve(FrameStatus::Breakpoint, 3, &dbg),
            Err(EmulatorError::Consistency(_))
        ));
        assert!(matches!(
            resolve(FrameStatus::Watchpoint, 1, &dbg),
            Err(EmulatorError::Consistency(_))
        ));
    }

    #[test]
    fn step_request_is_one_shot() {
        let mut dbg = Debugger::new();
        dbg.request_step(StepRequest::Instructions(4));
        assert_eq!(dbg.step_request(), Some(StepRequest::Instructions(4)));
        dbg.clear_step_request();
        assert_eq!(dbg.step_request(), None);
    }
}
