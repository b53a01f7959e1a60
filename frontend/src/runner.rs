use std::fmt;

use log::{info, warn};
use omniframe_core::prelude::*;

use crate::input::WatchTarget;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All requested frames completed.
    Completed,
    Halted(BreakCondition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub frames_run: u64,
    pub stop: StopReason,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop {
            StopReason::Completed => write!(f, "ran {} frames", self.frames_run),
            StopReason::Halted(condition) => {
                write!(f, "stopped after {} frames: {condition}", self.frames_run)
            }
        }
    }
}

/// Register `--break` and `--watch` targets with the session's debugger.
pub fn apply_debug_targets(
    session: &mut EmulatorSession,
    breakpoints: &[u16],
    watchpoints: &[WatchTarget],
) {
    let debugger = session.debugger_mut();
    for &address in breakpoints {
        match debugger.add_breakpoint(address) {
            Some(id) => info!("breakpoint {id} at ${address:04x}"),
            None => warn!("no free breakpoint slot for ${address:04x}"),
        }
    }
    for target in watchpoints {
        match debugger.add_watchpoint(target.address, target.access) {
            Some(id) => info!("watchpoint {id} at ${:04x}", target.address),
            None => warn!("no free watchpoint slot for ${:04x}", target.address),
        }
    }
}

/// Run up to `frames` complete frames, stopping early on a break condition.
/// A frame interrupted by a halt is not counted.
pub fn run_frames(session: &mut EmulatorSession, frames: u64) -> Result<RunReport> {
    let mut frames_run = 0;
    while frames_run < frames {
        if let Some(condition) = session.next_frame()? {
            info!("{condition}: {}", session.current_cpu_status());
            return Ok(RunReport {
                frames_run,
                stop: StopReason::Halted(condition),
            });
        }
        frames_run += 1;
    }
    Ok(RunReport {
        frames_run,
        stop: StopReason::Completed,
    })
}

/// Step back `save_points` snapshots from the current frame and restore the
/// last one reached. Returns the restored frame number, or `None` if no
/// earlier snapshot exists.
pub fn rewind(session: &mut EmulatorSession, save_points: u32) -> Result<Option<u64>> {
    let mut cursor = session.current_frame_number();
    let mut target = None;
    for _ in 0..save_points {
        match session.get_previous_history(cursor) {
            Ok(frame) => {
                cursor = frame;
                target = Some(frame);
            }
            Err(e) if e.is_recoverable() => break,
            Err(e) => return Err(e),
        }
    }
    let Some(frame) = target else {
        warn!("no snapshot before frame {cursor}");
        return Ok(None);
    };
    session.restore_history(frame as i64)?;
    info!("rewound to frame {frame}");
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use omniframe_machines::registry;

    fn session() -> EmulatorSession {
        let entry = registry::find("generic6502").unwrap();
        let mut session = EmulatorSession::new((entry.create)(), SessionConfig::default()).unwrap();
        session
            .boot_from_segment(Some(&BootSegment::new(0x0600, vec![0xEA; 16])))
            .unwrap();
        session
    }

    #[test]
    fn runs_requested_frames() {
        let mut session = session();
        let report = run_frames(&mut session, 3).unwrap();
        assert_eq!(report.frames_run, 3);
        assert_eq!(report.stop, StopReason::Completed);
        assert_eq!(session.frame_count(), 3);
        assert_eq!(report.to_string(), "ran 3 frames");
    }

    #[test]
    fn stops_at_breakpoint() {
        let mut session = session();
        apply_debug_targets(&mut session, &[0x0608], &[]);
        let report = run_frames(&mut session, 3).unwrap();
        assert_eq!(report.frames_run, 0);
        assert!(matches!(
            report.stop,
            StopReason::Halted(BreakCondition::Breakpoint { .. })
        ));
        assert_eq!(session.view().program_counter(), 0x0608);
        assert_eq!(
            report.to_string(),
            "stopped after 0 frames: breakpoint 1 at $0608"
        );
    }

    #[test]
    fn stops_at_watchpoint() {
        let mut session = session();
        let watch = WatchTarget {
            address: 0x0602,
            access: access::EXECUTE,
        };
        apply_debug_targets(&mut session, &[], &[watch]);
        let report = run_frames(&mut session, 1).unwrap();
        assert!(matches!(
            report.stop,
            StopReason::Halted(BreakCondition::Watchpoint { .. })
        ));
    }

    #[test]
    fn rewind_walks_back_save_points() {
        let mut session = session();
        run_frames(&mut session, 25).unwrap();
        assert_eq!(rewind(&mut session, 2).unwrap(), Some(10));
        assert_eq!(session.current_frame_number(), 10);
    }

    #[test]
    fn rewind_stops_at_oldest_snapshot() {
        let mut session = session();
        run_frames(&mut session, 12).unwrap();
        assert_eq!(rewind(&mut session, 5).unwrap(), Some(0));
        assert_eq!(session.current_frame_number(), 0);
    }

    #[test]
    fn rewind_without_earlier_snapshot() {
        let mut session = session();
        assert_eq!(rewind(&mut session, 1).unwrap(), None);
    }
}
