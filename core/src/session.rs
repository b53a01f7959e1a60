//! The emulator session: owns the buffers shared with a native core and
//! drives it one frame at a time.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::boot::{BinaryLoadFormat, BootImage, BootSegment, BootSequencer, DiskImageFormat};
use crate::debugger::{self, BreakCondition, Debugger, StepRequest};
use crate::error::Result;
use crate::events::{FrameEvent, FrameEventQueue};
use crate::frame::{
    FrameStatus, FrameView, InputBuffer, LayoutTable, MemoryBlock, OutputBuffer, compute_layout,
};
use crate::history::{HistoryStore, RetentionPolicy};
use crate::native::NativeCore;
use crate::savestate::{SaveState, SaveStateMetadata};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Machine-specific arguments passed to the native core at bring-up.
    pub emulator_args: Vec<String>,
    pub history: RetentionPolicy,
}

/// Where the stepping state machine stands between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The next step starts a new frame.
    Ready,
    /// The last step halted mid-frame; the next step resumes it.
    Stepping,
}

/// Input queued for delivery at the start of a later frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(u8),
    Keycode(u8),
    Special(u8),
    ClearKeys,
    Joystick {
        stick: usize,
        direction: u8,
        trigger: bool,
    },
}

pub struct EmulatorSession {
    core: Box<dyn NativeCore>,
    layout: Arc<LayoutTable>,
    input: InputBuffer,
    output: OutputBuffer,
    debugger: Debugger,
    frame_count: u64,
    events: FrameEventQueue,
    history: HistoryStore,
    boot: BootSequencer,
    last_boot_state: Option<Box<[u8]>>,
    pending_input: VecDeque<InputEvent>,
}

impl EmulatorSession {
    /// Bring up `core` with binary-load boot images.
    pub fn new(core: Box<dyn NativeCore>, config: SessionConfig) -> Result<Self> {
        Self::with_image_format(core, config, Box::new(BinaryLoadFormat))
    }

    /// Compute the buffer layout for `core`, then run its one-time startup
    /// sequence. A profile/buffer size mismatch is a configuration error.
    pub fn with_image_format(
        mut core: Box<dyn NativeCore>,
        config: SessionConfig,
        format: Box<dyn DiskImageFormat>,
    ) -> Result<Self> {
        let profile = core.profile().clone();
        let layout = Arc::new(compute_layout(&profile, core.output_len())?);
        info!(
            "{}: output buffer {} bytes (state {}, video {}, audio {})",
            profile.name, layout.total_len, layout.state.len, layout.video.len, layout.audio.len
        );

        let mut input = InputBuffer::new();
        let mut output = OutputBuffer::new(Arc::clone(&layout));
        core.clear_state_arrays(&mut input, &mut output);
        core.start_emulator(&config.emulator_args)?;
        core.configure_state_arrays(&input, &mut output);

        Ok(Self {
            core,
            layout,
            input,
            output,
            debugger: Debugger::new(),
            frame_count: 0,
            events: FrameEventQueue::new(),
            history: HistoryStore::new(config.history),
            boot: BootSequencer::new(format),
            last_boot_state: None,
            pending_input: VecDeque::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Frame stepping
    // -----------------------------------------------------------------------

    /// A frame is in progress once the native core has consumed cycles from
    /// it without finishing, whatever halted it.
    pub fn phase(&self) -> SessionPhase {
        let view = self.output.view();
        if view.is_frame_finished() || view.current_cycle_in_frame() == 0 {
            SessionPhase::Ready
        } else {
            SessionPhase::Stepping
        }
    }

    /// Advance one unit of emulated time.
    ///
    /// Returns the breakpoint or watchpoint that halted the native core, or
    /// `None` when the frame finished or stopped mid-frame on a step request.
    /// Only a finished frame bumps the frame count, fires due events and is
    /// considered for a history snapshot.
    pub fn next_frame(&mut self) -> Result<Option<BreakCondition>> {
        match self.phase() {
            SessionPhase::Ready => self.process_key_state(),
            SessionPhase::Stepping => {
                let view = self.output.view();
                debug!(
                    "next_frame: continuing frame from cycle {} of frame {}",
                    view.current_cycle_in_frame(),
                    view.frame_number()
                );
            }
        }

        self.core
            .next_frame(&self.input, &mut self.output, &self.debugger)?;
        self.debugger.clear_step_request();

        let view = self.output.view();
        let status = view.frame_status()?;
        let id = view.breakpoint_id();
        if status == FrameStatus::Finished {
            self.frame_count += 1;
            self.events.process(self.frame_count);
            self.save_history(false);
        }
        debugger::resolve(status, id, &self.debugger)
    }

    /// Run at most `count` instructions, halting mid-frame if the frame does
    /// not finish first. Native cores execute at least one instruction, so a
    /// count of 0 behaves like 1.
    pub fn step_instructions(&mut self, count: u32) -> Result<Option<BreakCondition>> {
        self.debugger.request_step(StepRequest::Instructions(count));
        self.next_frame()
    }

    fn process_key_state(&mut self) {
        let Some(event) = self.pending_input.pop_front() else {
            return;
        };
        debug!("frame {}: applying {event:?}", self.frame_count);
        match event {
            InputEvent::Char(c) => self.input.send_char(c),
            InputEvent::Keycode(k) => self.input.send_keycode(k),
            InputEvent::Special(s) => self.input.send_special_key(s),
            InputEvent::ClearKeys => self.input.clear_keys(),
            InputEvent::Joystick {
                stick,
                direction,
                trigger,
            } => self.input.set_joystick(stick, direction, trigger),
        }
    }

    // -----------------------------------------------------------------------
    // Frame events
    // -----------------------------------------------------------------------

    /// Run `callback` once the frame count reaches `trigger`.
    pub fn add_frame_event(&mut self, trigger: u64, callback: impl FnOnce() + 'static) {
        self.events.push(FrameEvent::new(trigger, callback));
    }

    /// Run `callback` `delta` frames from now.
    pub fn add_frame_event_in(&mut self, delta: u64, callback: impl FnOnce() + 'static) {
        self.add_frame_event(self.frame_count.saturating_add(delta), callback);
    }

    pub fn pending_events(&self) -> &FrameEventQueue {
        &self.events
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Snapshot the output buffer under the current frame number if `force`
    /// is set or the frame count falls on the sampling stride.
    pub fn save_history(&mut self, force: bool) -> bool {
        let frame_number = self.current_frame_number();
        self.history
            .save(frame_number, self.frame_count, self.output.as_bytes(), force)
    }

    /// View of the snapshot stored at exactly `frame_number`.
    pub fn get_history(&self, frame_number: u64) -> Result<FrameView<'_>> {
        let raw = self.history.get(frame_number)?;
        FrameView::new(raw, &self.layout)
    }

    /// Roll the machine back to the snapshot at `frame_number`. A negative or
    /// absent frame is logged and ignored. Returns whether a restore happened.
    pub fn restore_history(&mut self, frame_number: i64) -> Result<bool> {
        debug!("restoring state from frame {frame_number}");
        let Ok(frame) = u64::try_from(frame_number) else {
            error!("{frame_number} not in history");
            return Ok(false);
        };
        let Ok(snapshot) = self.history.get(frame) else {
            error!("{frame} not in history");
            return Ok(false);
        };
        self.core
            .restore_state(FrameView::new(snapshot, &self.layout)?)?;
        self.output.overwrite(snapshot)?;

        if self.history.policy().truncate_on_restore {
            let dropped = self.history.truncate_after(frame);
            debug!("dropped {dropped} snapshots newer than frame {frame}");
        }
        Ok(true)
    }

    pub fn get_previous_history(&self, cursor: u64) -> Result<u64> {
        self.history.previous(cursor)
    }

    pub fn get_next_history(&self, cursor: u64) -> Result<u64> {
        self.history.next(cursor)
    }

    pub fn has_save_points(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    // -----------------------------------------------------------------------
    // Boot
    // -----------------------------------------------------------------------

    /// Boot a single in-memory segment. `None` only releases the previous
    /// temporary boot image.
    pub fn boot_from_segment(&mut self, segment: Option<&BootSegment>) -> Result<()> {
        self.boot.release_bootfile();
        let Some(segment) = segment else {
            return Ok(());
        };
        let path = self.boot.stage_segment(segment)?;
        let mut image = self.boot.load(&path)?;
        image.run_address = segment.run_address.unwrap_or(segment.origin);
        self.boot_image(image)
    }

    /// Boot an image held in memory, such as one extracted from an archive.
    pub fn boot_from_raw(&mut self, image: &[u8]) -> Result<()> {
        let path = self.boot.stage_raw(image)?;
        self.boot_from_file(&path)
    }

    /// Load every segment of the image at `path` into main memory, point the
    /// CPU at its run address and cold-start. Parse failures leave the
    /// machine untouched.
    pub fn boot_from_file(&mut self, path: &Path) -> Result<()> {
        let image = self.boot.load(path)?;
        self.boot_image(image)
    }

    fn boot_image(&mut self, image: BootImage) -> Result<()> {
        self.core.load_disk(0, &image.path)?;
        image.apply(&mut self.output);
        self.core.restore_state(self.output.view())?;
        info!("running at: ${:04x}", image.run_address);
        self.last_boot_state = Some(self.output.snapshot());
        self.coldstart()
    }

    /// Output buffer captured right after the last boot image was loaded.
    pub fn last_boot_state(&self) -> Option<FrameView<'_>> {
        let raw = self.last_boot_state.as_deref()?;
        FrameView::new(raw, &self.layout).ok()
    }

    /// Power-on restart. History starts over at the boot frame.
    pub fn coldstart(&mut self) -> Result<()> {
        self.core.coldstart(&mut self.output)?;
        self.history.clear();
        self.frame_count = 0;
        self.save_history(true);
        Ok(())
    }

    /// Reset button.
    pub fn warmstart(&mut self) -> Result<()> {
        self.core.warmstart(&mut self.output)
    }

    pub fn load_disk(&mut self, drive: u8, path: &Path) -> Result<()> {
        self.core.load_disk(drive, path)
    }

    /// Patch main memory and push the change to the native core. Bytes past
    /// the end of memory are dropped. Returns the number written.
    pub fn write_memory(&mut self, addr: u16, bytes: &[u8]) -> Result<usize> {
        let segment = BootSegment::new(addr, bytes).with_name("patch");
        let written = crate::boot::copy_segment(self.output.main_memory_mut(), &segment);
        self.core.restore_state(self.output.view())?;
        Ok(written)
    }

    /// Move the program counter and push the change to the native core.
    pub fn set_program_counter(&mut self, pc: u16) -> Result<()> {
        self.output.set_program_counter(pc);
        self.core.restore_state(self.output.view())
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub fn send_char(&mut self, key_char: u8) {
        self.input.send_char(key_char);
    }

    pub fn keypress(&mut self, c: char) {
        if c.is_ascii() {
            self.input.send_char(c as u8);
        } else {
            warn!("ignoring non-ASCII key {c:?}");
        }
    }

    pub fn send_keycode(&mut self, keycode: u8) {
        self.input.send_keycode(keycode);
    }

    pub fn send_special_key(&mut self, key_id: u8) {
        self.input.send_special_key(key_id);
    }

    pub fn clear_keys(&mut self) {
        self.input.clear_keys();
    }

    pub fn joystick(&mut self, stick: usize, direction: u8, trigger: bool) {
        self.input.set_joystick(stick, direction, trigger);
    }

    /// Queue `event` for a later frame. One queued event is applied at the
    /// start of each new frame.
    pub fn queue_input(&mut self, event: InputEvent) {
        self.pending_input.push_back(event);
    }

    /// Queue each character as a press followed by a release.
    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            if !c.is_ascii() {
                warn!("type_text: skipping non-ASCII {c:?}");
                continue;
            }
            self.pending_input.push_back(InputEvent::Char(c as u8));
            self.pending_input.push_back(InputEvent::ClearKeys);
        }
    }

    pub fn pending_input(&self) -> usize {
        self.pending_input.len()
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    // -----------------------------------------------------------------------
    // Save states
    // -----------------------------------------------------------------------

    pub fn to_save_state(&self) -> SaveState {
        SaveState {
            metadata: SaveStateMetadata::new(
                &self.layout,
                self.frame_count,
                self.output.view().frame_number(),
                self.input.as_bytes().len(),
            ),
            input: self.input.as_bytes().to_vec(),
            output: self.output.as_bytes().to_vec(),
        }
    }

    pub fn save_state(&self, path: &Path) -> Result<()> {
        self.to_save_state().save(path)?;
        info!("saved state at frame {} to {}", self.frame_count, path.display());
        Ok(())
    }

    /// Replace the machine with a save state. History from the old timeline
    /// is discarded and the loaded frame becomes the first save point.
    pub fn restore_save_state(&mut self, state: &SaveState) -> Result<()> {
        state.validate(&self.layout)?;
        self.core
            .restore_state(FrameView::new(&state.output, &self.layout)?)?;
        self.output.overwrite(&state.output)?;
        self.input.load_from(&state.input);
        self.pending_input.clear();
        self.frame_count = state.metadata.frame_count;
        self.history.clear();
        self.save_history(true);
        Ok(())
    }

    pub fn load_state(&mut self, path: &Path) -> Result<()> {
        let state = SaveState::load(path)?;
        self.restore_save_state(&state)?;
        info!("loaded state at frame {} from {}", self.frame_count, path.display());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn current_frame_number(&self) -> u64 {
        self.output.view().frame_number() as u64
    }

    pub fn view(&self) -> FrameView<'_> {
        self.output.view()
    }

    pub fn current_cpu_status(&self) -> String {
        self.output.view().cpu_status()
    }

    pub fn video(&self) -> &[u8] {
        self.output.view().video()
    }

    pub fn audio(&self) -> &[u8] {
        self.output.view().audio()
    }

    pub fn state(&self) -> &[u8] {
        self.output.view().state()
    }

    pub fn main_memory(&self) -> &[u8] {
        self.output.view().main_memory()
    }

    pub fn layout(&self) -> &LayoutTable {
        &self.layout
    }

    pub fn memory_blocks(&self) -> Vec<MemoryBlock> {
        self.layout.memory_blocks()
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    pub fn machine_name(&self) -> &str {
        &self.layout.profile.name
    }
}

impl std::fmt::Debug for EmulatorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatorSession")
            .field("machine", &self.layout.profile.name)
            .field("frame_count", &self.frame_count)
            .field("history", &self.history.len())
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}
