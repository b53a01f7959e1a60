//! Sparse store of full output buffer snapshots, keyed by frame number.
//!
//! Snapshots are sampled every `stride` completed frames (or forced by the
//! caller) so rewind stays cheap without keeping every frame. Frame numbers
//! increase monotonically during a run, so new keys always land at the end.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EmulatorError, Result, SearchDirection};

/// How snapshots are sampled and retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Save a snapshot when the completed-frame count is a multiple of this.
    pub stride: u64,
    /// Upper bound on stored snapshots; oldest frames are evicted first.
    /// `None` keeps every sampled snapshot.
    pub max_snapshots: Option<usize>,
    /// Drop snapshots newer than the restored frame when rewinding.
    pub truncate_on_restore: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            stride: 10,
            max_snapshots: None,
            truncate_on_restore: false,
        }
    }
}

impl RetentionPolicy {
    pub fn is_memorable(&self, frame_count: u64) -> bool {
        self.stride != 0 && frame_count % self.stride == 0
    }
}

#[derive(Debug, Default)]
pub struct HistoryStore {
    frames: BTreeMap<u64, Box<[u8]>>,
    policy: RetentionPolicy,
}

impl HistoryStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            frames: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, frame_number: u64) -> bool {
        self.frames.contains_key(&frame_number)
    }

    /// Stored frame numbers in ascending order.
    pub fn frame_numbers(&self) -> impl Iterator<Item = u64> + '_ {
        self.frames.keys().copied()
    }

    /// Total bytes held by snapshots.
    pub fn memory_usage(&self) -> usize {
        self.frames.values().map(|d| d.len()).sum()
    }

    /// Store `snapshot` under `frame_number` if `force` is set or
    /// `frame_count` falls on the sampling stride. Returns whether it was
    /// stored.
    pub fn save(&mut self, frame_number: u64, frame_count: u64, snapshot: &[u8], force: bool) -> bool {
        if !force && !self.policy.is_memorable(frame_count) {
            return false;
        }
        self.insert(frame_number, snapshot.into());
        debug!(
            "history[{frame_number}] of {}: {} bytes",
            self.frames.len(),
            snapshot.len()
        );
        true
    }

    /// Store unconditionally, then apply the capacity limit.
    pub fn insert(&mut self, frame_number: u64, snapshot: Box<[u8]>) {
        self.frames.insert(frame_number, snapshot);
        if let Some(max) = self.policy.max_snapshots {
            while self.frames.len() > max.max(1) {
                if let Some((evicted, _)) = self.frames.pop_first() {
                    debug!("history full, evicted frame {evicted}");
                }
            }
        }
    }

    pub fn get(&self, frame_number: u64) -> Result<&[u8]> {
        self.frames
            .get(&frame_number)
            .map(|d| &d[..])
            .ok_or(EmulatorError::HistoryNotFound(frame_number))
    }

    /// Drop every snapshot newer than `frame_number`. Returns how many went.
    pub fn truncate_after(&mut self, frame_number: u64) -> usize {
        match frame_number.checked_add(1) {
            Some(first_newer) => self.frames.split_off(&first_newer).len(),
            None => 0,
        }
    }

    /// Nearest stored frame strictly before `cursor`.
    pub fn previous(&self, cursor: u64) -> Result<u64> {
        self.frames
            .range(..cursor)
            .next_back()
            .map(|(n, _)| *n)
            .ok_or(EmulatorError::HistoryOutOfRange {
                cursor,
                direction: SearchDirection::Earlier,
            })
    }

    /// Nearest stored frame strictly after `cursor`.
    pub fn next(&self, cursor: u64) -> Result<u64> {
        let after = cursor.checked_add(1).ok_or(EmulatorError::HistoryOutOfRange {
            cursor,
            direction: SearchDirection::Later,
        })?;
        self.frames
            .range(after..)
            .next()
            .map(|(n, _)| *n)
            .ok_or(EmulatorError::HistoryOutOfRange {
                cursor,
                direction: SearchDirection::Later,
            })
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
