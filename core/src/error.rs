//! Error taxonomy for the emulation session.
//!
//! Layout and boot failures carry their own enums so callers can match on
//! the specific cause; everything funnels into [`EmulatorError`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Machine-profile / buffer layout mismatch. Always fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("invalid machine profile '{profile}': {reason}")]
    InvalidProfile { profile: String, reason: String },

    #[error("region '{name}' ({offset}+{len}) lies outside the {buffer_len}-byte output buffer")]
    RegionOutOfBounds {
        name: &'static str,
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("output buffer size mismatch: layout needs {expected} bytes, native core uses {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// File I/O or disk-image parse failure while booting.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("{0}: disk image contains no segments")]
    NoSegments(PathBuf),
}

/// Direction of a history cursor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Earlier,
    Later,
}

impl fmt::Display for SearchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earlier => write!(f, "earlier"),
            Self::Later => write!(f, "later"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("configuration error: {0}")]
    Configuration(#[from] LayoutError),

    #[error("boot failed: {0}")]
    Boot(#[from] BootError),

    #[error("no snapshot saved at frame {0}")]
    HistoryNotFound(u64),

    #[error("no {direction} snapshot than frame {cursor}")]
    HistoryOutOfRange {
        cursor: u64,
        direction: SearchDirection,
    },

    /// The native core and the debugger disagree (unknown breakpoint id,
    /// undefined frame status). Indicates desynchronization; not recoverable.
    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("native core failure: {0}")]
    Native(String),

    #[error("save state error: {0}")]
    SaveState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EmulatorError {
    /// Recoverable errors leave the session usable; the caller picks a fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HistoryNotFound(_) | Self::HistoryOutOfRange { .. } | Self::Boot(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_errors_are_recoverable() {
        assert!(EmulatorError::HistoryNotFound(7).is_recoverable());
        assert!(
            EmulatorError::HistoryOutOfRange {
                cursor: 0,
                direction: SearchDirection::Earlier
            }
            .is_recoverable()
        );
    }

    #[test]
    fn consistency_and_configuration_are_fatal() {
        assert!(!EmulatorError::Consistency("bad id".into()).is_recoverable());
        let err: EmulatorError = LayoutError::SizeMismatch {
            expected: 10,
            actual: 12,
        }
        .into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn out_of_range_message_names_direction() {
        let err = EmulatorError::HistoryOutOfRange {
            cursor: 15,
            direction: SearchDirection::Later,
        };
        assert_eq!(err.to_string(), "no later snapshot than frame 15");
    }
}
