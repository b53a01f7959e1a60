//! Atari DOS binary-load (XEX) images.
//!
//! An image starts with a `$FFFF` marker, followed by segments of
//! `start_lo start_hi end_lo end_hi data...` with an inclusive end address.
//! Later segments may repeat the `$FFFF` marker. A segment that covers the
//! RUNAD vector at `$02E0` carries the program's entry point.

use std::path::Path;

use log::{debug, warn};

use super::segment::{BootSegment, DiskImageFormat};
use crate::error::BootError;

const MARKER: u16 = 0xFFFF;
pub const RUNAD: u16 = 0x02E0;
pub const INITAD: u16 = 0x02E2;

#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryLoadFormat;

fn parse_error(path: &Path, reason: impl Into<String>) -> BootError {
    BootError::Parse {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_word(data: &[u8], pos: usize) -> Option<u16> {
    let lo = *data.get(pos)?;
    let hi = *data.get(pos + 1)?;
    Some(u16::from_le_bytes([lo, hi]))
}

/// Word stored at `vector` if `seg` covers both of its bytes.
fn vector_in(seg: &BootSegment, vector: u16) -> Option<u16> {
    let offset = vector.checked_sub(seg.origin)? as usize;
    read_word(&seg.data, offset)
}

impl DiskImageFormat for BinaryLoadFormat {
    fn extension(&self) -> &str {
        "xex"
    }

    fn parse_bytes(&self, path: &Path, data: &[u8]) -> Result<Vec<BootSegment>, BootError> {
        if read_word(data, 0) != Some(MARKER) {
            return Err(parse_error(path, "missing $FFFF binary load header"));
        }

        let mut segments = Vec::new();
        let mut pos = 2;
        while pos < data.len() {
            let mut start = read_word(data, pos)
                .ok_or_else(|| parse_error(path, format!("truncated segment header at {pos}")))?;
            if start == MARKER {
                pos += 2;
                start = read_word(data, pos).ok_or_else(|| {
                    parse_error(path, format!("truncated segment header at {pos}"))
                })?;
            }
            let end = read_word(data, pos + 2)
                .ok_or_else(|| parse_error(path, format!("truncated segment header at {pos}")))?;
            if end < start {
                return Err(parse_error(
                    path,
                    format!("segment end ${end:04x} precedes start ${start:04x}"),
                ));
            }
            pos += 4;

            let len = (end - start) as usize + 1;
            let body = data.get(pos..pos + len).ok_or_else(|| {
                parse_error(
                    path,
                    format!(
                        "segment ${start:04x}-${end:04x} needs {len} bytes, {} remain",
                        data.len() - pos
                    ),
                )
            })?;
            pos += len;

            let mut seg =
                BootSegment::new(start, body).with_name(format!("segment {}", segments.len() + 1));
            if let Some(run) = vector_in(&seg, RUNAD) {
                seg.run_address = Some(run);
                seg.name = "RUNAD".into();
            } else if vector_in(&seg, INITAD).is_some() {
                seg.name = "INITAD".into();
            }
            debug!("{}: {seg} ({len} bytes)", path.display());
            segments.push(seg);
        }

        if segments.is_empty() {
            return Err(BootError::NoSegments(path.to_path_buf()));
        }
        Ok(segments)
    }

    fn encode(&self, segments: &[BootSegment]) -> Vec<u8> {
        let mut out = MARKER.to_le_bytes().to_vec();
        let mut runad_written = false;

        for seg in segments {
            if seg.is_empty() {
                warn!("skipping empty segment {seg}");
                continue;
            }
            let room = 0x10000 - seg.origin as usize;
            let data = &seg.data[..seg.len().min(room)];
            if data.len() < seg.len() {
                warn!("segment {seg} truncated to {} bytes at end of memory", data.len());
            }
            let end = seg.origin as usize + data.len() - 1;
            // Each header repeats the marker so the parser never mistakes an
            // origin of $FFFF for one.
            out.extend_from_slice(&MARKER.to_le_bytes());
            out.extend_from_slice(&seg.origin.to_le_bytes());
            out.extend_from_slice(&(end as u16).to_le_bytes());
            out.extend_from_slice(data);
            runad_written |= vector_in(seg, RUNAD).is_some();
        }

        // Segments built in memory carry the entry point as an attribute
        // rather than as RUNAD bytes; emit the vector so it survives parsing.
        if !runad_written {
            if let Some(run) = segments.iter().find_map(|s| s.run_address) {
                out.extend_from_slice(&MARKER.to_le_bytes());
                out.extend_from_slice(&RUNAD.to_le_bytes());
                out.extend_from_slice(&(RUNAD + 1).to_le_bytes());
                out.extend_from_slice(&run.to_le_bytes());
            }
        }
        out
    }
}
