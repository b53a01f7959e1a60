//! Save-state archives.
//!
//! A save state is a zip archive holding `savestate.json` (metadata),
//! `input.bin` (the input record) and `output.bin` (the output buffer in its
//! exact native layout). Restoring goes through the native core, so a save
//! state can only be loaded into a session whose layout matches.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{EmulatorError, Result};
use crate::frame::{INPUT_LEN, LAYOUT_VERSION, LayoutTable, MachineProfile};

pub const SAVE_STATE_MAGIC: &str = "omniframe.savestate";
pub const SAVE_STATE_VERSION: u32 = 1;

const METADATA_FILE: &str = "savestate.json";
const INPUT_FILE: &str = "input.bin";
const OUTPUT_FILE: &str = "output.bin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveStateMetadata {
    pub magic: String,
    pub version: u32,
    pub layout_version: u32,
    pub profile: MachineProfile,
    pub frame_count: u64,
    pub frame_number: u32,
    pub input_len: usize,
    pub output_len: usize,
}

impl SaveStateMetadata {
    pub fn new(layout: &LayoutTable, frame_count: u64, frame_number: u32, input_len: usize) -> Self {
        Self {
            magic: SAVE_STATE_MAGIC.to_string(),
            version: SAVE_STATE_VERSION,
            layout_version: layout.version,
            profile: layout.profile.clone(),
            frame_count,
            frame_number,
            input_len,
            output_len: layout.total_len,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveState {
    pub metadata: SaveStateMetadata,
    pub input: Vec<u8>,
    pub output: Vec<u8>,
}

impl SaveState {
    /// Check that this save state fits a session laid out as `layout`.
    pub fn validate(&self, layout: &LayoutTable) -> Result<()> {
        let meta = &self.metadata;
        if meta.magic != SAVE_STATE_MAGIC || meta.version != SAVE_STATE_VERSION {
            return Err(EmulatorError::SaveState(
                "save state magic/version mismatch".to_string(),
            ));
        }
        if meta.layout_version != LAYOUT_VERSION {
            return Err(EmulatorError::SaveState(format!(
                "layout version {} not supported (expected {LAYOUT_VERSION})",
                meta.layout_version
            )));
        }
        if meta.profile != layout.profile {
            return Err(EmulatorError::SaveState(format!(
                "save state is for machine '{}', session runs '{}'",
                meta.profile.name, layout.profile.name
            )));
        }
        if self.output.len() != layout.total_len || meta.output_len != layout.total_len {
            return Err(EmulatorError::SaveState(format!(
                "output.bin length mismatch (expected {}, got {})",
                layout.total_len,
                self.output.len()
            )));
        }
        if self.input.len() != INPUT_LEN || meta.input_len != INPUT_LEN {
            return Err(EmulatorError::SaveState(format!(
                "input.bin length mismatch (expected {INPUT_LEN}, got {})",
                self.input.len()
            )));
        }
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(METADATA_FILE, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&self.metadata)?)?;

        zip.start_file(INPUT_FILE, options)?;
        zip.write_all(&self.input)?;

        zip.start_file(OUTPUT_FILE, options)?;
        zip.write_all(&self.output)?;

        Ok(zip.finish()?)
    }

    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let meta_buf = read_entry(&mut archive, METADATA_FILE)?;
        let metadata: SaveStateMetadata = serde_json::from_slice(&meta_buf)?;
        let input = read_entry(&mut archive, INPUT_FILE)?;
        let output = read_entry(&mut archive, OUTPUT_FILE)?;
        Ok(Self {
            metadata,
            input,
            output,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.write_to(File::create(path)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::read_from(File::open(path)?)
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| EmulatorError::SaveState(format!("{name} missing: {e}")))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
