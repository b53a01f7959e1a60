//! Boot image resolution: a disk image file used in place, or the first
//! file inside a ZIP archive extracted to memory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use omniframe_core::error::BootError;

/// Where the bytes of a boot image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootSource {
    File(PathBuf),
    /// Extracted image plus the archive entry name it came from.
    Extracted { name: String, data: Vec<u8> },
}

/// Resolve a boot path.
///
/// 1. If `path` ends with `.zip` → extract the first file entry.
/// 2. Otherwise → boot the file in place.
pub fn resolve(path: &Path) -> Result<BootSource, BootError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        return extract_first_entry(path);
    }
    if path.is_file() {
        return Ok(BootSource::File(path.to_path_buf()));
    }
    Err(BootError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("boot image not found: {}", path.display()),
    )))
}

fn archive_error(path: &Path, e: zip::result::ZipError) -> BootError {
    BootError::Parse {
        path: path.to_path_buf(),
        reason: format!("invalid ZIP: {e}"),
    }
}

fn extract_first_entry(path: &Path) -> Result<BootSource, BootError> {
    let reader = BufReader::new(File::open(path)?);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| archive_error(path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_error(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        return Ok(BootSource::Extracted { name, data });
    }
    Err(BootError::NoSegments(path.to_path_buf()))
}
