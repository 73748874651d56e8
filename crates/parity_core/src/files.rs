//! Write helpers shared by the manifest, fixture and scaffolding writers.

use std::fs;
use std::path::Path;

use crate::error::ParityError;

fn create_parent(path: &Path) -> Result<(), ParityError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| ParityError::Io(format!("create dir {}: {}", parent.display(), e))),
        _ => Ok(()),
    }
}

/// Writes `bytes` to `path`, creating parent directories. Overwrites.
pub fn write_file(path: &Path, bytes: &[u8], what: &str) -> Result<(), ParityError> {
    create_parent(path)?;
    fs::write(path, bytes)
        .map_err(|e| ParityError::Io(format!("write {} {}: {}", what, path.display(), e)))
}

/// Writes `bytes` only when `path` does not exist. Returns whether it wrote.
pub fn write_if_absent(path: &Path, bytes: &[u8], what: &str) -> Result<bool, ParityError> {
    if path.exists() {
        return Ok(false);
    }
    write_file(path, bytes, what)?;
    Ok(true)
}

/// Creates `path` as a directory when missing. Returns whether it created it.
pub fn create_dir_if_absent(path: &Path) -> Result<bool, ParityError> {
    if path.exists() {
        return Ok(false);
    }
    fs::create_dir_all(path)
        .map_err(|e| ParityError::Io(format!("create dir {}: {}", path.display(), e)))?;
    Ok(true)
}
