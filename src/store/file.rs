//! Atomic file operations for the document file.
//!
//! The document is always replaced as a whole: write to a temp file, sync to
//! disk, then rename over the target. A crash mid-write leaves the previous
//! version in place.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Write content to a file atomically.
///
/// This function:
/// 1. Creates the parent directory if absent
/// 2. Writes content to a temporary file next to the target
/// 3. Calls `fsync` to ensure data is on disk
/// 4. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}
