//! Copies static assets (files or whole directories) into the output
//! directory.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Copies `src` to `dst`. Directories are copied recursively, following
/// symlinks.
pub fn copy(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.is_dir() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        return Ok(());
    }

    for result in WalkDir::new(src).follow_links(true) {
        let entry = result.map_err(io::Error::from)?;
        // strip_prefix can't fail: every entry lives under `src`.
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
