//! Turning a requested file name plus a target directory into a path that is
//! safe to write to.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collision::{is_occupied, resolve_collision};
use crate::error::{Error, Result};
use crate::util::{is_safe_path_segment, sanitize_filename};

/// Create `dir` and its parents if missing. Fails with `InvalidArgument` when
/// `dir` is empty or names something that is not a directory.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("target directory must not be empty".into()));
    }
    if dir.exists() && !dir.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "target directory is not a directory: {}",
            dir.display()
        )));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Sanitize `name`, create `target_dir`, and return `target_dir/<sanitized>`
/// whether or not that file already exists.
pub fn destination_in(name: &str, target_dir: &Path) -> Result<PathBuf> {
    let clean = sanitize_filename(name);
    if !is_safe_path_segment(&clean) {
        return Err(Error::InvalidArgument(format!(
            "file name {:?} is not usable after sanitizing (got {:?})",
            name, clean
        )));
    }
    ensure_directory(target_dir)?;
    Ok(target_dir.join(clean))
}

/// A destination for `name` inside `target_dir` that does not overwrite anything.
///
/// Returns `Ok(None)` when the sanitized name is already taken and
/// `allow_rename` is false; with `allow_rename` the next free `stem(n).ext`
/// is returned instead.
pub fn safe_destination(name: &str, target_dir: &Path, allow_rename: bool) -> Result<Option<PathBuf>> {
    let path = destination_in(name, target_dir)?;
    if !is_occupied(&path) {
        debug!(path = %path.display(), "destination is free");
        return Ok(Some(path));
    }
    if allow_rename {
        return resolve_collision(&path).map(Some);
    }
    debug!(path = %path.display(), "destination occupied and renaming not allowed");
    Ok(None)
}
