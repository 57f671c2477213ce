use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Attempts made by [`resolve_collision`] before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

// A dangling symlink still occupies its name, so look at the link itself.
pub(crate) fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// `dir/stem(n).ext`, or `dir/stem(n)` when there is no extension.
fn numbered_variant(candidate: &Path, n: u32) -> PathBuf {
    let stem = candidate.file_stem().unwrap_or_default();
    let mut name = OsString::from(stem);
    name.push(format!("({})", n));
    if let Some(ext) = candidate.extension() {
        name.push(".");
        name.push(ext);
    }
    candidate.with_file_name(name)
}

/// Return `candidate` if nothing is there, otherwise the first free
/// `stem(n).ext` for n = 1, 2, 3, ...
pub fn resolve_collision(candidate: &Path) -> Result<PathBuf> {
    resolve_collision_with_limit(candidate, DEFAULT_MAX_ATTEMPTS)
}

/// Same as [`resolve_collision`] with an explicit bound on numbered attempts.
pub fn resolve_collision_with_limit(candidate: &Path, max_attempts: u32) -> Result<PathBuf> {
    if candidate.file_name().is_none() {
        return Err(Error::InvalidArgument(format!(
            "cannot derive a file name from '{}'",
            candidate.display()
        )));
    }
    if !is_occupied(candidate) {
        return Ok(candidate.to_path_buf());
    }
    for n in 1..=max_attempts {
        let next = numbered_variant(candidate, n);
        if !is_occupied(&next) {
            debug!(original = %candidate.display(), resolved = %next.display(), "resolved name collision");
            return Ok(next);
        }
    }
    Err(Error::TooManyCollisions { path: candidate.to_path_buf(), attempts: max_attempts })
}
