//! Sorting copies into subdirectories derived from the file itself: either
//! `root/YYYY/MM/` from the modification time, or `root/<prefix>/` from the
//! first characters of the file name.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local};
use tracing::debug;

use crate::collision::DEFAULT_MAX_ATTEMPTS;
use crate::copier::{copy_to_with_limit, regular_source};
use crate::error::{Error, Result};
use crate::paths::ensure_directory;
use crate::util::is_safe_path_segment;

/// Calendar year and month of a timestamp in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_system_time(time: SystemTime) -> Self {
        let local: DateTime<Local> = time.into();
        YearMonth { year: local.year(), month: local.month() }
    }

    /// `YYYY/MM` with a zero-padded month.
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(self.year.to_string()).join(format!("{:02}", self.month))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    ModifiedDate,
    NamePrefix { characters: usize },
}

impl Classification {
    pub fn name_prefix(characters: usize) -> Result<Self> {
        if characters == 0 {
            return Err(Error::InvalidArgument("characters must be a positive integer, got 0".into()));
        }
        Ok(Classification::NamePrefix { characters })
    }

    /// Parse a prefix length given as text, e.g. on the command line.
    pub fn name_prefix_from_str(value: &str) -> Result<Self> {
        let n: i64 = value.trim().parse().map_err(|_| {
            Error::InvalidArgument(format!("characters must be a positive integer, got {:?}", value))
        })?;
        if n <= 0 {
            return Err(Error::InvalidArgument(format!("characters must be a positive integer, got {}", n)));
        }
        let n = usize::try_from(n)
            .map_err(|_| Error::InvalidArgument(format!("characters value too large: {}", n)))?;
        Classification::name_prefix(n)
    }

    /// Subdirectory of the target root this file belongs in.
    pub fn subdirectory(&self, file: &Path) -> Result<PathBuf> {
        match self {
            Classification::ModifiedDate => {
                let modified = fs::metadata(file).and_then(|m| m.modified()).map_err(|e| Error::CopyFailed {
                    source_path: file.to_path_buf(),
                    destination: PathBuf::new(),
                    source: e,
                })?;
                Ok(YearMonth::from_system_time(modified).relative_dir())
            }
            Classification::NamePrefix { characters } => {
                if *characters == 0 {
                    return Err(Error::InvalidArgument("characters must be a positive integer, got 0".into()));
                }
                let name = file.file_name().ok_or_else(|| {
                    Error::InvalidArgument(format!("source has no file name: {}", file.display()))
                })?;
                // Shorter names use the whole name as the prefix.
                let prefix: String = name.to_string_lossy().chars().take(*characters).collect();
                if !is_safe_path_segment(&prefix) {
                    return Err(Error::InvalidArgument(format!(
                        "name prefix {:?} of '{}' cannot be used as a directory",
                        prefix,
                        file.display()
                    )));
                }
                Ok(PathBuf::from(prefix))
            }
        }
    }
}

fn root_or_cwd(target_root: Option<&Path>) -> Result<PathBuf> {
    match target_root {
        Some(root) => Ok(root.to_path_buf()),
        None => Ok(env::current_dir()?),
    }
}

/// Create and return `root/YYYY/MM` for `file`'s modification time.
pub fn timestamp_subdirectory(file: &Path, target_root: Option<&Path>) -> Result<PathBuf> {
    let dir = root_or_cwd(target_root)?.join(Classification::ModifiedDate.subdirectory(file)?);
    ensure_directory(&dir)?;
    Ok(dir)
}

/// Copy `file` into the subdirectory of `target_root` (the working directory
/// when `None`) chosen by `classification`. Returns the written path.
pub fn classify_and_copy(file: &Path, target_root: Option<&Path>, classification: &Classification) -> Result<PathBuf> {
    classify_and_copy_with_limit(file, target_root, classification, DEFAULT_MAX_ATTEMPTS)
}

/// [`classify_and_copy`] with an explicit bound on numbered-name attempts.
pub fn classify_and_copy_with_limit(
    file: &Path,
    target_root: Option<&Path>,
    classification: &Classification,
    max_attempts: u32,
) -> Result<PathBuf> {
    let root = root_or_cwd(target_root)?;
    let dir = root.join(classification.subdirectory(file)?);
    regular_source(file, &dir)?;
    ensure_directory(&dir)?;
    debug!(file = %file.display(), dir = %dir.display(), ?classification, "classified file");
    copy_to_with_limit(file, Some(&dir), max_attempts)
}

/// `root/YYYY/MM/<name>` from the modification time.
pub fn copy_by_modified_date(file: &Path, target_root: Option<&Path>) -> Result<PathBuf> {
    classify_and_copy(file, target_root, &Classification::ModifiedDate)
}

/// `root/<first N characters>/<name>`; `characters` defaults to 1.
pub fn copy_by_name_prefix(file: &Path, target_root: Option<&Path>, characters: Option<usize>) -> Result<PathBuf> {
    let classification = Classification::name_prefix(characters.unwrap_or(1))?;
    classify_and_copy(file, target_root, &classification)
}
