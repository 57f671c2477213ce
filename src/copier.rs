use std::env;
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::collision::{resolve_collision_with_limit, DEFAULT_MAX_ATTEMPTS};
use crate::error::{Error, Result};
use crate::paths::ensure_directory;

fn copy_failed(file: &Path, destination: &Path, source: io::Error) -> Error {
    Error::CopyFailed {
        source_path: file.to_path_buf(),
        destination: destination.to_path_buf(),
        source,
    }
}

// fs::copy carries permissions but not timestamps.
fn copy_timestamps(meta: &Metadata, destination: &Path) -> io::Result<()> {
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    // A read-only copy cannot be opened for writing; the owner may still set times.
    let handle = File::options().write(true).open(destination).or_else(|_| File::open(destination))?;
    handle.set_times(times)
}

/// Metadata of `file`, or `CopyFailed` when it is missing or not a regular file.
pub(crate) fn regular_source(file: &Path, destination: &Path) -> Result<Metadata> {
    let meta = fs::metadata(file).map_err(|e| copy_failed(file, destination, e))?;
    if !meta.is_file() {
        let err = io::Error::new(io::ErrorKind::InvalidInput, "source is not a regular file");
        return Err(copy_failed(file, destination, err));
    }
    Ok(meta)
}

/// Copy `file` into `target_dir` (the working directory when `None`) without
/// overwriting anything, and return the path that was written.
///
/// The destination name is `file`'s name, numbered `name(n).ext` when taken.
/// The source is checked before the target directory is created.
pub fn copy_to(file: &Path, target_dir: Option<&Path>) -> Result<PathBuf> {
    copy_to_with_limit(file, target_dir, DEFAULT_MAX_ATTEMPTS)
}

/// [`copy_to`] with an explicit bound on numbered-name attempts.
pub fn copy_to_with_limit(file: &Path, target_dir: Option<&Path>, max_attempts: u32) -> Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| {
        Error::InvalidArgument(format!("source has no file name: {}", file.display()))
    })?;
    let target_dir = match target_dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir()?,
    };
    let requested = target_dir.join(name);
    let meta = regular_source(file, &requested)?;

    ensure_directory(&target_dir)?;
    let destination = resolve_collision_with_limit(&requested, max_attempts)?;
    fs::copy(file, &destination).map_err(|e| copy_failed(file, &destination, e))?;
    copy_timestamps(&meta, &destination).map_err(|e| copy_failed(file, &destination, e))?;

    info!(source = %file.display(), destination = %destination.display(), "copied file");
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn copies_into_target_directory() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("notes.txt");
        fs::write(&src, "hello").unwrap();

        let out = copy_to(&src, Some(dst_dir.path())).unwrap();
        assert_eq!(out, dst_dir.path().join("notes.txt"));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello");
        assert!(src.exists());
    }

    #[test]
    fn never_overwrites_existing_destination() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("notes.txt");
        fs::write(&src, "new").unwrap();
        fs::write(dst_dir.path().join("notes.txt"), "old").unwrap();

        let out = copy_to(&src, Some(dst_dir.path())).unwrap();
        assert_eq!(out, dst_dir.path().join("notes(1).txt"));
        assert_eq!(fs::read_to_string(dst_dir.path().join("notes.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(&out).unwrap(), "new");
    }

    #[test]
    fn preserves_modification_time() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("old.bin");
        fs::write(&src, [1u8, 2, 3]).unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options().write(true).open(&src).unwrap().set_modified(stamp).unwrap();

        let out = copy_to(&src, Some(dst_dir.path())).unwrap();
        assert_eq!(fs::metadata(&out).unwrap().modified().unwrap(), stamp);
    }

    #[test]
    fn missing_source_is_copy_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_to(&dir.path().join("ghost.txt"), Some(dir.path())).unwrap_err();
        assert!(matches!(err, Error::CopyFailed { .. }), "{err:?}");
    }

    #[test]
    fn directory_source_is_copy_failure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("folder");
        fs::create_dir(&src).unwrap();
        let dst = tempfile::tempdir().unwrap();
        let err = copy_to(&src, Some(dst.path())).unwrap_err();
        assert!(matches!(err, Error::CopyFailed { .. }), "{err:?}");
        assert!(!dst.path().join("folder").exists());
    }

    #[test]
    fn bad_source_leaves_no_target_directory_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let err = copy_to(&dir.path().join("ghost.txt"), Some(&target)).unwrap_err();
        assert!(matches!(err, Error::CopyFailed { .. }), "{err:?}");
        assert!(!target.exists());

        let folder = dir.path().join("folder");
        fs::create_dir(&folder).unwrap();
        assert!(copy_to(&folder, Some(&target)).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn attempt_limit_is_honoured() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("n.txt");
        fs::write(&src, "n").unwrap();
        fs::write(dst_dir.path().join("n.txt"), "x").unwrap();
        fs::write(dst_dir.path().join("n(1).txt"), "x").unwrap();

        let err = copy_to_with_limit(&src, Some(dst_dir.path()), 1).unwrap_err();
        assert!(matches!(err, Error::TooManyCollisions { attempts: 1, .. }), "{err:?}");
        let out = copy_to_with_limit(&src, Some(dst_dir.path()), 2).unwrap();
        assert_eq!(out, dst_dir.path().join("n(2).txt"));
    }

    #[test]
    fn creates_missing_target_directory() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.txt");
        fs::write(&src, "a").unwrap();
        let target = src_dir.path().join("nested").join("out");
        let out = copy_to(&src, Some(&target)).unwrap();
        assert_eq!(out, target.join("a.txt"));
    }
}
