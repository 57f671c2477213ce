use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the filesystem helpers.
///
/// An occupied destination is not listed here: `safe_destination` reports it
/// as `Ok(None)` so the caller can decide what to do.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Could not copy '{}' to '{}': {source}", source_path.display(), destination.display())]
    CopyFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No free name for '{}' after {attempts} attempts", path.display())]
    TooManyCollisions { path: PathBuf, attempts: u32 },

    #[error("CSV header mismatch in '{}': expected [{}], found [{}]", path.display(), expected.join(","), found.join(","))]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
