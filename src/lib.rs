//! Small helpers for copying and organizing files without clobbering anything:
//! file name sanitizing, collision-free destinations, date and name-prefix
//! sorting, CSV appends with a fixed header, recursive file listing, and a
//! rotating log setup.

pub mod classify;
pub mod collision;
pub mod config;
pub mod copier;
pub mod csv_append;
pub mod enumerate;
pub mod error;
pub mod logging;
pub mod paths;
pub mod util;

pub use classify::{classify_and_copy, classify_and_copy_with_limit, copy_by_modified_date, copy_by_name_prefix, timestamp_subdirectory, Classification, YearMonth};
pub use collision::{resolve_collision, resolve_collision_with_limit, DEFAULT_MAX_ATTEMPTS};
pub use copier::{copy_to, copy_to_with_limit};
pub use csv_append::{append_records, CsvRecord};
pub use enumerate::{list_files, try_list_files, GlobPattern};
pub use error::{Error, Result};
pub use logging::{configure_logging, LogSettings, RotatingFileWriter, Rotator};
pub use paths::{destination_in, ensure_directory, safe_destination};
pub use util::sanitize_filename;
