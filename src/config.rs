use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;

use crate::collision::DEFAULT_MAX_ATTEMPTS;
use crate::csv_append::{DEFAULT_CSV_DIRECTORY, DEFAULT_CSV_FILE};
use crate::enumerate::DEFAULT_PATTERN;
use crate::logging::DEFAULT_LOG_DIR;

pub const CONFIG_FILE_NAME: &str = "fileplumb.json";

/// Settings for the command-line tool. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub root: PathBuf,
    pub pattern: String,
    pub log_name: String,
    pub console_level: String,
    pub file_level: String,
    pub log_dir: PathBuf,
    pub csv_directory: PathBuf,
    pub csv_file: String,
    pub prefix_characters: usize,
    pub max_collision_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.to_string(),
            log_name: "fileplumb".to_string(),
            console_level: "INFO".to_string(),
            file_level: "DEBUG".to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            csv_directory: PathBuf::from(DEFAULT_CSV_DIRECTORY),
            csv_file: DEFAULT_CSV_FILE.to_string(),
            prefix_characters: 1,
            max_collision_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Read `path`, or `fileplumb.json` in `dir` when no path is given.
/// A missing default file means defaults; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = dir.join(CONFIG_FILE_NAME);
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };
    let s = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&s)
        .with_context(|| format!("Failed to parse config file {} (JSON)", path.display()))?;
    if !value.is_object() {
        anyhow::bail!("{} root must be a JSON object", path.display());
    }
    let config: Config = serde_json::from_value(value)
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    if config.prefix_characters == 0 {
        anyhow::bail!("prefix_characters must be a positive integer");
    }
    Ok(config)
}
