//! Storage Layer
//!
//! Persists the finalized admission record in a local SQLite key-value
//! table, where downstream screens pick it up.

pub mod database;
pub mod records;

use anyhow::Result;
use std::path::PathBuf;

pub use database::Database;
pub use records::{MemoryStore, RecordStore, RECORD_KEY};

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "admissionscanner", "AdmissionScanner")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    let data_dir = proj_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "admissionscanner", "AdmissionScanner")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default database file inside the data directory
pub fn default_database_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("scanner.db"))
}
