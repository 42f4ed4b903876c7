//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::{ConsensusPolicy, ExtractionOptions};
use crate::capture::CaptureConfig;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera capture settings
    pub capture: CaptureSettings,
    /// Stopping rule settings
    pub consensus: ConsensusSettings,
    /// Field extraction settings
    pub extraction: ExtractionSettings,
    /// Record storage settings
    pub storage: StorageSettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frames pulled from the camera per second
    pub target_fps: u32,
    /// OCR results buffered between the capture thread and the controller
    pub channel_capacity: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            target_fps: 10,
            channel_capacity: 32,
        }
    }
}

/// Consensus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    /// Agreeing reads needed for every required field
    pub threshold: usize,
    /// Give up after this many snapshots with text (unset = never)
    pub max_snapshots: Option<usize>,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            threshold: crate::analysis::consensus::DEFAULT_THRESHOLD,
            max_snapshots: None,
        }
    }
}

/// Extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Two-digit years below this are read as `20xx`
    pub year_pivot: u32,
    /// A lone unlabeled date older than this is a birth date
    pub dob_min_age_years: i32,
    /// Reject billing numbers failing the mod-11 check
    pub validate_billing_check_digit: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            year_pivot: crate::analysis::dates::DEFAULT_YEAR_PIVOT,
            dob_min_age_years: 10,
            validate_billing_check_digit: false,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite file; unset uses the platform data directory
    pub database_path: Option<PathBuf>,
    /// Key the finalized record is stored under
    pub record_key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            record_key: crate::storage::records::RECORD_KEY.to_string(),
        }
    }
}

impl AppConfig {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            target_fps: self.capture.target_fps,
            channel_capacity: self.capture.channel_capacity.max(1),
        }
    }

    pub fn consensus_policy(&self) -> ConsensusPolicy {
        ConsensusPolicy::with_threshold(self.consensus.threshold)
    }

    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            year_pivot: self.extraction.year_pivot,
            dob_min_age_years: self.extraction.dob_min_age_years,
            validate_billing_check_digit: self.extraction.validate_billing_check_digit,
            ..ExtractionOptions::default()
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check capture defaults
        assert_eq!(config.capture.target_fps, 10);
        assert_eq!(config.capture.channel_capacity, 32);

        // Check consensus defaults
        assert_eq!(config.consensus.threshold, 5);
        assert!(config.consensus.max_snapshots.is_none());

        // Check extraction defaults
        assert_eq!(config.extraction.year_pivot, 50);
        assert_eq!(config.extraction.dob_min_age_years, 10);
        assert!(!config.extraction.validate_billing_check_digit);

        // Check storage defaults
        assert!(config.storage.database_path.is_none());
        assert_eq!(config.storage.record_key, "scanned_admission_record");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.capture.target_fps, parsed.capture.target_fps);
        assert_eq!(config.consensus.threshold, parsed.consensus.threshold);
        assert_eq!(config.extraction.year_pivot, parsed.extraction.year_pivot);
        assert_eq!(config.storage.record_key, parsed.storage.record_key);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[consensus]\nthreshold = 3\n").unwrap();
        assert_eq!(parsed.consensus.threshold, 3);
        assert_eq!(parsed.capture.target_fps, 10);
        assert_eq!(parsed.storage.record_key, "scanned_admission_record");
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.consensus.max_snapshots = Some(40);
        config.extraction.validate_billing_check_digit = true;
        config.storage.database_path = Some(PathBuf::from("/tmp/scan.db"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.consensus.max_snapshots, Some(40));
        assert!(parsed.extraction.validate_billing_check_digit);
        assert_eq!(parsed.storage.database_path, Some(PathBuf::from("/tmp/scan.db")));
    }

    #[test]
    fn test_derived_component_settings() {
        let mut config = AppConfig::default();
        config.consensus.threshold = 0;
        config.capture.channel_capacity = 0;
        config.extraction.year_pivot = 30;

        assert_eq!(config.consensus_policy().threshold, 1);
        assert_eq!(config.capture_config().channel_capacity, 1);
        assert_eq!(config.extraction_options().year_pivot, 30);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.capture.target_fps, loaded.capture.target_fps);
        assert_eq!(config.consensus.threshold, loaded.consensus.threshold);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
