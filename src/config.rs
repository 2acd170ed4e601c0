//! Configuration management
//!
//! Settings are read once at startup from a JSON file and a line-delimited
//! sample list, then passed by reference to whatever needs them. The settings
//! file carries the save defaults (filename, directory, whether the filename
//! may be edited) and may override acquisition defaults and the simulated
//! driver.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{log_config_error, ConfigError};
use crate::hardware::SimulatedDriverConfig;
use crate::procedure::RunParameters;

/// Default settings file name, looked up in the working directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Default sample list file name, looked up in the working directory
pub const SAMPLES_FILE: &str = "Samples.txt";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub settings: SaveSettings,
    #[serde(default)]
    pub acquisition: RunParameters,
    #[serde(default)]
    pub simulator: SimulatedDriverConfig,
    #[serde(default)]
    pub host: HostConfig,
    /// Loaded from the sample list, never from the settings file
    #[serde(skip)]
    pub samples: Vec<String>,
}

/// Where and how results are saved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSettings {
    pub default_filename: String,
    pub default_directory: PathBuf,
    /// When false only the directory of a save path may differ from the default
    pub editable_filename: bool,
    /// Recognised extensions, the first one is the default
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    ["dat", "csv", "txt", "data"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            default_filename: "data".to_string(),
            default_directory: PathBuf::from("."),
            editable_filename: true,
            extensions: default_extensions(),
        }
    }
}

impl SaveSettings {
    /// Default save path: directory, filename and first extension.
    pub fn default_path(&self) -> PathBuf {
        let mut path = self.default_directory.join(&self.default_filename);
        if path.extension().is_none() {
            if let Some(ext) = self.extensions.first() {
                path.set_extension(ext);
            }
        }
        path
    }

    /// Final destination for a save-as request.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if the filename is fixed and `requested`
    /// names a different file.
    pub fn resolve_save_path(&self, requested: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let default = self.default_path();
        let Some(requested) = requested else {
            return Ok(default);
        };

        if requested.is_dir() {
            let file_name = default.file_name().unwrap_or_default();
            return Ok(requested.join(file_name));
        }

        if !self.editable_filename && requested.file_name() != default.file_name() {
            return Err(ConfigError::InvalidValue {
                key: "editable_filename".to_string(),
                reason: format!(
                    "filename is fixed to {:?}, got {}",
                    default.file_name().unwrap_or_default(),
                    requested.display()
                ),
            });
        }
        Ok(requested.to_path_buf())
    }
}

/// Run host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Per-run temporary files; wiped when a host is created
    pub temp_directory: PathBuf,
    /// Buffered events per live subscriber
    pub event_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            temp_directory: std::env::temp_dir().join("daq_recorder"),
            event_capacity: 1024,
        }
    }
}

impl AppConfig {
    /// Load settings and sample list, failing on anything missing or malformed
    ///
    /// # Arguments
    /// * `settings_path` - JSON settings file
    /// * `samples_path` - Line-delimited sample names
    ///
    /// # Returns
    /// * `Ok(AppConfig)` - Loaded configuration
    /// * `Err(ConfigError::ConfigurationMissing)` - A resource is absent or unparsable
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        settings_path: P,
        samples_path: Q,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_settings(settings_path)?;
        config.samples = load_sample_list(samples_path)?;
        config.validate()?;
        tracing::info!(
            "[Config] Loaded settings with {} samples",
            config.samples.len()
        );
        Ok(config)
    }

    /// Like [`AppConfig::load`], falling back to defaults per resource
    pub fn load_or_default<P: AsRef<Path>, Q: AsRef<Path>>(
        settings_path: P,
        samples_path: Q,
    ) -> Self {
        let mut config = match Self::load_settings(&settings_path).and_then(|config| {
            config.validate()?;
            Ok(config)
        }) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("[Config] {}. Using default settings.", err);
                Self::default()
            }
        };

        config.samples = match load_sample_list(&samples_path) {
            Ok(samples) => samples,
            Err(err) => {
                tracing::warn!("[Config] {}. Continuing without a sample list.", err);
                Vec::new()
            }
        };
        config
    }

    fn load_settings<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| missing(path, err))?;
        let config: AppConfig = serde_json::from_str(&contents).map_err(|err| {
            let err = missing(path, err);
            log_config_error(&err, "load_settings");
            err
        })?;
        tracing::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.default_filename.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "default_filename".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.host.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "host.event_capacity".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Read a line-delimited sample list; blank lines are skipped.
pub fn load_sample_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|err| missing(path, err))?;
    Ok(parse_sample_list(&contents))
}

pub fn parse_sample_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn missing(path: &Path, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::ConfigurationMissing {
        resource: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "daq_recorder_config_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    const SETTINGS: &str = r#"{
        "settings": {
            "default_filename": "run",
            "default_directory": "/data/lab",
            "editable_filename": false
        }
    }"#;

    #[test]
    fn test_parse_sample_list_skips_blank_lines() {
        let samples = parse_sample_list("Sample A\n\n  Sample B  \r\n\n");
        assert_eq!(samples, vec!["Sample A".to_string(), "Sample B".to_string()]);
    }

    #[test]
    fn test_load_settings_and_samples() {
        let settings = scratch_file("settings.json", SETTINGS);
        let samples = scratch_file("Samples.txt", "Quartz\nSilicon\n");

        let config = AppConfig::load(&settings, &samples).unwrap();
        assert_eq!(config.settings.default_filename, "run");
        assert!(!config.settings.editable_filename);
        assert_eq!(config.settings.extensions[0], "dat");
        assert_eq!(config.samples, vec!["Quartz", "Silicon"]);
        assert_eq!(config.acquisition, RunParameters::default());
    }

    #[test]
    fn test_missing_sample_list_is_configuration_missing() {
        let settings = scratch_file("settings.json", SETTINGS);
        let err = AppConfig::load(&settings, "/nonexistent/Samples.txt").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_malformed_settings_is_configuration_missing() {
        let settings = scratch_file("settings.json", "{ not json");
        let samples = scratch_file("Samples.txt", "A\n");
        let err = AppConfig::load(&settings, &samples).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let config = AppConfig::load_or_default("/nonexistent/settings.json", "/nonexistent/s.txt");
        assert_eq!(config.settings.default_filename, "data");
        assert!(config.samples.is_empty());
    }

    #[test]
    fn test_acquisition_overrides() {
        let settings = scratch_file(
            "settings.json",
            r#"{
                "settings": {"default_filename": "run", "default_directory": ".", "editable_filename": true},
                "acquisition": {"device": "Dev2", "data_points": 50}
            }"#,
        );
        let samples = scratch_file("Samples.txt", "");
        let config = AppConfig::load(&settings, &samples).unwrap();
        assert_eq!(config.acquisition.device, "Dev2");
        assert_eq!(config.acquisition.data_points, 50);
        assert_eq!(config.acquisition.input_port, "ai0");
    }

    #[test]
    fn test_default_path_adds_extension() {
        let settings = SaveSettings {
            default_filename: "run".to_string(),
            default_directory: PathBuf::from("/data/lab"),
            ..SaveSettings::default()
        };
        assert_eq!(settings.default_path(), PathBuf::from("/data/lab/run.dat"));
    }

    #[test]
    fn test_fixed_filename_rejects_other_names() {
        let settings = SaveSettings {
            default_filename: "run".to_string(),
            default_directory: PathBuf::from("/data/lab"),
            editable_filename: false,
            ..SaveSettings::default()
        };
        assert!(settings
            .resolve_save_path(Some(Path::new("/elsewhere/run.dat")))
            .is_ok());
        assert!(settings
            .resolve_save_path(Some(Path::new("/elsewhere/other.dat")))
            .is_err());
        assert_eq!(
            settings.resolve_save_path(None).unwrap(),
            PathBuf::from("/data/lab/run.dat")
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.settings.default_filename,
            config.settings.default_filename
        );
        assert_eq!(parsed.host.event_capacity, 1024);
    }
}
