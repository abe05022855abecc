//! Configuration management for pixbatch
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. the embedded `default-config.toml`
//! 2. `~/.config/pixbatch/config.{toml,json,yaml,yml}`
//! 3. `pixbatch.{toml,json,yaml,yml}` in the working directory, or only the
//!    file passed with `--config`
//! 4. `PIXBATCH_`-prefixed environment variables (`__` separates sections)
//! 5. command-line overrides
//!
//! Values are validated when converted into runtime settings, before any
//! input is touched.

pub mod smart_load;

use crate::error::ConfigError;
use crate::parallel::DispatchConfig;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PixbatchConfig {
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

/// Batch and dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Directory whose top-level images form the batch
    pub input_dir: PathBuf,

    /// Root under which each item gets its own directory
    pub output_dir: PathBuf,

    /// Concurrent workers (unset = logical CPU count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<i64>,

    /// Per-item deadline in seconds (0 = none)
    #[serde(default)]
    pub item_timeout_secs: u64,

    /// Show a progress bar while running
    #[serde(default = "default_progress")]
    pub progress: bool,
}

/// Derivative encoding settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// JPEG quality for every derivative (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i64,
}

fn default_progress() -> bool {
    true
}

fn default_jpeg_quality() -> i64 {
    85
}

impl PixbatchConfig {
    /// Load the layered configuration
    ///
    /// `overrides` is merged last; only keys present in it take effect.
    pub fn load(custom_config: Option<&str>, overrides: Option<serde_json::Value>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            if !Path::new(custom_path).is_file() {
                return Err(figment::Error::from(format!("config file not found: {custom_path}")).into());
            }
            tracing::debug!("Using config file {}", custom_path);
            figment = figment.merge(smart_load::auto(custom_path));
        } else {
            if let Some(user_dir) = Self::user_config_dir() {
                figment = figment
                    .merge(Toml::file(user_dir.join("config.toml")))
                    .merge(Json::file(user_dir.join("config.json")))
                    .merge(Yaml::file(user_dir.join("config.yaml")))
                    .merge(Yaml::file(user_dir.join("config.yml")));
            }
            figment = figment
                .merge(Toml::file("pixbatch.toml"))
                .merge(Json::file("pixbatch.json"))
                .merge(Yaml::file("pixbatch.yaml"))
                .merge(Yaml::file("pixbatch.yml"));
        }

        // Environment variables override files
        figment = figment.merge(Env::prefixed("PIXBATCH_").split("__"));

        if let Some(overrides) = overrides {
            tracing::trace!("Applying CLI overrides: {}", overrides);
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: Self = figment.extract()?;
        tracing::trace!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Concurrency bound after defaulting to the host's logical CPUs
    pub fn resolved_concurrency(&self) -> i64 {
        self.batch
            .max_concurrency
            .unwrap_or_else(|| num_cpus::get() as i64)
    }

    /// Validated dispatcher settings
    pub fn dispatch_config(&self) -> Result<DispatchConfig, ConfigError> {
        let timeout = Duration::from_secs(self.batch.item_timeout_secs);
        Ok(DispatchConfig::new(self.resolved_concurrency())?.with_item_timeout(Some(timeout)))
    }

    /// Validated JPEG quality
    pub fn jpeg_quality(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.output.jpeg_quality)
            .ok()
            .filter(|q| (1..=100).contains(q))
            .ok_or(ConfigError::InvalidQuality(self.output.jpeg_quality))
    }

    /// Check every value that has a constrained range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatch_config()?;
        self.jpeg_quality()?;
        Ok(())
    }

    fn user_config_dir() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("pixbatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: PixbatchConfig = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .extract()
            .unwrap();
        assert_eq!(config.batch.input_dir, PathBuf::from("input"));
        assert_eq!(config.batch.output_dir, PathBuf::from("output"));
        assert_eq!(config.batch.max_concurrency, None);
        assert_eq!(config.batch.item_timeout_secs, 0);
        assert!(config.batch.progress);
        assert_eq!(config.output.jpeg_quality, 85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_file_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "batch:\n  output_dir: derived\n  max_concurrency: 3\noutput:\n  jpeg_quality: 70\n").unwrap();

        let config = PixbatchConfig::load(path.to_str(), None).unwrap();
        assert_eq!(config.batch.output_dir, PathBuf::from("derived"));
        assert_eq!(config.resolved_concurrency(), 3);
        assert_eq!(config.jpeg_quality().unwrap(), 70);

        let overrides = serde_json::json!({ "batch": { "max_concurrency": 5 } });
        let config = PixbatchConfig::load(path.to_str(), Some(overrides)).unwrap();
        assert_eq!(config.resolved_concurrency(), 5);
        // Keys absent from the overrides keep their file values
        assert_eq!(config.batch.output_dir, PathBuf::from("derived"));
    }

    #[test]
    fn test_missing_custom_file_is_an_error() {
        let err = PixbatchConfig::load(Some("/definitely/not/here.toml"), None).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config: PixbatchConfig = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .extract()
            .unwrap();

        config.batch.max_concurrency = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency(0))));
        config.batch.max_concurrency = Some(-2);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency(-2))));

        config.batch.max_concurrency = Some(2);
        config.output.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidQuality(0))));
        config.output.jpeg_quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidQuality(101))));
    }

    #[test]
    fn test_unset_concurrency_uses_cpu_count() {
        let config: PixbatchConfig = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .extract()
            .unwrap();
        assert_eq!(config.resolved_concurrency(), num_cpus::get() as i64);
        assert!(config.dispatch_config().unwrap().max_concurrency() >= 1);
    }
}
