//! Configuration management for heartpc
//!
//! Config file location:
//! - Linux: ~/.config/heartpc/config.toml
//! - macOS: ~/Library/Application Support/heartpc/config.toml
//! - Windows: %APPDATA%/heartpc/config.toml
//!
//! You can override the config location by setting `HEARTPC_CONFIG_PATH`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log file locations
    #[serde(default)]
    pub logs: LogConfig,

    /// Hardware inventory settings
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Benchmark settings
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

impl Config {
    /// Read `config.toml`; a machine without one runs on defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Write the current settings, creating the config directory on first use
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// `HEARTPC_CONFIG_PATH` when set and non-blank, else the platform config dir
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("HEARTPC_CONFIG_PATH") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }

        let dirs = ProjectDirs::from("com", "heartpc", "heartpc")
            .context("Could not determine the heartpc config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Backs `heartpc config init`: an existing file is left untouched
    pub fn init() -> Result<Self> {
        let config = Self::load()?;
        if !Self::config_path()?.exists() {
            config.save()?;
        }
        Ok(config)
    }
}

/// Log file locations (relative paths resolve against the working directory)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// User-facing benchmark/status log
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Provider and property diagnostics
    #[serde(default = "default_error_log_path")]
    pub error_log_path: PathBuf,

    /// Destination of `logs export`
    #[serde(default = "default_log_export_path")]
    pub export_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            error_log_path: default_error_log_path(),
            export_path: default_log_export_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("test_log.txt")
}

fn default_error_log_path() -> PathBuf {
    PathBuf::from("error_log.txt")
}

fn default_log_export_path() -> PathBuf {
    PathBuf::from("exported_logs.txt")
}

/// Which hardware-query provider to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `wmic` on Windows, sysinfo elsewhere
    #[default]
    Auto,
    Wmic,
    Sysinfo,
}

/// Hardware inventory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Destination of the raw components report
    #[serde(default = "default_components_export_path")]
    pub export_path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            export_path: default_components_export_path(),
        }
    }
}

fn default_components_export_path() -> PathBuf {
    PathBuf::from("components_data.txt")
}

/// Benchmark settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Allow only one benchmark to run at a time
    #[serde(default = "default_true")]
    pub serialize_runs: bool,

    /// Directory for disk benchmark scratch files (defaults to the OS temp dir)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            serialize_runs: default_true(),
            scratch_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logs.log_path, PathBuf::from("test_log.txt"));
        assert_eq!(config.logs.error_log_path, PathBuf::from("error_log.txt"));
        assert_eq!(config.inventory.provider, ProviderKind::Auto);
        assert!(config.benchmark.serialize_runs);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [inventory]
            provider = "sysinfo"

            [benchmark]
            serialize_runs = false
            scratch_dir = "/var/tmp/heartpc"
            "#,
        )
        .unwrap();

        assert_eq!(config.inventory.provider, ProviderKind::Sysinfo);
        assert_eq!(
            config.inventory.export_path,
            PathBuf::from("components_data.txt")
        );
        assert!(!config.benchmark.serialize_runs);
        assert_eq!(
            config.benchmark.scratch_dir,
            Some(PathBuf::from("/var/tmp/heartpc"))
        );
        assert_eq!(config.logs, LogConfig::default());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(toml::from_str::<Config>("[inventory]\nprovider = \"smbios\"\n").is_err());
    }

    #[test]
    fn config_survives_toml_round_trip() {
        let mut config = Config::default();
        config.inventory.provider = ProviderKind::Wmic;
        config.benchmark.scratch_dir = Some(PathBuf::from("scratch"));

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn init_writes_defaults_once_at_overridden_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        std::env::set_var("HEARTPC_CONFIG_PATH", &path);

        assert_eq!(Config::config_path().unwrap(), path);
        assert_eq!(Config::init().unwrap(), Config::default());
        assert!(path.exists());

        fs::write(&path, "[benchmark]\nserialize_runs = false\n").unwrap();
        let kept = Config::init().unwrap();
        assert!(!kept.benchmark.serialize_runs);

        std::env::remove_var("HEARTPC_CONFIG_PATH");
    }
}
