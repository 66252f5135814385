//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/respcomb/respcomb.toml`
//! 3. Local config: `<run_dir>/.respcomb.toml`
//! 4. Environment variables: `RESPCOMB_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Default name of the per-run combination report.
pub const DEFAULT_REPORT_FILENAME: &str = "response_combination.csv";

/// Digits after the decimal point in report values.
pub const DEFAULT_VALUE_PRECISION: usize = 5;

/// Raw settings for intermediate parsing (fields are Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub report_filename: Option<String>,
    pub value_precision: Option<usize>,
}

/// Unified configuration for respcomb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Report file name, relative to the run directory
    pub report_filename: String,
    /// Digits after the decimal point for report values and norms
    pub value_precision: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_filename: DEFAULT_REPORT_FILENAME.to_string(),
            value_precision: DEFAULT_VALUE_PRECISION,
        }
    }
}

/// Get the XDG config directory for respcomb.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "respcomb").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("respcomb.toml"))
}

/// Get the path to the local config file in a run directory.
pub fn local_config_path(run_dir: &Path) -> PathBuf {
    run_dir.join(".respcomb.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Path of the report file for a run.
    pub fn report_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.report_filename)
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            report_filename: overlay
                .report_filename
                .clone()
                .unwrap_or_else(|| self.report_filename.clone()),
            value_precision: overlay.value_precision.unwrap_or(self.value_precision),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `run_dir` - Optional run directory for local config
    pub fn load(run_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = run_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;

        Ok(current)
    }

    /// Apply RESPCOMB_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        // Use config crate just for env var parsing
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("RESPCOMB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("report_filename") {
            settings.report_filename = val;
        }
        match config.get::<usize>("value_precision") {
            Ok(val) => settings.value_precision = val,
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(config_err(e)),
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.report_filename.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "report_filename must not be empty".to_string(),
            });
        }
        if self.value_precision > 17 {
            return Err(ApplicationError::Config {
                message: format!("value_precision {} exceeds 17", self.value_precision),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# respcomb configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/respcomb/respcomb.toml
#   Local:  <run_dir>/.respcomb.toml
#   Env:    RESPCOMB_* environment variables

# Report file, relative to the run directory (recreated at run start)
# report_filename = "response_combination.csv"

# Digits after the decimal point for values and gradient norms
# value_precision = 5
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
