//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CPL_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "cpl.db";

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bootstrap configuration read from `cpl.toml`
///
/// Everything here is optional; runtime behaviour knobs live in the
/// string-keyed `[settings]` table and are layered by [`crate::settings::Settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub ai_api_key: Option<String>,
    pub ai_model: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from_address: Option<String>,
    /// String-keyed runtime settings (e.g. `outreach_enabled = "true"`)
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the platform config file, or defaults when none exists
    pub fn load_default() -> Self {
        match default_config_path().filter(|p| p.exists()) {
            Some(path) => match Self::load(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("{}; using defaults", e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }
}

/// Platform config file location (`<config dir>/cpl/cpl.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cpl").join("cpl.toml"))
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `CPL_ROOT_FOLDER` environment variable
/// 3. TOML config `root_folder`
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cpl"))
        .unwrap_or_else(|| PathBuf::from("./cpl_data"))
}

/// Whether a secret value counts as configured
///
/// Blank values and the literal placeholder `x` (as shipped in sample
/// configs) mean "not configured", which switches clients to fallbacks.
pub fn is_configured_secret(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("x")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_secret_is_not_configured() {
        assert!(!is_configured_secret(""));
        assert!(!is_configured_secret("   "));
        assert!(!is_configured_secret("x"));
        assert!(!is_configured_secret("X"));
        assert!(is_configured_secret("sk-live-123"));
    }

    #[test]
    fn test_cli_arg_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_parse_settings_table() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 5810
            ai_api_key = "x"

            [logging]
            level = "debug"

            [settings]
            outreach_enabled = "true"
            outreach_max_daily = "25"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(5810));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.settings.get("outreach_max_daily").map(String::as_str), Some("25"));
    }
}
