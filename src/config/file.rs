//! TOML configuration file loading
//!
//! Supports `~/.config/exthost/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Extension root directories
    #[serde(default)]
    pub extension_dirs: Option<Vec<PathBuf>>,

    /// Whether the host runs as a hosted (multi-tenant) service
    #[serde(default)]
    pub hosted: Option<bool>,

    /// Per-extension configuration overrides, keyed by extension id
    #[serde(default)]
    pub plugins: Map<String, Value>,

    /// Per-runner configuration slices, keyed by extension id
    #[serde(default)]
    pub runners: Map<String, Value>,

    /// Generated asset configuration
    #[serde(default)]
    pub assets: AssetsFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Process-backed plugin configuration
    #[serde(default)]
    pub process: ProcessFileConfig,
}

/// Generated asset configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssetsFileConfig {
    /// Name of the UI framework root object passed to script fragments
    pub framework_root: Option<String>,

    /// Where to write the aggregated script bundle
    pub script_out: Option<PathBuf>,

    /// Where to write the aggregated style bundle
    pub style_out: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,
}

/// Process-backed plugin configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProcessFileConfig {
    /// Upper bound on a single plugin process run, in seconds
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_path(&path))
}

/// Load a TOML config file from an explicit path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_path(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/exthost/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("exthost").join("config.toml"))
}
