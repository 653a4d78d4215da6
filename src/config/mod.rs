//! Configuration management for the extension host

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::plugins::default_extension_dirs;
use crate::{Error, Result};
use file::ConfigFile;

/// Default HTTP port for `exthost serve`
pub const DEFAULT_PORT: u16 = 18800;

/// Default name of the UI framework root object
pub const DEFAULT_FRAMEWORK_ROOT: &str = "angular";

/// Extension host configuration
///
/// Shared read-only with every extension through the host context.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directories scanned for extensions
    pub extension_dirs: Vec<PathBuf>,

    /// Hosted (multi-tenant) deployment; providers are tagged with this flag
    pub hosted: bool,

    /// Per-extension configuration overrides, keyed by extension id
    pub plugins: Map<String, Value>,

    /// Per-runner configuration slices, keyed by extension id
    pub runners: Map<String, Value>,

    /// Generated asset configuration
    pub assets: AssetsConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Process-backed plugin configuration
    pub process: ProcessConfig,
}

/// Generated asset configuration
#[derive(Debug, Clone)]
pub struct AssetsConfig {
    /// Name of the UI framework root object handed to each script fragment
    pub framework_root: String,

    /// Where to write the aggregated script bundle (in-memory when `None`)
    pub script_out: Option<PathBuf>,

    /// Where to write the aggregated style bundle (in-memory when `None`)
    pub style_out: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            framework_root: DEFAULT_FRAMEWORK_ROOT.to_string(),
            script_out: None,
            style_out: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Process-backed plugin configuration
#[derive(Debug, Clone, Default)]
pub struct ProcessConfig {
    /// Upper bound on a single plugin process run; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension_dirs: default_extension_dirs(),
            hosted: false,
            plugins: Map::new(),
            runners: Map::new(),
            assets: AssetsConfig::default(),
            server: ServerConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an environment override is malformed
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let extension_dirs = env("EXTHOST_DIRS")
            .map(|dirs| std::env::split_paths(&dirs).collect())
            .or(fc.extension_dirs)
            .unwrap_or_else(default_extension_dirs);

        let hosted = match env("EXTHOST_HOSTED") {
            Some(value) => parse_bool("EXTHOST_HOSTED", &value)?,
            None => fc.hosted.unwrap_or(false),
        };

        let port = match env("EXTHOST_PORT") {
            Some(value) => value
                .parse()
                .map_err(|e| Error::Config(format!("EXTHOST_PORT `{value}`: {e}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        let timeout_secs = match env("EXTHOST_PROCESS_TIMEOUT_SECS") {
            Some(value) => Some(value.parse::<u64>().map_err(|e| {
                Error::Config(format!("EXTHOST_PROCESS_TIMEOUT_SECS `{value}`: {e}"))
            })?),
            None => fc.process.timeout_secs,
        };

        let assets = AssetsConfig {
            framework_root: env("EXTHOST_FRAMEWORK_ROOT")
                .or(fc.assets.framework_root)
                .unwrap_or_else(|| DEFAULT_FRAMEWORK_ROOT.to_string()),
            script_out: fc.assets.script_out,
            style_out: fc.assets.style_out,
        };

        Ok(Self {
            extension_dirs,
            hosted,
            plugins: fc.plugins,
            runners: fc.runners,
            assets,
            server: ServerConfig { port },
            process: ProcessConfig {
                timeout: timeout_secs.map(Duration::from_secs),
            },
        })
    }

    /// Host overrides for one extension
    #[must_use]
    pub fn plugin_config(&self, id: &str) -> Option<&Value> {
        self.plugins.get(id)
    }

    /// Configuration slice for one runner
    #[must_use]
    pub fn runner_config(&self, id: &str) -> Option<&Value> {
        self.runners.get(id)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("{key} `{other}` is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(ConfigFile::default(), env_of(&[])).unwrap();
        assert!(!config.hosted);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.assets.framework_root, DEFAULT_FRAMEWORK_ROOT);
        assert!(config.process.timeout.is_none());
        assert_eq!(config.extension_dirs, default_extension_dirs());
    }

    #[test]
    fn env_overrides_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            extension_dirs = ["/from/file"]
            hosted = false
            [server]
            port = 9000
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_of(&[
                ("EXTHOST_DIRS", "/a/ext:/b/ext"),
                ("EXTHOST_HOSTED", "true"),
                ("EXTHOST_PROCESS_TIMEOUT_SECS", "5"),
            ]),
        )
        .unwrap();

        assert!(config.hosted);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.process.timeout, Some(Duration::from_secs(5)));
        #[cfg(unix)]
        assert_eq!(
            config.extension_dirs,
            vec![PathBuf::from("/a/ext"), PathBuf::from("/b/ext")]
        );
    }

    #[test]
    fn malformed_env_is_an_error() {
        let err = Config::from_sources(ConfigFile::default(), env_of(&[("EXTHOST_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_sources(ConfigFile::default(), env_of(&[("EXTHOST_HOSTED", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("EXTHOST_HOSTED"));
    }

    #[test]
    fn plugin_lookup() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [plugins.github]
            client_id = "abc"
            "#,
        )
        .unwrap();
        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(config.plugin_config("github").unwrap()["client_id"], "abc");
        assert!(config.runner_config("github").is_none());
    }
}
