//! Extension manifest format (`extension.json` or the `extension` section of `package.json`)

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dedicated manifest file name
pub const MANIFEST_FILE: &str = "extension.json";

/// Package descriptor file name
pub const PACKAGE_FILE: &str = "package.json";

/// Key of the extension section inside the package descriptor
pub const PACKAGE_SECTION: &str = "extension";

/// Extension manifest describing an extension's identity and capabilities
///
/// Every field is optional; the id may be derived from the package name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    /// Unique extension identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Declared category (`job`, `runner`, `provider`, `basic`)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Ordering hint for list-style enumeration
    #[serde(default)]
    pub weight: Option<i64>,
    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,
    /// Icon shown next to the title in the host UI
    #[serde(default)]
    pub icon: Option<String>,
    /// Server-side setup entry point, relative to the extension directory
    #[serde(default)]
    pub webapp: Option<String>,
    /// Background setup entry point, relative to the extension directory
    #[serde(default)]
    pub worker: Option<String>,
    /// Templates: name to inline text or a relative `.html` path
    #[serde(default)]
    pub templates: IndexMap<String, String>,
    /// Primary configuration UI block (`true` or an object)
    #[serde(default)]
    pub config: Option<Value>,
    /// Per-user configuration UI block
    #[serde(default)]
    pub user_config: Option<Value>,
    /// Per-account configuration UI block (provider extensions)
    #[serde(default)]
    pub account_config: Option<Value>,
    /// Status block shown on build pages
    #[serde(default, rename = "build-status")]
    pub build_status: Option<Value>,
    /// Anything else the manifest carries
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Subset of `package.json` the resolver cares about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name, used as the fallback extension id
    #[serde(default)]
    pub name: Option<String>,
    /// Package version
    #[serde(default)]
    pub version: Option<String>,
    /// Package description
    #[serde(default)]
    pub description: Option<String>,
    /// Embedded extension section
    #[serde(default, rename = "extension")]
    pub extension: Option<ExtensionManifest>,
}

impl ExtensionManifest {
    /// Look up a manifest field by its wire name
    ///
    /// Used for fields whose name depends on the category, such as the per-user
    /// configuration block.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match name {
            "config" => self.config.as_ref(),
            "userConfig" => self.user_config.as_ref(),
            "accountConfig" => self.account_config.as_ref(),
            "build-status" => self.build_status.as_ref(),
            other => self.extra.get(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_manifest() {
        let json = r#"{
            "id": "github",
            "type": "provider",
            "weight": 3,
            "title": "GitHub",
            "webapp": "webapp.sh",
            "templates": {
                "github-inline": "<div>hi</div>",
                "github-file": "tpl/file.html"
            },
            "config": true,
            "accountConfig": { "script": "config/account.js" },
            "build-status": { "template": "status.html" },
            "homepage": "https://example.com"
        }"#;

        let manifest: ExtensionManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.id.as_deref(), Some("github"));
        assert_eq!(manifest.kind.as_deref(), Some("provider"));
        assert_eq!(manifest.weight, Some(3));
        assert_eq!(manifest.webapp.as_deref(), Some("webapp.sh"));
        assert!(manifest.worker.is_none());
        assert_eq!(manifest.templates.len(), 2);
        assert_eq!(manifest.config, Some(Value::Bool(true)));
        assert!(manifest.field("accountConfig").is_some());
        assert!(manifest.field("build-status").is_some());
        assert_eq!(manifest.extra["homepage"], "https://example.com");
    }

    #[test]
    fn deserialize_minimal_manifest() {
        let manifest: ExtensionManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.id.is_none());
        assert!(manifest.kind.is_none());
        assert!(manifest.weight.is_none());
        assert!(manifest.templates.is_empty());
        assert!(manifest.field("config").is_none());
    }

    #[test]
    fn package_section() {
        let json = r#"{
            "name": "exthost-slack",
            "version": "1.2.0",
            "dependencies": { "left-pad": "1" },
            "extension": { "type": "job", "worker": "worker.py" }
        }"#;

        let pkg: PackageInfo = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("exthost-slack"));
        let section = pkg.extension.unwrap();
        assert!(section.id.is_none());
        assert_eq!(section.kind.as_deref(), Some("job"));
        assert_eq!(section.worker.as_deref(), Some("worker.py"));
    }
}
