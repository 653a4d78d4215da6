//! Extension discovery - scan root directories for extension manifests
//!
//! Each root is listed one level deep. A child directory is an extension when it
//! contains `extension.json`, or a `package.json` with an `extension` section.
//! Only manifests are read here; no plugin code is loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use serde::de::DeserializeOwned;

use super::descriptor::{Category, ManifestSource, Phase};
use super::entry::PluginEntry;
use super::manifest::{ExtensionManifest, MANIFEST_FILE, PACKAGE_FILE, PackageInfo};
use crate::{Error, Result};

/// An extension found on disk (or declared in code), not yet registered
#[derive(Debug, Clone)]
pub struct DiscoveredExtension {
    /// Identifier as declared (normalized by the registry)
    pub id: String,
    /// Absolute extension directory
    pub dir: PathBuf,
    /// Parsed manifest
    pub manifest: ExtensionManifest,
    /// Package metadata, when present
    pub package: Option<PackageInfo>,
    /// Where the manifest came from
    pub source: ManifestSource,
    /// Entry points supplied in code instead of as paths
    pub entries: HashMap<Phase, PluginEntry>,
}

impl DiscoveredExtension {
    /// Declare an extension in code
    ///
    /// Hosts use this for extensions compiled into the binary. The directory is
    /// still the anchor for templates, fragments and static files.
    #[must_use]
    pub fn inline(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let id = id.into();
        Self {
            manifest: ExtensionManifest {
                id: Some(id.clone()),
                ..ExtensionManifest::default()
            },
            id,
            dir: dir.into(),
            package: None,
            source: ManifestSource::Inline,
            entries: HashMap::new(),
        }
    }

    /// Set the declared category
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.manifest.kind = Some(category.as_str().to_string());
        self
    }

    /// Supply a loaded entry point for a phase
    #[must_use]
    pub fn with_entry(mut self, phase: Phase, entry: PluginEntry) -> Self {
        self.entries.insert(phase, entry);
        self
    }

    /// Replace the manifest, keeping the declared id
    #[must_use]
    pub fn with_manifest(mut self, manifest: ExtensionManifest) -> Self {
        let id = self.manifest.id.take();
        let kind = self.manifest.kind.take();
        self.manifest = ExtensionManifest {
            id: manifest.id.clone().or(id),
            kind: manifest.kind.clone().or(kind),
            ..manifest
        };
        self
    }
}

/// Scan root directories for extensions
///
/// Roots are listed concurrently and each child directory is checked
/// concurrently; the result keeps root order, then child name order. A root that
/// cannot be listed fails the whole call.
///
/// # Errors
///
/// Returns [`Error::ListDir`] for an unreadable root, [`Error::Manifest`] for a
/// manifest that is not valid JSON, and [`Error::MissingId`] when no id can be
/// derived for a manifest.
pub async fn discover_extensions(roots: &[PathBuf]) -> Result<Vec<DiscoveredExtension>> {
    let listings = try_join_all(roots.iter().map(|root| list_children(root))).await?;
    let candidates: Vec<PathBuf> = listings.into_iter().flatten().collect();

    let checked = try_join_all(candidates.iter().map(|dir| check_module(dir))).await?;
    let found: Vec<DiscoveredExtension> = checked.into_iter().flatten().collect();

    tracing::info!(
        roots = roots.len(),
        candidates = candidates.len(),
        extensions = found.len(),
        "extension discovery complete"
    );

    Ok(found)
}

/// List immediate child directories of a root, sorted by name
async fn list_children(root: &Path) -> Result<Vec<PathBuf>> {
    let list_err = |source| Error::ListDir {
        path: root.to_path_buf(),
        source,
    };

    let absolute = tokio::fs::canonicalize(root).await.map_err(list_err)?;
    let mut entries = tokio::fs::read_dir(&absolute).await.map_err(list_err)?;

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let path = entry.path();
        // Follow symlinks so linked extensions are picked up
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => dirs.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry");
            }
        }
    }

    dirs.sort();
    tracing::debug!(root = %absolute.display(), children = dirs.len(), "listed extension root");
    Ok(dirs)
}

/// Check a single directory for an extension manifest
///
/// The dedicated manifest wins over the package section; `package.json` is only
/// authoritative when `extension.json` is absent. Next to a manifest it is read
/// for metadata alone, and a broken one is skipped with a warning. Returns
/// `None` when the directory is not an extension.
async fn check_module(dir: &Path) -> Result<Option<DiscoveredExtension>> {
    let manifest = read_json::<ExtensionManifest>(&dir.join(MANIFEST_FILE)).await?;
    let package_path = dir.join(PACKAGE_FILE);
    let package = if manifest.is_some() {
        read_json::<PackageInfo>(&package_path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(path = %package_path.display(), error = %e, "ignoring unreadable package.json");
                None
            })
    } else {
        read_json::<PackageInfo>(&package_path).await?
    };
    let package_name = package
        .as_ref()
        .and_then(|p| p.name.clone())
        .filter(|name| !name.trim().is_empty());

    let (manifest, source) = match (manifest, package.as_ref().and_then(|p| p.extension.clone())) {
        (Some(manifest), _) => (manifest, ManifestSource::ManifestFile),
        (None, Some(section)) => (section, ManifestSource::PackageSection),
        (None, None) => {
            tracing::debug!(path = %dir.display(), "not an extension, skipping");
            return Ok(None);
        }
    };

    let id = manifest
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or(package_name)
        .ok_or_else(|| Error::MissingId {
            dir: dir.to_path_buf(),
        })?;

    tracing::debug!(
        extension = %id,
        path = %dir.display(),
        source = ?source,
        "discovered extension"
    );

    Ok(Some(DiscoveredExtension {
        id,
        dir: dir.to_path_buf(),
        manifest,
        package: package.map(|p| PackageInfo {
            extension: None,
            ..p
        }),
        source,
        entries: HashMap::new(),
    }))
}

/// Read and parse a JSON file, treating absence as `None`
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| Error::Manifest {
            path: path.to_path_buf(),
            source,
        })
}

/// Default extension search directories
#[must_use]
pub fn default_extension_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(base) = directories::BaseDirs::new() {
        dirs.push(base.config_dir().join("exthost").join("extensions"));
        dirs.push(base.data_dir().join("exthost").join("extensions"));
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_ext(root: &Path, name: &str, file: &str, body: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), body).unwrap();
        dir
    }

    #[tokio::test]
    async fn discover_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("foobar")).unwrap();
        std::fs::create_dir(dir.path().join("foobar2")).unwrap();

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn discover_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("foobar")).unwrap();
        let ext_dir = write_ext(
            dir.path(),
            "foobar-ext",
            MANIFEST_FILE,
            r#"{"id": "foobar-ext", "webapp": "webapp.sh", "worker": "worker.sh"}"#,
        );

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "foobar-ext");
        assert_eq!(found[0].source, ManifestSource::ManifestFile);
        assert_eq!(found[0].dir, std::fs::canonicalize(ext_dir).unwrap());
        assert!(found[0].dir.is_absolute());
    }

    #[tokio::test]
    async fn package_section_defaults_id_to_package_name() {
        let dir = tempfile::tempdir().unwrap();
        write_ext(
            dir.path(),
            "slack",
            PACKAGE_FILE,
            r#"{"name": "exthost-slack", "extension": {"type": "job"}}"#,
        );

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "exthost-slack");
        assert_eq!(found[0].source, ManifestSource::PackageSection);
        assert_eq!(found[0].manifest.kind.as_deref(), Some("job"));
    }

    #[tokio::test]
    async fn package_without_section_is_not_an_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_ext(dir.path(), "lib", PACKAGE_FILE, r#"{"name": "left-pad"}"#);

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn manifest_wins_over_package_section() {
        let dir = tempfile::tempdir().unwrap();
        let ext = write_ext(dir.path(), "both", MANIFEST_FILE, r#"{"type": "runner"}"#);
        std::fs::write(
            ext.join(PACKAGE_FILE),
            r#"{"name": "both-pkg", "extension": {"type": "job"}}"#,
        )
        .unwrap();

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(found[0].id, "both-pkg");
        assert_eq!(found[0].manifest.kind.as_deref(), Some("runner"));
        assert_eq!(found[0].package.as_ref().unwrap().name.as_deref(), Some("both-pkg"));
    }

    #[tokio::test]
    async fn broken_package_beside_manifest_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let ext = write_ext(dir.path(), "demo", MANIFEST_FILE, r#"{"id": "demo"}"#);
        std::fs::write(ext.join(PACKAGE_FILE), "{ broken").unwrap();
        let other = write_ext(dir.path(), "other", MANIFEST_FILE, r#"{"id": "other"}"#);
        std::fs::write(other.join(PACKAGE_FILE), r#"{"name": "other", "extension": "yes"}"#).unwrap();

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["demo", "other"]);
        assert!(found.iter().all(|e| e.package.is_none()));
        assert!(found.iter().all(|e| e.source == ManifestSource::ManifestFile));
    }

    #[tokio::test]
    async fn malformed_package_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_ext(dir.path(), "pkg", PACKAGE_FILE, "{ broken");

        let err = discover_extensions(&[dir.path().to_path_buf()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Manifest { ref path, .. } if path.ends_with(PACKAGE_FILE)));
    }

    #[tokio::test]
    async fn malformed_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_ext(dir.path(), "bad", MANIFEST_FILE, "not valid json");

        let err = discover_extensions(&[dir.path().to_path_buf()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[tokio::test]
    async fn manifest_without_any_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ext = write_ext(dir.path(), "anon", MANIFEST_FILE, r#"{"type": "basic"}"#);

        let err = discover_extensions(&[dir.path().to_path_buf()])
            .await
            .unwrap_err();
        match err {
            Error::MissingId { dir } => assert_eq!(dir, std::fs::canonicalize(ext).unwrap()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn files_at_root_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), r#"{"id": "root"}"#).unwrap();

        let found = discover_extensions(&[dir.path().to_path_buf()]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn missing_root_fails_whole_call() {
        let dir = tempfile::tempdir().unwrap();
        write_ext(dir.path(), "ok", MANIFEST_FILE, r#"{"id": "ok"}"#);

        let err = discover_extensions(&[
            dir.path().to_path_buf(),
            PathBuf::from("/nonexistent/exthost/path"),
        ])
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ListDir { .. }));
    }

    #[test]
    fn inline_extension_keeps_id() {
        let ext = DiscoveredExtension::inline("demo", "/srv/demo")
            .with_category(Category::Job)
            .with_manifest(ExtensionManifest {
                title: Some("Demo".into()),
                ..ExtensionManifest::default()
            });
        assert_eq!(ext.manifest.id.as_deref(), Some("demo"));
        assert_eq!(ext.manifest.title.as_deref(), Some("Demo"));
        assert_eq!(ext.manifest.kind.as_deref(), Some("job"));
        assert_eq!(ext.source, ManifestSource::Inline);
    }

    #[test]
    fn default_dirs_not_empty() {
        assert!(!default_extension_dirs().is_empty());
    }
}
