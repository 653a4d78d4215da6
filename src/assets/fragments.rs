//! Markup, script and style fragments of configuration blocks

use std::io::ErrorKind;
use std::path::PathBuf;

use serde_json::Value;

use crate::plugins::Descriptor;
use crate::{Error, Result};

/// The three fragment files a configuration block may ship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// HTML rendered into the config metadata
    Markup,
    /// Script concatenated into the script bundle
    Script,
    /// Stylesheet concatenated into the style bundle
    Style,
}

impl FragmentKind {
    /// Config block key naming the fragment path explicitly
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Markup => "template",
            Self::Script => "script",
            Self::Style => "style",
        }
    }

    /// File extension of the conventional fragment path
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markup => "html",
            Self::Script => "js",
            Self::Style => "scss",
        }
    }

    /// Conventional path used when the block does not name one
    #[must_use]
    pub fn default_path(self, block: &str) -> String {
        format!("config/{block}.{}", self.extension())
    }
}

/// A fragment read from an extension directory
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Path as declared, relative to the extension directory
    pub relative: String,
    /// Absolute path
    pub path: PathBuf,
    /// File contents
    pub text: String,
}

/// Read one fragment of a configuration block
///
/// A fragment the block names explicitly must exist. An implicit fragment at the
/// conventional path is optional and yields `None` when it can't be read.
///
/// # Errors
///
/// Returns [`Error::MissingFragment`] or [`Error::Fragment`] for an explicitly named
/// fragment that can't be read.
pub async fn read_fragment(
    descriptor: &Descriptor,
    block_name: &str,
    block: &Value,
    kind: FragmentKind,
) -> Result<Option<Fragment>> {
    let declared = block.get(kind.key()).and_then(Value::as_str);
    let relative = declared.map_or_else(|| kind.default_path(block_name), str::to_string);
    let path = descriptor.dir.join(&relative);

    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Some(Fragment {
            relative,
            path,
            text,
        })),
        Err(e) if declared.is_none() => {
            tracing::trace!(extension = %descriptor.id, path = %path.display(), error = %e, "no implicit fragment");
            Ok(None)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::MissingFragment {
            id: descriptor.id.clone(),
            path,
            source: e,
        }),
        Err(e) => Err(Error::Fragment {
            id: descriptor.id.clone(),
            path,
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::plugins::{Category, ExtensionManifest, ManifestSource};

    fn descriptor(dir: &std::path::Path) -> Descriptor {
        Descriptor::new(
            "demo".into(),
            Category::Job,
            dir.to_path_buf(),
            ManifestSource::Inline,
            ExtensionManifest::default(),
            None,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn implicit_fragment_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let fragment = read_fragment(&descriptor(dir.path()), "config", &json!({}), FragmentKind::Script)
            .await
            .unwrap();
        assert!(fragment.is_none());
    }

    #[tokio::test]
    async fn implicit_fragment_is_read_from_convention() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/userConfig.html"), "<p>hi</p>").unwrap();

        let fragment = read_fragment(&descriptor(dir.path()), "userConfig", &json!(true), FragmentKind::Markup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fragment.relative, "config/userConfig.html");
        assert_eq!(fragment.text, "<p>hi</p>");
    }

    #[tokio::test]
    async fn declared_fragment_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_fragment(
            &descriptor(dir.path()),
            "config",
            &json!({"style": "ui/missing.css"}),
            FragmentKind::Style,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::MissingFragment { .. }));
        assert_eq!(err.extension_id(), Some("demo"));
    }

    #[tokio::test]
    async fn unreadable_declared_fragment_names_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ui/panel.html")).unwrap();

        let err = read_fragment(
            &descriptor(dir.path()),
            "config",
            &json!({"template": "ui/panel.html"}),
            FragmentKind::Markup,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Fragment { .. }));
        assert_eq!(err.extension_id(), Some("demo"));
    }
}
