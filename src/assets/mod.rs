//! Configuration UI bundles
//!
//! Every extension exposing a configuration block contributes a markup, script
//! and style fragment. The aggregator concatenates scripts and styles in
//! registry order and collects the block metadata the host builds menus from.

pub mod fragments;
pub mod statics;
pub mod stylesheet;
pub mod templates;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::dispatch::is_truthy;
use crate::plugins::{Category, Descriptor, ExtensionRegistry};
use crate::{Error, Result};
use fragments::{Fragment, FragmentKind, read_fragment};
use stylesheet::{GrassCompiler, StylesheetCompiler, needs_compiling};

pub use statics::mount_static_dirs;
pub use templates::collect_templates;

/// Header line marking bundle files as generated
pub const GENERATED_HEADER: &str = "Generated by exthost from extension fragments; do not edit.";

/// Which configuration block a bundle is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    /// Per-project configuration (`config`)
    Primary,
    /// Per-user configuration (`userConfig`, `accountConfig` for providers)
    PerUser,
    /// Build status block (`build-status`)
    StatusBlock,
}

impl ConfigKind {
    /// Manifest field holding the block for an extension of `category`
    #[must_use]
    pub const fn field(self, category: Category) -> &'static str {
        match self {
            Self::Primary => "config",
            Self::PerUser => category.user_config_key(),
            Self::StatusBlock => "build-status",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "config",
            Self::PerUser => "user-config",
            Self::StatusBlock => "status",
        })
    }
}

impl FromStr for ConfigKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "config" | "primary" => Ok(Self::Primary),
            "user-config" | "user" => Ok(Self::PerUser),
            "status" | "build-status" => Ok(Self::StatusBlock),
            other => Err(format!("unknown config kind `{other}`")),
        }
    }
}

/// Where to write generated bundles; `None` keeps a bundle in memory only
#[derive(Debug, Clone, Default)]
pub struct BundleOutputs {
    /// Script bundle path
    pub script: Option<PathBuf>,
    /// Style bundle path
    pub style: Option<PathBuf>,
}

/// Aggregated configuration UI
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bundle {
    /// Wrapped script fragments
    pub script: String,
    /// Style fragments, compiled where needed
    pub style: String,
    /// Block metadata with rendered markup, by category then id
    pub configs: BTreeMap<Category, IndexMap<String, Value>>,
}

impl Bundle {
    /// Number of extensions that contributed a block
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.values().map(IndexMap::len).sum()
    }

    /// Whether no extension contributed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Contribution {
    category: Category,
    id: String,
    config: Value,
    script: Option<String>,
    style: Option<String>,
}

/// Builds configuration bundles from a registry
pub struct Aggregator {
    framework_root: String,
    compiler: Arc<dyn StylesheetCompiler>,
}

impl Aggregator {
    /// Create an aggregator compiling SCSS with `grass`
    #[must_use]
    pub fn new(framework_root: impl Into<String>) -> Self {
        Self {
            framework_root: framework_root.into(),
            compiler: Arc::new(GrassCompiler),
        }
    }

    /// Use a different stylesheet compiler
    #[must_use]
    pub fn with_compiler(mut self, compiler: Arc<dyn StylesheetCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Aggregate the `kind` block of every extension
    ///
    /// Fragments are read concurrently; concatenation follows registry order.
    /// Nothing is written unless every extension succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFragment`] for an explicitly named fragment that
    /// doesn't exist, [`Error::Stylesheet`] when compiling fails, or
    /// [`Error::Write`] when an output can't be written.
    pub async fn aggregate(
        &self,
        registry: &ExtensionRegistry,
        kind: ConfigKind,
        outputs: &BundleOutputs,
    ) -> Result<Bundle> {
        let contributions = try_join_all(registry.iter().map(|d| self.contribute(d, kind))).await?;

        let mut bundle = Bundle::default();
        let mut scripts = Vec::new();
        let mut styles = Vec::new();
        for contribution in contributions.into_iter().flatten() {
            scripts.extend(contribution.script);
            styles.extend(contribution.style);
            bundle
                .configs
                .entry(contribution.category)
                .or_default()
                .insert(contribution.id, contribution.config);
        }

        bundle.script = wrap_scripts(&self.framework_root, &scripts);
        bundle.style = join_styles(&styles);

        if let Some(path) = &outputs.script {
            write_output(path, &bundle.script).await?;
        }
        if let Some(path) = &outputs.style {
            write_output(path, &bundle.style).await?;
        }

        tracing::info!(
            kind = %kind,
            extensions = bundle.len(),
            scripts = scripts.len(),
            styles = styles.len(),
            "aggregated config bundle"
        );
        Ok(bundle)
    }

    async fn contribute(&self, descriptor: &Descriptor, kind: ConfigKind) -> Result<Option<Contribution>> {
        let field = kind.field(descriptor.category);
        let Some(block) = descriptor.field(field).filter(|b| is_truthy(b)) else {
            return Ok(None);
        };

        let (markup, script, style) = tokio::try_join!(
            read_fragment(descriptor, field, block, FragmentKind::Markup),
            read_fragment(descriptor, field, block, FragmentKind::Script),
            read_fragment(descriptor, field, block, FragmentKind::Style),
        )?;

        let mut config = config_block(descriptor, block);
        config.insert(
            "html".to_string(),
            Value::String(markup.map(|m| m.text).unwrap_or_default()),
        );

        let script = script
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| format!("{}\n//# sourceURL={}/{}\n", s.text, descriptor.id, s.relative));

        let style = match style {
            Some(fragment) => Some(self.render_style(descriptor, fragment).await?),
            None => None,
        };

        tracing::debug!(extension = %descriptor.id, field, "collected config block");
        Ok(Some(Contribution {
            category: descriptor.category,
            id: descriptor.id.clone(),
            config: Value::Object(config),
            script,
            style,
        }))
    }

    async fn render_style(&self, descriptor: &Descriptor, fragment: Fragment) -> Result<String> {
        let css = if needs_compiling(&fragment.path) {
            let compiler = Arc::clone(&self.compiler);
            let load_path = fragment
                .path
                .parent()
                .unwrap_or(&descriptor.dir)
                .to_path_buf();
            let source = fragment.text;
            let compiled = tokio::task::spawn_blocking(move || compiler.compile(&source, &load_path))
                .await
                .unwrap_or_else(|e| Err(format!("stylesheet compiler failed: {e}")));
            compiled.map_err(|message| Error::Stylesheet {
                id: descriptor.id.clone(),
                path: fragment.path.clone(),
                message,
            })?
        } else {
            fragment.text
        };
        Ok(format!("{css}\n/** source: {}/{} **/\n", descriptor.id, fragment.relative))
    }
}

/// Block metadata: host defaults overlaid with the declared block
///
/// A bare `true` gets the minimal shape, a single save affordance and no
/// custom controller.
fn config_block(descriptor: &Descriptor, block: &Value) -> Map<String, Value> {
    let mut config = Map::new();
    config.insert("id".into(), json!(descriptor.id));
    config.insert("title".into(), json!(descriptor.title()));
    if let Some(icon) = &descriptor.manifest.icon {
        config.insert("icon".into(), json!(icon));
    }

    match block {
        Value::Object(declared) => {
            config.insert("controller".into(), json!(descriptor.category.controller_name()));
            config.extend(declared.clone());
        }
        _ => {
            config.insert("save".into(), Value::Bool(true));
        }
    }
    config
}

/// Wrap script fragments so each runs in its own closure over the framework root
fn wrap_scripts(framework_root: &str, scripts: &[String]) -> String {
    let mut out = format!("// {GENERATED_HEADER}\n");
    if scripts.is_empty() {
        return out;
    }
    let open = format!(";(function ({framework_root}) {{\n");
    let close = format!("\n}})({framework_root});\n");
    out.push_str(&open);
    out.push_str(&scripts.join(&format!("{close}{open}")));
    out.push_str(&close);
    out
}

fn join_styles(styles: &[String]) -> String {
    let mut out = format!("/* {GENERATED_HEADER} */\n");
    out.push_str(&styles.join("\n\n"));
    out
}

async fn write_output(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), bytes = text.len(), "wrote bundle");
    Ok(())
}
