//! Stylesheet preprocessing for configuration fragments

use std::path::Path;

/// File extension of style fragments that need compiling
pub const PREPROCESSED_EXTENSION: &str = "scss";

/// Compiles preprocessor stylesheets to plain CSS
pub trait StylesheetCompiler: Send + Sync {
    /// Compile `source`, resolving imports against `load_path`
    ///
    /// # Errors
    ///
    /// Returns the compiler's message on syntax or import errors
    fn compile(&self, source: &str, load_path: &Path) -> Result<String, String>;
}

/// SCSS compiler backed by `grass`
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassCompiler;

impl StylesheetCompiler for GrassCompiler {
    fn compile(&self, source: &str, load_path: &Path) -> Result<String, String> {
        let options = grass::Options::default().load_path(load_path);
        grass::from_string(source.to_string(), &options).map_err(|e| e.to_string())
    }
}

/// Whether a style fragment path needs compiling
#[must_use]
pub fn needs_compiling(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PREPROCESSED_EXTENSION))
}
