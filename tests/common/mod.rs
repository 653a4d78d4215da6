//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Write a file under `dir`, creating parent directories
pub fn write_file(dir: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture dir");
    }
    std::fs::write(&path, contents).expect("failed to write fixture file");
    path
}

/// Create an extension directory with an `extension.json` manifest
pub fn write_extension(root: &Path, name: &str, manifest: &Value) -> PathBuf {
    let dir = root.join(name);
    write_file(&dir, "extension.json", &manifest.to_string());
    dir
}

/// Create an extension declared through the `extension` section of `package.json`
pub fn write_package_extension(root: &Path, name: &str, package: &Value) -> PathBuf {
    let dir = root.join(name);
    write_file(&dir, "package.json", &package.to_string());
    dir
}

/// Create a directory that is not an extension
pub fn write_plain_dir(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    write_file(&dir, "README.md", "not an extension");
    dir
}
