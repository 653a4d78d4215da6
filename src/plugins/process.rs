//! Process-backed plugin entries
//!
//! A declared entry path that points at a script or executable becomes a function
//! entry: calling it runs the program with the host snapshot as JSON on stdin and
//! reads a JSON result from stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::entry::{PluginEntry, PluginFn};
use super::resolve::ModuleLoader;
use crate::host::HostContext;

/// Loader that runs entry points as subprocesses
#[derive(Debug, Clone, Default)]
pub struct ProcessModules {
    timeout: Option<Duration>,
}

impl ProcessModules {
    /// Create a loader; `timeout` of `None` lets a plugin run indefinitely
    #[must_use]
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ModuleLoader for ProcessModules {
    async fn load(&self, path: &Path) -> anyhow::Result<PluginEntry> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("cannot load {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("{} is not a file", path.display());
        }

        let (program, args) = determine_executor(path)?;
        Ok(PluginEntry::Function(Arc::new(ProcessEntry {
            path: path.to_path_buf(),
            program,
            args,
            timeout: self.timeout,
        })))
    }
}

/// A plugin entry point run as a child process
#[derive(Debug)]
struct ProcessEntry {
    path: PathBuf,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

#[async_trait]
impl PluginFn for ProcessEntry {
    async fn call(&self, host: HostContext) -> anyhow::Result<Value> {
        let input = serde_json::to_vec(&host.snapshot()).context("failed to serialize host snapshot")?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(self.path.parent().unwrap_or_else(|| Path::new(".")))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.path.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .context("failed to write to plugin stdin")?;
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| anyhow::anyhow!("plugin timed out after {limit:?}"))?,
            None => child.wait_with_output().await,
        }
        .context("plugin execution failed")?;

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(plugin = %self.path.display(), stderr = %stderr, "plugin stderr");
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            anyhow::bail!("plugin exited with code {code}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&stdout).context("failed to parse plugin output")
    }
}

/// Determine how to execute an entry point based on its extension
fn determine_executor(path: &Path) -> anyhow::Result<(String, Vec<String>)> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid entry path"))?
        .to_string();

    match extension {
        "py" => Ok(("python3".to_string(), vec![path_str])),
        "js" => Ok(("node".to_string(), vec![path_str])),
        "ts" => Ok(("bun".to_string(), vec!["run".to_string(), path_str])),
        "rb" => Ok(("ruby".to_string(), vec![path_str])),
        "sh" => Ok(("bash".to_string(), vec![path_str])),
        // No extension: native executable or script with shebang
        "" => Ok((path_str, vec![])),
        _ => anyhow::bail!("unknown entry extension: .{extension}"),
    }
}
