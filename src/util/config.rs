//! Project configuration: an optional `depsync.toml` next to the manifest.
//!
//! ```toml
//! vendor-dir = "vendor"
//! ignore = ["vendor/some-pkg"]
//!
//! [environments]
//! production = ["src", "bootstrap.php"]
//! development = ["tests"]
//! ```
//!
//! Every key is optional. Without `[environments]`, scan paths are derived
//! from the manifest's `autoload` and `autoload-dev` sections.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scanner::Environment;

/// Config file name, looked up beside the manifest.
pub const CONFIG_NAME: &str = "depsync.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Overrides `config.vendor-dir` from the manifest
    pub vendor_dir: Option<PathBuf>,

    /// Packages never removed or moved
    pub ignore: Vec<String>,

    /// Explicit scan paths per environment, relative to the project root
    pub environments: Option<BTreeMap<Environment, Vec<PathBuf>>>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load `depsync.toml` from `project_root`, or the defaults if there is
    /// none.
    pub fn load_for_project(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_NAME);
        if path.is_file() {
            tracing::debug!("using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Vendor directory: this config, then the manifest's setting, then
    /// `vendor`. Relative paths are taken from `project_root`.
    pub fn vendor_dir(&self, manifest_setting: Option<&str>, project_root: &Path) -> PathBuf {
        let dir = self
            .vendor_dir
            .clone()
            .or_else(|| manifest_setting.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("vendor"));
        project_root.join(dir)
    }
}
