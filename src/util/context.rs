//! Global context for depsync operations: the working directory every
//! command resolves paths against. Output preferences live on the `Shell`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::MANIFEST_NAME;

#[derive(Debug, Clone)]
pub struct GlobalContext {
    cwd: PathBuf,
}

impl GlobalContext {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext { cwd }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Find `composer.json`, starting in the working directory and
    /// searching upward.
    pub fn find_manifest(&self) -> Option<PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(MANIFEST_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Resolve an explicit `--manifest` argument against the working
    /// directory, or search for one.
    pub fn manifest_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(self.cwd.join(path)),
            None => self.find_manifest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_manifest_searches_upward() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), "{}").unwrap();
        let nested = tmp.path().join("src/Http");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested);
        assert_eq!(ctx.find_manifest(), Some(tmp.path().join(MANIFEST_NAME)));
    }

    #[test]
    fn test_explicit_manifest_is_relative_to_cwd() {
        let ctx = GlobalContext::with_cwd(PathBuf::from("/work"));
        assert_eq!(
            ctx.manifest_path(Some(Path::new("pkg/composer.json"))),
            Some(PathBuf::from("/work/pkg/composer.json"))
        );
        assert_eq!(
            ctx.manifest_path(Some(Path::new("/abs/composer.json"))),
            Some(PathBuf::from("/abs/composer.json"))
        );
    }
}
