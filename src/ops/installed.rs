//! Installed package discovery.
//!
//! Resolving a declared dependency to the copy actually installed is done
//! here, outside the analysis core. The primary source is the installer's
//! own record, `<vendor>/composer/installed.json`; when it is absent each
//! declared package's `composer.json` is read from `<vendor>/<name>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::core::errors::DepsyncError;
use crate::core::manifest::{Manifest, MANIFEST_NAME};
use crate::util::fs;

/// An installed dependency: its manifest bound to where it lives on disk.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    name: String,
    manifest: Manifest,
    install_path: PathBuf,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, manifest: Manifest, install_path: impl Into<PathBuf>) -> Self {
        InstalledPackage {
            name: name.into(),
            manifest,
            install_path: install_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }
}

/// Every package recorded in `<vendor>/composer/installed.json`, keyed by
/// name, or `None` if the file does not exist.
pub fn read_installed_json(vendor_dir: &Path) -> Result<Option<BTreeMap<String, InstalledPackage>>, DepsyncError> {
    let composer_dir = vendor_dir.join("composer");
    let path = composer_dir.join("installed.json");
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| DepsyncError::manifest(&path, e.to_string()))?;

    // Composer 2 wraps the list; Composer 1 writes it bare.
    let entries = match value {
        Value::Object(mut map) => match map.remove("packages") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(DepsyncError::manifest(
                    &path,
                    "expected a `packages` array",
                ))
            }
        },
        Value::Array(entries) => entries,
        _ => return Err(DepsyncError::manifest(&path, "expected an object or an array")),
    };

    let mut packages = BTreeMap::new();
    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str).map(str::to_string) else {
            return Err(DepsyncError::manifest(&path, "package entry without a name"));
        };

        let install_path = match entry.get("install-path").and_then(Value::as_str) {
            Some(relative) => composer_dir.join(relative),
            None => vendor_dir.join(&name),
        };

        let manifest = Manifest::from_value(entry, &install_path.join(MANIFEST_NAME))?;
        packages.insert(name.clone(), InstalledPackage::new(name, manifest, install_path));
    }

    tracing::debug!("{} packages listed in {}", packages.len(), path.display());
    Ok(Some(packages))
}

/// Resolve `names` to installed packages.
///
/// Names that are not installed are returned in the second list, in input
/// order.
pub fn discover<'a, I>(vendor_dir: &Path, names: I) -> Result<Discovery, DepsyncError>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();

    let mut discovery = Discovery::default();
    match read_installed_json(vendor_dir)? {
        Some(installed) => {
            for name in &names {
                if !installed.contains_key(*name) {
                    discovery.missing.push(name.to_string());
                }
            }
            discovery.installed = installed.into_values().collect();
        }
        None => {
            for name in names {
                let install_path = vendor_dir.join(name);
                let manifest_path = install_path.join(MANIFEST_NAME);
                if manifest_path.is_file() {
                    let manifest = Manifest::load(&manifest_path)?;
                    discovery
                        .installed
                        .push(InstalledPackage::new(name, manifest, install_path));
                } else {
                    discovery.missing.push(name.to_string());
                }
            }
        }
    }

    Ok(discovery)
}

/// Result of [`discover`].
#[derive(Debug, Default)]
pub struct Discovery {
    /// Every installed package found, including ones not asked for
    pub installed: Vec<InstalledPackage>,
    /// Requested names with no installed copy
    pub missing: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    fn names(discovery: &Discovery) -> Vec<&str> {
        discovery.installed.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_composer2_installed_json() {
        let tmp = TempDir::new().unwrap();
        let vendor = tmp.path().join("vendor");
        stdfs::create_dir_all(vendor.join("composer")).unwrap();
        stdfs::write(
            vendor.join("composer/installed.json"),
            r#"{
    "packages": [
        {
            "name": "monolog/monolog",
            "autoload": {"psr-4": {"Monolog\\": "src/Monolog"}},
            "install-path": "../monolog/monolog"
        },
        {
            "name": "psr/log",
            "autoload": {"psr-4": {"Psr\\Log\\": "src"}},
            "install-path": "../psr/log"
        }
    ],
    "dev": true
}"#,
        )
        .unwrap();

        let discovery = discover(&vendor, ["monolog/monolog", "missing/pkg"]).unwrap();
        assert_eq!(names(&discovery), ["monolog/monolog", "psr/log"]);
        assert_eq!(discovery.missing, ["missing/pkg"]);

        let monolog = &discovery.installed[0];
        assert_eq!(
            monolog.install_path(),
            vendor.join("composer").join("../monolog/monolog")
        );
        assert!(monolog.manifest().namespace_roots().contains("Monolog\\"));
    }

    #[test]
    fn test_composer1_installed_json() {
        let tmp = TempDir::new().unwrap();
        let vendor = tmp.path().join("vendor");
        stdfs::create_dir_all(vendor.join("composer")).unwrap();
        stdfs::write(
            vendor.join("composer/installed.json"),
            r#"[{"name": "acme/tool", "bin": ["bin/tool"]}]"#,
        )
        .unwrap();

        let discovery = discover(&vendor, ["acme/tool"]).unwrap();
        assert_eq!(names(&discovery), ["acme/tool"]);
        assert_eq!(discovery.installed[0].install_path(), vendor.join("acme/tool"));
        assert!(discovery.installed[0].manifest().declares_executable_tools());
    }

    #[test]
    fn test_fallback_to_package_manifests() {
        let tmp = TempDir::new().unwrap();
        let vendor = tmp.path().join("vendor");
        stdfs::create_dir_all(vendor.join("acme/lib")).unwrap();
        stdfs::write(
            vendor.join("acme/lib/composer.json"),
            r#"{"name": "acme/lib", "autoload": {"psr-4": {"Acme\\Lib\\": "src/"}}}"#,
        )
        .unwrap();

        let discovery = discover(&vendor, ["acme/lib", "acme/gone"]).unwrap();
        assert_eq!(names(&discovery), ["acme/lib"]);
        assert_eq!(discovery.missing, ["acme/gone"]);
    }

    #[test]
    fn test_malformed_installed_json() {
        let tmp = TempDir::new().unwrap();
        let vendor = tmp.path().join("vendor");
        stdfs::create_dir_all(vendor.join("composer")).unwrap();
        stdfs::write(vendor.join("composer/installed.json"), r#"{"dev": true}"#).unwrap();

        let err = discover(&vendor, ["a/b"]).unwrap_err();
        assert_eq!(err.kind(), crate::core::errors::ErrorKind::Manifest);
    }
}
