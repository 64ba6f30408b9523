//! The full reconciliation pass over one package directory.
//!
//! Reads everything up front (manifest, config, installed packages, and
//! sources), computes in memory, then writes the manifest in one atomic
//! step if and only if its dependency sections changed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::dependency::DependencyKind;
use crate::core::manifest::{AutoloadGroup, Manifest};
use crate::ops::analyze::{Classification, UsageAnalyzer};
use crate::ops::installed::{self, InstalledPackage};
use crate::ops::reconcile::{Change, DependencyReconciler};
use crate::scanner::{Environment, Scanner, UsageLedger};
use crate::util::config::Config;
use crate::util::fs;

/// Options for a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Path to the target `composer.json`
    pub manifest_path: PathBuf,

    /// Compute changes without writing the manifest
    pub dry_run: bool,
}

/// Everything known about a package before reconciliation.
#[derive(Debug)]
pub struct ProjectAnalysis {
    pub manifest: Manifest,
    pub project_root: PathBuf,
    pub ledger: UsageLedger,
    /// Every installed package
    pub installed: Vec<InstalledPackage>,
    pub classification: Classification,
    /// Declared packages with no installed copy
    pub missing: Vec<String>,
}

impl ProjectAnalysis {
    pub fn installed_package(&self, name: &str) -> Option<&InstalledPackage> {
        self.installed.iter().find(|p| p.name() == name)
    }
}

/// Outcome of [`sync`].
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub manifest_path: PathBuf,
    pub changed: bool,
    pub written: bool,
    pub changes: Vec<Change>,
    pub missing: Vec<String>,
    pub symbols: usize,
}

/// Load, scan, and classify the package whose manifest is at
/// `manifest_path`.
pub fn analyze_project(manifest_path: &Path) -> Result<ProjectAnalysis> {
    let manifest = Manifest::load(manifest_path)?;
    let project_root = match manifest_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let config = Config::load_for_project(&project_root)?;
    let vendor_dir = config.vendor_dir(manifest.vendor_dir(), &project_root);

    let mut scanner = Scanner::default();
    let vendor_rel = vendor_dir.strip_prefix(&project_root).unwrap_or(&vendor_dir);
    scanner.exclude_paths([vendor_rel], &project_root);
    for pattern in manifest.classmap_exclusions() {
        if pattern.contains('*') {
            tracing::debug!("not excluding wildcard pattern {} from the scan", pattern);
        } else {
            scanner.exclude_paths([pattern], &project_root);
        }
    }
    match &config.environments {
        Some(environments) => {
            for (environment, paths) in environments {
                scanner.add_target_paths(*environment, paths, &project_root);
            }
        }
        None => {
            for group in AutoloadGroup::ALL {
                let environment = match group {
                    AutoloadGroup::Runtime => Environment::production(),
                    AutoloadGroup::Development => Environment::development(),
                };
                let paths: Vec<String> = manifest
                    .autoload_paths(group)
                    .into_iter()
                    .filter(|p| {
                        let exists = project_root.join(p).exists();
                        if !exists {
                            tracing::debug!("skipping missing {} path {}", group.key(), p);
                        }
                        exists
                    })
                    .collect();
                scanner.add_target_paths(environment, paths, &project_root);
            }
        }
    }
    let ledger = scanner
        .into_usages()
        .context("failed to scan sources")?;

    let declared = declared_packages(&manifest)?;
    let discovery = installed::discover(&vendor_dir, declared.iter().map(String::as_str))?;

    for name in &discovery.missing {
        tracing::debug!("{} is declared but not installed; leaving it untouched", name);
    }

    let candidates: Vec<InstalledPackage> = discovery
        .installed
        .iter()
        .filter(|p| declared.contains(p.name()))
        .cloned()
        .collect();

    let classification = UsageAnalyzer::new(&candidates, &ledger)
        .with_providers(&discovery.installed)
        .with_ignored(config.ignore.iter().cloned())
        .analyze();

    tracing::debug!(
        "classified {} of {} declared packages",
        classification.len(),
        declared.len()
    );

    Ok(ProjectAnalysis {
        manifest,
        project_root,
        ledger,
        installed: discovery.installed,
        classification,
        missing: discovery.missing,
    })
}

/// Names declared in either section that can be installed.
fn declared_packages(manifest: &Manifest) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for kind in DependencyKind::ALL {
        for name in manifest.dependency_section(kind)?.names() {
            if !Manifest::is_platform_requirement(name) {
                names.insert(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Reconcile the manifest at `opts.manifest_path` with its sources.
pub fn sync(opts: &SyncOptions) -> Result<SyncReport> {
    let analysis = analyze_project(&opts.manifest_path)?;

    let mut reconciler = DependencyReconciler::new(analysis.manifest)?;
    reconciler.reconcile(&analysis.classification)?;

    let changed = reconciler.changed();
    let changes = reconciler.changes();
    let manifest = reconciler.into_manifest();

    let written = changed && !opts.dry_run;
    if written {
        let text = manifest.serialize()?;
        fs::write_atomic(manifest.path(), &text)?;
        tracing::info!("updated {}", manifest.path().display());
    } else if changed {
        tracing::info!("dry run; {} left unchanged", manifest.path().display());
    }

    Ok(SyncReport {
        manifest_path: manifest.path().to_path_buf(),
        changed,
        written,
        changes,
        missing: analysis.missing,
        symbols: analysis.ledger.len(),
    })
}
