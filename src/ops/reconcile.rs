//! Dependency reconciliation.
//!
//! A [`DependencyReconciler`] owns the target manifest's two dependency
//! sections while they are rewritten. Mutations are applied in memory and
//! only reach the manifest through [`DependencyReconciler::into_manifest`],
//! and only for sections that differ from the original by name or
//! constraint.

use std::fmt;

use serde::Serialize;

use crate::core::dependency::{Dependency, DependencyKind, DependencySection, DEFAULT_CONSTRAINT};
use crate::core::errors::DepsyncError;
use crate::core::manifest::Manifest;
use crate::ops::analyze::Classification;
use crate::scanner::Environment;

/// Which sections an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionTarget {
    Both,
    Only(DependencyKind),
}

impl SectionTarget {
    fn kinds(self) -> &'static [DependencyKind] {
        match self {
            SectionTarget::Both => &DependencyKind::ALL,
            SectionTarget::Only(DependencyKind::Primary) => &[DependencyKind::Primary],
            SectionTarget::Only(DependencyKind::Development) => &[DependencyKind::Development],
        }
    }
}

impl From<DependencyKind> for SectionTarget {
    fn from(kind: DependencyKind) -> Self {
        SectionTarget::Only(kind)
    }
}

/// One difference between the original and the reconciled sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Change {
    Removed {
        name: String,
        section: DependencyKind,
    },
    Moved {
        name: String,
        from: DependencyKind,
        to: DependencyKind,
        constraint: String,
    },
    Added {
        name: String,
        section: DependencyKind,
        constraint: String,
    },
}

impl Change {
    pub fn name(&self) -> &str {
        match self {
            Change::Removed { name, .. } | Change::Moved { name, .. } | Change::Added { name, .. } => name,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Removed { name, section } => write!(f, "{} from `{}`", name, section),
            Change::Moved {
                name,
                from,
                to,
                constraint,
            } => write!(f, "{} ({}) from `{}` to `{}`", name, constraint, from, to),
            Change::Added {
                name,
                section,
                constraint,
            } => write!(f, "{} ({}) to `{}`", name, constraint, section),
        }
    }
}

/// Rewrites the dependency sections of one manifest.
#[derive(Debug)]
pub struct DependencyReconciler {
    manifest: Manifest,
    original: [DependencySection; 2],
    sections: [DependencySection; 2],
    sort: bool,
}

fn index(kind: DependencyKind) -> usize {
    match kind {
        DependencyKind::Primary => 0,
        DependencyKind::Development => 1,
    }
}

fn validate_name(name: &str) -> Result<(), DepsyncError> {
    if name.trim().is_empty() {
        return Err(DepsyncError::validation("package name must not be empty"));
    }
    Ok(())
}

impl DependencyReconciler {
    pub fn new(manifest: Manifest) -> Result<Self, DepsyncError> {
        let original = [
            manifest.dependency_section(DependencyKind::Primary)?,
            manifest.dependency_section(DependencyKind::Development)?,
        ];
        Ok(DependencyReconciler {
            sort: manifest.sorting_enabled(),
            sections: original.clone(),
            original,
            manifest,
        })
    }

    /// The current state of one section.
    pub fn section(&self, kind: DependencyKind) -> &DependencySection {
        &self.sections[index(kind)]
    }

    /// Delete `names` from the targeted sections. A section left empty is
    /// dropped from the manifest.
    pub fn remove_dependencies<I, S>(
        &mut self,
        names: I,
        target: SectionTarget,
    ) -> Result<&mut Self, DepsyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            validate_name(name)?;
            for &kind in target.kinds() {
                if self.sections[index(kind)].remove(name).is_some() {
                    tracing::debug!("removing {} from {}", name, kind);
                    self.touch(kind);
                }
            }
        }
        Ok(self)
    }

    /// Make `kind` the only section declaring each of `names`.
    ///
    /// A name missing from `kind` is added with the constraint it had in
    /// the other section, or [`DEFAULT_CONSTRAINT`] if it had none. Names
    /// already in `kind` keep their constraint.
    pub fn ensure_used_only_in_section<I, S>(
        &mut self,
        names: I,
        kind: DependencyKind,
    ) -> Result<&mut Self, DepsyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (target, other) = (index(kind), index(kind.other()));

        for name in names {
            let name = name.as_ref();
            validate_name(name)?;

            if !self.sections[target].contains(name) {
                let constraint = self.sections[other]
                    .get(name)
                    .filter(|d| d.has_constraint())
                    .map_or(DEFAULT_CONSTRAINT, Dependency::constraint)
                    .to_string();
                tracing::debug!("adding {} ({}) to {}", name, constraint, kind);
                self.sections[target].insert(Dependency::new(name, constraint));
                self.touch(kind);
            }

            if self.sections[other].remove(name).is_some() {
                tracing::debug!("removing {} from {}", name, kind.other());
                self.touch(kind.other());
            }
        }
        Ok(self)
    }

    /// Apply a classification: drop unused packages, then pull everything
    /// used in production into `require`, then push what only development
    /// uses into `require-dev`.
    pub fn reconcile(&mut self, classification: &Classification) -> Result<&mut Self, DepsyncError> {
        let production = Environment::production();
        let development = Environment::development();

        self.remove_dependencies(classification.unused_package_names(), SectionTarget::Both)?
            .ensure_used_only_in_section(
                classification.names_used_in(&production),
                DependencyKind::Primary,
            )?
            .ensure_used_only_in_section(
                classification.names_used_only_in(&development),
                DependencyKind::Development,
            )
    }

    fn touch(&mut self, kind: DependencyKind) {
        if self.sort {
            self.sections[index(kind)].sort_packages();
        }
    }

    /// Whether either section differs from the original by name or
    /// constraint. Order alone is not a change.
    pub fn changed(&self) -> bool {
        self.original
            .iter()
            .zip(&self.sections)
            .any(|(before, after)| !before.same_entries(after))
    }

    /// Differences from the original sections, grouped by package in
    /// original declaration order.
    pub fn changes(&self) -> Vec<Change> {
        let mut names: Vec<&str> = Vec::new();
        for section in self.original.iter().chain(&self.sections) {
            for name in section.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut changes = Vec::new();
        for name in names {
            let mut removed = Vec::new();
            let mut added = Vec::new();
            for kind in DependencyKind::ALL {
                let i = index(kind);
                match (self.original[i].contains(name), self.sections[i].get(name)) {
                    (true, None) => removed.push(kind),
                    (false, Some(dep)) => added.push((kind, dep.constraint().to_string())),
                    _ => {}
                }
            }

            if let ([from], [(to, constraint)]) = (removed.as_slice(), added.as_slice()) {
                changes.push(Change::Moved {
                    name: name.to_string(),
                    from: *from,
                    to: *to,
                    constraint: constraint.clone(),
                });
                continue;
            }

            changes.extend(removed.into_iter().map(|section| Change::Removed {
                name: name.to_string(),
                section,
            }));
            changes.extend(added.into_iter().map(|(section, constraint)| Change::Added {
                name: name.to_string(),
                section,
                constraint,
            }));
        }
        changes
    }

    /// The manifest with every changed section written back. A section
    /// whose entries match the original keeps its original order, even if
    /// it was sorted along the way.
    pub fn into_manifest(self) -> Manifest {
        let mut manifest = self.manifest;
        for kind in DependencyKind::ALL {
            let i = index(kind);
            if !self.original[i].same_entries(&self.sections[i]) {
                manifest.set_dependency_section(kind, &self.sections[i]);
            }
        }
        manifest
    }
}
