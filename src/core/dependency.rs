//! Dependency declarations.
//!
//! A Dependency pairs a package name with its constraint string. A
//! DependencySection is one ordered `require`/`require-dev` block; names are
//! unique within it and insertion order is preserved until it is sorted.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::core::errors::DepsyncError;
use crate::core::platform::{self, EXTENSION_PREFIX, RUNTIME_PACKAGE};
use crate::util::natord;

/// Constraint used when a dependency is moved into a section and no prior
/// constraint exists.
pub const DEFAULT_CONSTRAINT: &str = "dev-master";

/// A single `name: constraint` declaration.
///
/// Equality is structural: two dependencies are equal when both the name and
/// the constraint match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    name: String,
    constraint: String,
}

impl Dependency {
    /// Create a new dependency.
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            constraint: constraint.into(),
        }
    }

    /// Get the package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the constraint string.
    pub fn constraint(&self) -> &str {
        &self.constraint
    }

    /// Whether the declaration carries an actual constraint.
    pub fn has_constraint(&self) -> bool {
        !self.constraint.trim().is_empty()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.constraint)
    }
}

/// Which dependency section a declaration lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    /// `require`
    Primary,
    /// `require-dev`
    Development,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 2] = [DependencyKind::Primary, DependencyKind::Development];

    /// The manifest key holding this section.
    pub fn key(&self) -> &'static str {
        match self {
            DependencyKind::Primary => "require",
            DependencyKind::Development => "require-dev",
        }
    }

    /// The opposite section.
    pub fn other(&self) -> DependencyKind {
        match self {
            DependencyKind::Primary => DependencyKind::Development,
            DependencyKind::Development => DependencyKind::Primary,
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for DependencyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl FromStr for DependencyKind {
    type Err = DepsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require" | "primary" => Ok(DependencyKind::Primary),
            "require-dev" | "development" => Ok(DependencyKind::Development),
            other => Err(DepsyncError::validation(format!(
                "unknown dependency section `{}`; expected `require` or `require-dev`",
                other
            ))),
        }
    }
}

/// An ordered dependency section with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySection {
    entries: Vec<Dependency>,
}

impl DependencySection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|d| d.name())
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a dependency, replacing the constraint in place if the name
    /// already exists. New names are appended.
    pub fn insert(&mut self, dep: Dependency) {
        match self.entries.iter_mut().find(|d| d.name == dep.name) {
            Some(existing) => existing.constraint = dep.constraint,
            None => self.entries.push(dep),
        }
    }

    /// Remove a dependency by name.
    pub fn remove(&mut self, name: &str) -> Option<Dependency> {
        let idx = self.entries.iter().position(|d| d.name == name)?;
        Some(self.entries.remove(idx))
    }

    /// Set equality by name and constraint, ignoring order.
    pub fn same_entries(&self, other: &DependencySection) -> bool {
        self.len() == other.len() && self.iter().all(|d| other.get(d.name()) == Some(d))
    }

    /// Re-order as: the runtime entry, its variants (`php-64bit`, `hhvm`),
    /// then extensions, then everything else, each group in natural order.
    ///
    /// This approximates the ecosystem's own `sort-packages` behaviour; it
    /// is not guaranteed to match it byte for byte.
    pub fn sort_packages(&mut self) {
        self.entries
            .sort_by(|a, b| compare_for_sort(a.name(), b.name()));
    }
}

fn sort_group(name: &str) -> u8 {
    if name.eq_ignore_ascii_case(RUNTIME_PACKAGE) {
        0
    } else if platform::is_interpreter(name) {
        1
    } else if name.to_ascii_lowercase().starts_with(EXTENSION_PREFIX) {
        2
    } else {
        3
    }
}

fn compare_for_sort(a: &str, b: &str) -> Ordering {
    sort_group(a)
        .cmp(&sort_group(b))
        .then_with(|| natord::compare(a, b))
}

impl FromIterator<Dependency> for DependencySection {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        let mut section = DependencySection::new();
        for dep in iter {
            section.insert(dep);
        }
        section
    }
}

impl<'a> IntoIterator for &'a DependencySection {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
