//! The usage ledger: every fully qualified symbol seen while scanning, and
//! the environments it was seen in.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::interning::InternedString;

/// A code environment tag, such as `production`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(InternedString);

impl Environment {
    pub const PRODUCTION: &'static str = "production";
    pub const DEVELOPMENT: &'static str = "development";

    pub fn new(tag: impl AsRef<str>) -> Self {
        Environment(InternedString::new(tag))
    }

    pub fn production() -> Self {
        Environment::new(Self::PRODUCTION)
    }

    pub fn development() -> Self {
        Environment::new(Self::DEVELOPMENT)
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }

    pub fn is_production(&self) -> bool {
        self.as_str() == Self::PRODUCTION
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol and the environments referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    name: String,
    environments: BTreeSet<Environment>,
}

impl SourceReference {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environments(&self) -> &BTreeSet<Environment> {
        &self.environments
    }
}

/// Map from fully qualified symbol name to its [`SourceReference`].
///
/// Keys never carry a leading namespace separator. Recording the same name
/// twice unions the environment sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageLedger {
    entries: BTreeMap<String, SourceReference>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, environment: Environment) {
        let name = name.trim_start_matches('\\');
        if name.is_empty() {
            return;
        }
        match self.entries.get_mut(name) {
            Some(reference) => {
                reference.environments.insert(environment);
            }
            None => {
                self.entries.insert(
                    name.to_string(),
                    SourceReference {
                        name: name.to_string(),
                        environments: BTreeSet::from([environment]),
                    },
                );
            }
        }
    }

    /// Fold `other` into this ledger.
    pub fn merge(&mut self, other: UsageLedger) {
        for (name, reference) in other.entries {
            match self.entries.entry(name) {
                btree_map::Entry::Occupied(mut existing) => {
                    existing
                        .get_mut()
                        .environments
                        .extend(reference.environments);
                }
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(reference);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SourceReference> {
        self.entries.get(name.trim_start_matches('\\'))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceReference> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// References whose name lies under the namespace `root`.
    ///
    /// A root ending in a separator (`Vendor\Pkg\`) or in `_` (a PSR-0
    /// prefix like `Twig_`) matches by plain prefix. Any other root must
    /// match the whole name or be followed by a separator or, as PSR-0
    /// allows, by `_`. So `Twig` claims `Twig_Environment` but not
    /// `TwigBridge\Thing`. Matching is case-sensitive.
    pub fn references_under<'a>(
        &'a self,
        root: &'a str,
    ) -> impl Iterator<Item = &'a SourceReference> + 'a {
        let root = root.trim_start_matches('\\');
        let open = root.ends_with('\\') || root.ends_with('_');

        self.entries
            .range::<str, _>((std::ops::Bound::Included(root), std::ops::Bound::Unbounded))
            .take_while(move |(name, _)| name.starts_with(root))
            .filter(move |(name, _)| {
                open
                    || name.len() == root.len()
                    || matches!(name.as_bytes()[root.len()], b'\\' | b'_')
            })
            .map(|(_, reference)| reference)
    }

    /// Union of the environments of every reference under `root`.
    pub fn environments_under(&self, root: &str) -> BTreeSet<Environment> {
        self.references_under(root)
            .flat_map(|r| r.environments.iter().copied())
            .collect()
    }
}
