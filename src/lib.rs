//! depsync - keeps `composer.json` dependency sections in line with the
//! code a package actually contains.
//!
//! Sources are scanned for the classes, functions, and constants they
//! reference. Each declared package is matched against those references
//! through its autoload namespaces, and the manifest is rewritten so
//! production code depends only on `require`, test code only on
//! `require-dev`, and nothing unused is declared at all.

pub mod core;
pub mod ops;
pub mod scanner;
pub mod util;

pub use crate::core::{
    dependency::{Dependency, DependencyKind, DependencySection},
    errors::{DepsyncError, ErrorKind},
    manifest::Manifest,
};
pub use ops::{Classification, DependencyReconciler, UsageAnalyzer};
pub use scanner::{Environment, Scanner, UsageLedger};
pub use util::context::GlobalContext;
