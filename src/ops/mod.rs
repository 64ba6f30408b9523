//! High-level operations.
//!
//! Installed-package discovery, usage analysis, and reconciliation, plus
//! [`sync`](sync::sync) which runs them in order against one package.

pub mod analyze;
pub mod installed;
pub mod reconcile;
pub mod sync;

pub use analyze::{Classification, Exemption, PackageUsage, UsageAnalyzer};
pub use installed::{discover, Discovery, InstalledPackage};
pub use reconcile::{Change, DependencyReconciler, SectionTarget};
pub use sync::{analyze_project, sync, ProjectAnalysis, SyncOptions, SyncReport};
