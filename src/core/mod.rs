//! Core data structures: the manifest document, its dependency sections,
//! platform requirement detection, and the error type shared by every
//! layer below the CLI.

pub mod dependency;
pub mod errors;
pub mod manifest;
pub mod platform;

pub use dependency::{Dependency, DependencyKind, DependencySection};
pub use errors::{DepsyncError, ErrorKind};
pub use manifest::{AutoloadGroup, Manifest, MANIFEST_NAME};
