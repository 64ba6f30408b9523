//! Command implementations

pub mod check;
pub mod sync;
pub mod why;

use std::path::{Path, PathBuf};

use depsync::core::manifest::MANIFEST_NAME;
use depsync::ops::Change;
use depsync::util::diagnostic::{self, suggestions, Diagnostic};
use depsync::util::shell::{Shell, Status};
use depsync::util::GlobalContext;

/// An error that already carries its user-facing diagnostic.
#[derive(Debug, thiserror::Error)]
#[error("{}", .0.message)]
pub struct Reported(pub Diagnostic);

/// The manifest named on the command line, or the nearest one above the
/// working directory.
pub fn locate_manifest(ctx: &GlobalContext, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    ctx.manifest_path(explicit).ok_or_else(|| {
        Reported(
            Diagnostic::error(format!("could not find `{}`", MANIFEST_NAME))
                .with_context(format!("searched upward from {}", ctx.cwd().display()))
                .with_suggestion(suggestions::NO_MANIFEST),
        )
        .into()
    })
}

pub fn print_changes(shell: &Shell, changes: &[Change]) {
    for change in changes {
        let status = match change {
            Change::Removed { .. } => Status::Removed,
            Change::Moved { .. } => Status::Moved,
            Change::Added { .. } => Status::Added,
        };
        shell.status(status, change);
    }
}

pub fn warn_missing(shell: &Shell, missing: &[String]) {
    if missing.is_empty() || shell.is_json() || shell.is_quiet() {
        return;
    }
    let mut diag = Diagnostic::warning(format!(
        "{} declared package{} not installed; left untouched",
        missing.len(),
        if missing.len() == 1 { " is" } else { "s are" }
    ));
    for name in missing {
        diag = diag.with_context(name.clone());
    }
    diagnostic::emit(&diag.with_suggestion(suggestions::NOT_INSTALLED), shell.use_color());
}
