//! `depsync check` command

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use depsync::ops::sync::{sync, SyncOptions, SyncReport};
use depsync::util::diagnostic::{self, suggestions, Diagnostic};
use depsync::util::fs::display_path;
use depsync::util::shell::{Shell, Status};
use depsync::util::GlobalContext;

use super::{locate_manifest, print_changes, warn_missing};

/// Exit code when the manifest is out of date.
pub const PENDING: i32 = 2;

#[derive(Serialize)]
struct CheckEvent<'a> {
    reason: &'static str,
    up_to_date: bool,
    #[serde(flatten)]
    report: &'a SyncReport,
}

pub fn execute(ctx: &GlobalContext, shell: &Arc<Shell>, manifest: Option<&Path>) -> Result<i32> {
    let manifest_path = locate_manifest(ctx, manifest)?;
    let shown = display_path(ctx.cwd(), &manifest_path);

    let span = shell.span(Status::Scanning, format!("sources of {}", shown.display()));
    let report = sync(&SyncOptions {
        manifest_path,
        dry_run: true,
    })?;
    span.finish_with_message(format!("analysis of {} symbols", report.symbols));

    let code = if report.changed { PENDING } else { 0 };

    if shell.is_json() {
        shell.json_event(&CheckEvent {
            reason: "check",
            up_to_date: !report.changed,
            report: &report,
        });
        return Ok(code);
    }

    warn_missing(shell, &report.missing);

    if report.changed {
        print_changes(shell, &report.changes);
        let summary = match report.changes.len() {
            1 => "1 pending change".to_string(),
            n => format!("{} pending changes", n),
        };
        let diag = Diagnostic::error(format!("{}: {}", shown.display(), summary))
            .with_location(shown)
            .with_suggestion(suggestions::PENDING_CHANGES);
        diagnostic::emit(&diag, shell.use_color());
    } else {
        shell.status(Status::Finished, format!("{} is up to date", shown.display()));
    }
    Ok(code)
}
