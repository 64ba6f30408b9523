//! `depsync` (no subcommand): rewrite the manifest

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use depsync::ops::sync::{sync, SyncOptions, SyncReport};
use depsync::util::fs::display_path;
use depsync::util::shell::{Shell, Status};
use depsync::util::GlobalContext;

use super::{locate_manifest, print_changes, warn_missing};

#[derive(Serialize)]
struct SyncEvent<'a> {
    reason: &'static str,
    #[serde(flatten)]
    report: &'a SyncReport,
}

pub fn execute(
    ctx: &GlobalContext,
    shell: &Arc<Shell>,
    manifest: Option<&Path>,
    dry_run: bool,
) -> Result<i32> {
    let manifest_path = locate_manifest(ctx, manifest)?;
    let shown = display_path(ctx.cwd(), &manifest_path).display().to_string();

    let span = shell.span(Status::Scanning, format!("sources of {}", shown));
    let report = sync(&SyncOptions {
        manifest_path,
        dry_run,
    })?;
    span.finish_with_message(format!("analysis of {} symbols", report.symbols));

    if shell.is_json() {
        shell.json_event(&SyncEvent {
            reason: "sync",
            report: &report,
        });
        return Ok(0);
    }

    warn_missing(shell, &report.missing);
    print_changes(shell, &report.changes);

    if report.written {
        shell.status(Status::Finished, format!("updated {}", shown));
    } else if report.changed {
        shell.note(format!("dry run; {} not written", shown));
    } else {
        shell.status(Status::Finished, format!("{} is up to date", shown));
    }
    Ok(0)
}
