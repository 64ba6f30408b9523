//! `depsync why` command

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use depsync::core::dependency::DependencyKind;
use depsync::core::manifest::Manifest;
use depsync::ops::sync::{analyze_project, ProjectAnalysis};
use depsync::scanner::Environment;
use depsync::util::diagnostic::{suggestions, Diagnostic};
use depsync::util::fs::display_path;
use depsync::util::shell::Shell;
use depsync::util::GlobalContext;

use super::{locate_manifest, Reported};
use crate::cli::WhyArgs;

/// Referencing symbols listed per namespace root.
const SAMPLE_LIMIT: usize = 5;

#[derive(Serialize)]
struct WhyEvent<'a> {
    reason: &'static str,
    package: &'a str,
    section: DependencyKind,
    constraint: &'a str,
    verdict: &'a str,
    exemption: Option<String>,
    environments: Vec<Environment>,
    roots: Vec<String>,
}

pub fn execute(
    ctx: &GlobalContext,
    shell: &Arc<Shell>,
    manifest: Option<&Path>,
    args: WhyArgs,
) -> Result<i32> {
    let manifest_path = locate_manifest(ctx, manifest)?;
    let shown = display_path(ctx.cwd(), &manifest_path);
    let analysis = analyze_project(&manifest_path)?;
    let name = args.package.as_str();

    let mut declared = None;
    for kind in DependencyKind::ALL {
        if let Some(dep) = analysis.manifest.dependency_section(kind)?.get(name) {
            declared = Some((kind, dep.constraint().to_string()));
            break;
        }
    }
    let Some((section, constraint)) = declared else {
        return Err(Reported(
            Diagnostic::error(format!("{} is not declared in {}", name, shown.display()))
                .with_location(shown),
        )
        .into());
    };

    let missing = analysis.missing.iter().any(|m| m == name);
    let verdict = verdict(&analysis, name, missing);
    let usage = analysis.classification.get(name);
    let roots: Vec<String> = analysis
        .installed_package(name)
        .map(|p| p.manifest().namespace_roots().into_iter().collect())
        .unwrap_or_default();

    if shell.is_json() {
        shell.json_event(&WhyEvent {
            reason: "why",
            package: name,
            section,
            constraint: &constraint,
            verdict: &verdict,
            exemption: usage.and_then(|u| u.exemption()).map(ToString::to_string),
            environments: usage
                .map(|u| u.environments().iter().copied().collect())
                .unwrap_or_default(),
            roots,
        });
        return Ok(0);
    }

    let mut diag = Diagnostic::note(format!("{} ({}) is declared in `{}`", name, constraint, section))
        .with_location(shown)
        .with_context(verdict);

    for root in &roots {
        let mut references = analysis.ledger.references_under(root).peekable();
        if references.peek().is_none() {
            diag = diag.with_context(format!("{} is never referenced", root));
            continue;
        }
        for reference in references.take(SAMPLE_LIMIT) {
            let environments: Vec<&str> = reference.environments().iter().map(|e| e.as_str()).collect();
            diag = diag.with_context(format!("{} ({})", reference.name(), environments.join(", ")));
        }
    }

    if missing {
        diag = diag.with_suggestion(suggestions::NOT_INSTALLED);
    }

    print!("{}", diag.format(shell.use_color()));
    Ok(0)
}

fn verdict(analysis: &ProjectAnalysis, name: &str, missing: bool) -> String {
    if Manifest::is_platform_requirement(name) {
        return "platform requirement; never changed".to_string();
    }
    if missing {
        return "not installed; left untouched".to_string();
    }

    let classification = &analysis.classification;
    match classification.get(name) {
        Some(usage) => match usage.exemption() {
            Some(exemption) => format!("kept as declared: {}", exemption),
            None if !usage.is_used() => "unused; would be removed".to_string(),
            None if classification.used_in_environment(name, &Environment::production()) => {
                "used by production code; belongs in `require`".to_string()
            }
            None => "used only by development code; belongs in `require-dev`".to_string(),
        },
        None => "not analyzed".to_string(),
    }
}
