//! depsync CLI

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};
use depsync::core::errors::DepsyncError;
use depsync::util::diagnostic::{self, Diagnostic};
use depsync::util::{GlobalContext, Shell};

use commands::Reported;

fn main() {
    let cli = Cli::parse();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    // Logs share stderr with the shell so JSON output on stdout stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.quiet {
            EnvFilter::new("depsync=error")
        } else if cli.verbose {
            EnvFilter::new("depsync=debug")
        } else {
            EnvFilter::new("depsync=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(cli, &shell) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report(&shell, &e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli, shell: &Arc<Shell>) -> Result<i32> {
    let ctx = GlobalContext::new()?;

    let manifest = cli.manifest.as_deref();
    match cli.command {
        None => commands::sync::execute(&ctx, shell, manifest, cli.sync.dry_run),
        Some(Commands::Check) => commands::check::execute(&ctx, shell, manifest),
        Some(Commands::Why(args)) => commands::why::execute(&ctx, shell, manifest, args),
    }
}

fn report(shell: &Shell, e: &anyhow::Error) {
    if shell.is_json() {
        shell.error(format!("{:#}", e));
        return;
    }

    let diag = if let Some(Reported(diag)) = e.downcast_ref::<Reported>() {
        diag.clone()
    } else if let Some(err) = e.chain().find_map(|c| c.downcast_ref::<DepsyncError>()) {
        let diag = err.to_diagnostic();
        let outer = e.to_string();
        if outer != err.to_string() {
            diag.with_context(outer)
        } else {
            diag
        }
    } else {
        Diagnostic::error(format!("{:#}", e))
    };
    diagnostic::emit(&diag, shell.use_color());
}
