//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use depsync::util::shell::ColorChoice;

/// depsync - keep composer.json dependencies in line with the code that uses them
///
/// Without a subcommand, scans the package's sources and rewrites
/// `require`/`require-dev` in place.
#[derive(Parser)]
#[command(name = "depsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to composer.json (searched upward from the working directory by default)
    #[arg(long, global = true, value_name = "PATH", env = "DEPSYNC_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(flatten)]
    pub sync: SyncArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report pending changes without writing; exits with 2 if there are any
    Check,

    /// Explain how a declared package is classified
    Why(WhyArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Compute changes without writing composer.json
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct WhyArgs {
    /// Package name, e.g. `monolog/monolog`
    pub package: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_syncs() {
        let cli = Cli::try_parse_from(["depsync", "--dry-run", "-v"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.sync.dry_run);
        assert!(cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "depsync",
            "why",
            "vendor/pkg",
            "--manifest",
            "app/composer.json",
            "--message-format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Why(ref args)) if args.package == "vendor/pkg"));
        assert_eq!(cli.manifest, Some(PathBuf::from("app/composer.json")));
        assert!(cli.message_format == MessageFormat::Json);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["depsync", "-v", "-q"]).is_err());
    }
}
