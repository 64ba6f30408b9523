//! Source scanning.
//!
//! A [`Scanner`] holds target paths grouped by environment. On first
//! request it parses every PHP file under them in parallel, resolves each
//! reference to its fully qualified name, and records it in a
//! [`UsageLedger`] under the environment of the path it came from. The
//! ledger is cached until the target set changes.
//!
//! A target never descends into excluded paths (such as the vendor
//! directory) or into a nested target of another environment, so a
//! project mapped at its own root does not count its tests as production
//! code.
//!
//! Any file that cannot be read or parsed aborts the scan: a partial
//! ledger would make used packages look unused.

pub mod ledger;
pub mod lexer;
pub mod parser;
pub mod resolve;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::core::errors::DepsyncError;
use crate::util::fs;

pub use ledger::{Environment, SourceReference, UsageLedger};
pub use parser::{PhpParser, ReferenceKind, SourceParser, SyntaxError, SyntaxTree};
pub use resolve::{NameResolver, ReferenceVisitor};

/// File extension of scanned sources.
pub const SOURCE_EXTENSION: &str = "php";

/// Collects symbol usages from source files.
#[derive(Debug)]
pub struct Scanner<P = PhpParser> {
    parser: P,
    targets: BTreeMap<Environment, BTreeSet<PathBuf>>,
    excluded: BTreeSet<PathBuf>,
    usages: Option<UsageLedger>,
}

impl Default for Scanner<PhpParser> {
    fn default() -> Self {
        Scanner::new(PhpParser::new())
    }
}

impl<P> Scanner<P>
where
    P: SourceParser + Sync,
{
    pub fn new(parser: P) -> Self {
        Scanner {
            parser,
            targets: BTreeMap::new(),
            excluded: BTreeSet::new(),
            usages: None,
        }
    }

    /// Add scan targets for `environment`.
    ///
    /// Relative paths are taken relative to `base`. Targets accumulate
    /// across calls; any cached ledger is dropped.
    pub fn add_target_paths<I, S>(&mut self, environment: Environment, paths: I, base: &Path)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let entry = self.targets.entry(environment).or_default();
        for path in paths {
            entry.insert(fs::normalize(&base.join(path.as_ref())));
        }
        self.usages = None;
    }

    /// Never descend into `paths` (relative to `base`) while walking a
    /// target. Excluded paths that are targets themselves are still read.
    pub fn exclude_paths<I, S>(&mut self, paths: I, base: &Path)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        for path in paths {
            self.excluded.insert(fs::normalize(&base.join(path.as_ref())));
        }
        self.usages = None;
    }

    pub fn targets(&self) -> &BTreeMap<Environment, BTreeSet<PathBuf>> {
        &self.targets
    }

    /// The usage ledger, scanning on first call.
    pub fn get_usages(&mut self) -> Result<&UsageLedger, DepsyncError> {
        let ledger = match self.usages.take() {
            Some(ledger) => ledger,
            None => self.scan()?,
        };
        Ok(self.usages.insert(ledger))
    }

    /// Consume the scanner, returning its ledger.
    pub fn into_usages(mut self) -> Result<UsageLedger, DepsyncError> {
        match self.usages.take() {
            Some(ledger) => Ok(ledger),
            None => self.scan(),
        }
    }

    fn scan(&self) -> Result<UsageLedger, DepsyncError> {
        let mut jobs: Vec<(Environment, PathBuf)> = Vec::new();
        for (environment, roots) in &self.targets {
            for root in roots {
                let excluded = self.excluded_under(*environment, root);
                for file in fs::source_files(root, SOURCE_EXTENSION, &excluded)? {
                    jobs.push((*environment, file));
                }
            }
        }

        tracing::debug!("scanning {} source files", jobs.len());

        let ledger = jobs
            .par_iter()
            .map_init(
                || self.parser.clone(),
                |parser, (environment, file)| scan_file(parser, *environment, file),
            )
            .try_reduce(UsageLedger::new, |mut acc, ledger| {
                acc.merge(ledger);
                Ok(acc)
            })?;

        tracing::debug!("recorded {} distinct symbols", ledger.len());
        Ok(ledger)
    }

    /// Paths a walk of `root` must skip: every exclusion, plus the targets
    /// of other environments nested inside it.
    fn excluded_under(&self, environment: Environment, root: &Path) -> Vec<PathBuf> {
        let nested = self
            .targets
            .iter()
            .filter(|(other, _)| **other != environment)
            .flat_map(|(_, paths)| paths)
            .filter(|p| p.as_path() != root && p.starts_with(root));

        self.excluded.iter().chain(nested).cloned().collect()
    }
}

fn scan_file<P: SourceParser>(
    parser: &mut P,
    environment: Environment,
    path: &Path,
) -> Result<UsageLedger, DepsyncError> {
    let source = fs::read_to_string(path)?;
    let tree = parser.parse(&source).map_err(|e| DepsyncError::Parse {
        path: path.to_path_buf(),
        line: e.line,
        message: e.message,
    })?;

    let mut recorder = Recorder {
        ledger: UsageLedger::new(),
        environment,
    };
    NameResolver::new().walk(&tree, &mut recorder);

    tracing::trace!(
        "{}: {} symbols ({})",
        path.display(),
        recorder.ledger.len(),
        environment
    );
    Ok(recorder.ledger)
}

/// Records every resolved reference, whatever its kind.
struct Recorder {
    ledger: UsageLedger,
    environment: Environment,
}

impl ReferenceVisitor for Recorder {
    fn visit_class(&mut self, name: &str) {
        self.ledger.record(name, self.environment);
    }

    fn visit_function(&mut self, name: &str) {
        self.ledger.record(name, self.environment);
    }

    fn visit_constant(&mut self, name: &str) {
        self.ledger.record(name, self.environment);
    }
}
