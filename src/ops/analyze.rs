//! Usage analysis: which installed packages the scanned sources use, and in
//! which environments.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::manifest::Manifest;
use crate::ops::installed::InstalledPackage;
use crate::scanner::{Environment, UsageLedger};

/// Why a package is never removed or moved automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exemption {
    /// Listed in the `ignore` setting
    Ignored,
    PlatformRequirement,
    Plugin,
    ExecutableTools,
    NonStandardAutoload,
    /// Another installed package provides this name
    ProvidedBy(String),
}

impl fmt::Display for Exemption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exemption::Ignored => write!(f, "ignored by configuration"),
            Exemption::PlatformRequirement => write!(f, "platform requirement"),
            Exemption::Plugin => write!(f, "composer plugin"),
            Exemption::ExecutableTools => write!(f, "ships executables"),
            Exemption::NonStandardAutoload => write!(f, "uses classmap or files autoloading"),
            Exemption::ProvidedBy(by) => write!(f, "provided by {}", by),
        }
    }
}

/// Where one package is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageUsage {
    environments: BTreeSet<Environment>,
    exemption: Option<Exemption>,
}

impl PackageUsage {
    pub fn environments(&self) -> &BTreeSet<Environment> {
        &self.environments
    }

    pub fn exemption(&self) -> Option<&Exemption> {
        self.exemption.as_ref()
    }

    pub fn is_exempt(&self) -> bool {
        self.exemption.is_some()
    }

    pub fn is_used(&self) -> bool {
        !self.environments.is_empty()
    }
}

/// The outcome of [`UsageAnalyzer::analyze`], keyed by package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    packages: BTreeMap<String, PackageUsage>,
}

impl Classification {
    pub fn get(&self, name: &str) -> Option<&PackageUsage> {
        self.packages.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageUsage)> {
        self.packages.iter().map(|(name, usage)| (name.as_str(), usage))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn used_in_environment(&self, name: &str, environment: &Environment) -> bool {
        self.get(name)
            .is_some_and(|usage| usage.environments.contains(environment))
    }

    /// True iff the package's environment set is exactly `{environment}`.
    pub fn used_only_in_environment(&self, name: &str, environment: &Environment) -> bool {
        self.get(name).is_some_and(|usage| {
            usage.environments.len() == 1 && usage.environments.contains(environment)
        })
    }

    /// Packages seen nowhere and not exempt.
    pub fn unused_package_names(&self) -> BTreeSet<String> {
        self.packages
            .iter()
            .filter(|(_, usage)| !usage.is_used() && !usage.is_exempt())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Non-exempt packages used in `environment`.
    pub fn names_used_in(&self, environment: &Environment) -> Vec<&str> {
        self.iter()
            .filter(|(name, usage)| !usage.is_exempt() && self.used_in_environment(name, environment))
            .map(|(name, _)| name)
            .collect()
    }

    /// Non-exempt packages used in `environment` and nowhere else.
    pub fn names_used_only_in(&self, environment: &Environment) -> Vec<&str> {
        self.iter()
            .filter(|(name, usage)| {
                !usage.is_exempt() && self.used_only_in_environment(name, environment)
            })
            .map(|(name, _)| name)
            .collect()
    }
}

/// Classifies candidate packages against a usage ledger.
///
/// A package is used in every environment in which some recorded symbol
/// lies under one of its namespace roots. Packages without roots can never
/// be found used this way and are reported with a warning unless exempt.
pub struct UsageAnalyzer<'a> {
    candidates: &'a [InstalledPackage],
    ledger: &'a UsageLedger,
    providers: Vec<&'a InstalledPackage>,
    ignored: BTreeSet<String>,
}

impl<'a> UsageAnalyzer<'a> {
    pub fn new(candidates: &'a [InstalledPackage], ledger: &'a UsageLedger) -> Self {
        UsageAnalyzer {
            candidates,
            ledger,
            providers: candidates.iter().collect(),
            ignored: BTreeSet::new(),
        }
    }

    /// Packages whose `provide` lists exempt candidates. Defaults to the
    /// candidates themselves.
    pub fn with_providers(mut self, providers: impl IntoIterator<Item = &'a InstalledPackage>) -> Self {
        self.providers = providers.into_iter().collect();
        self
    }

    /// Names that are never touched.
    pub fn with_ignored<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn analyze(&self) -> Classification {
        let mut packages = BTreeMap::new();

        for candidate in self.candidates {
            let name = candidate.name();
            let manifest = candidate.manifest();
            let exemption = self.exemption(name, manifest);

            let roots = manifest.namespace_roots();
            if roots.is_empty() && exemption.is_none() {
                tracing::warn!(
                    "{} declares no namespace roots; its usage cannot be detected",
                    name
                );
            }

            let mut environments = BTreeSet::new();
            for root in &roots {
                environments.extend(self.ledger.environments_under(root));
            }

            tracing::debug!(
                "{}: used in [{}]{}",
                name,
                environments
                    .iter()
                    .map(Environment::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                exemption
                    .as_ref()
                    .map(|e| format!(", exempt ({})", e))
                    .unwrap_or_default()
            );

            packages.insert(
                name.to_string(),
                PackageUsage {
                    environments,
                    exemption,
                },
            );
        }

        Classification { packages }
    }

    fn exemption(&self, name: &str, manifest: &Manifest) -> Option<Exemption> {
        if self.ignored.contains(name) {
            return Some(Exemption::Ignored);
        }
        if Manifest::is_platform_requirement(name) {
            return Some(Exemption::PlatformRequirement);
        }
        if manifest.is_plugin_package() {
            return Some(Exemption::Plugin);
        }
        if manifest.declares_executable_tools() {
            return Some(Exemption::ExecutableTools);
        }
        if manifest.uses_non_standard_autoload() {
            return Some(Exemption::NonStandardAutoload);
        }
        self.providers
            .iter()
            .find(|p| p.name() != name && p.manifest().provides_virtual_package(name))
            .map(|p| Exemption::ProvidedBy(p.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn package(name: &str, json: &str) -> InstalledPackage {
        let path = Path::new("vendor").join(name);
        let manifest = Manifest::parse(json, &path.join("composer.json")).unwrap();
        InstalledPackage::new(name, manifest, path)
    }

    fn psr4(name: &str, root: &str) -> InstalledPackage {
        package(
            name,
            &format!(
                r#"{{"name": "{}", "autoload": {{"psr-4": {{"{}": "src/"}}}}}}"#,
                name,
                root.replace('\\', "\\\\")
            ),
        )
    }

    fn ledger(entries: &[(&str, Environment)]) -> UsageLedger {
        let mut ledger = UsageLedger::new();
        for (name, env) in entries {
            ledger.record(name, *env);
        }
        ledger
    }

    #[test]
    fn test_classifies_by_environment() {
        let candidates = vec![
            psr4("vendor/logger", "Vendor\\Logger\\"),
            psr4("vendor/debugbar", "Vendor\\Debugbar\\"),
            psr4("vendor/shared", "Vendor\\Shared\\"),
            psr4("vendor/unused", "Vendor\\Unused\\"),
        ];
        let ledger = ledger(&[
            ("Vendor\\Logger\\Writer", Environment::production()),
            ("Vendor\\Debugbar\\Bar", Environment::development()),
            ("Vendor\\Shared\\A", Environment::production()),
            ("Vendor\\Shared\\B", Environment::development()),
        ]);

        let classification = UsageAnalyzer::new(&candidates, &ledger).analyze();
        let prod = Environment::production();
        let dev = Environment::development();

        assert!(classification.used_in_environment("vendor/logger", &prod));
        assert!(classification.used_only_in_environment("vendor/logger", &prod));
        assert!(classification.used_only_in_environment("vendor/debugbar", &dev));
        assert!(classification.used_in_environment("vendor/shared", &dev));
        assert!(!classification.used_only_in_environment("vendor/shared", &dev));
        assert_eq!(
            classification.unused_package_names(),
            BTreeSet::from(["vendor/unused".to_string()])
        );
        assert_eq!(
            classification.names_used_in(&prod),
            ["vendor/logger", "vendor/shared"]
        );
        assert_eq!(classification.names_used_only_in(&dev), ["vendor/debugbar"]);
    }

    #[test]
    fn test_roots_match_on_namespace_boundary() {
        let candidates = vec![psr4("vendor/logger", "Vendor\\Logger")];
        let ledger = ledger(&[("Vendor\\LoggerExtra\\Thing", Environment::production())]);

        let classification = UsageAnalyzer::new(&candidates, &ledger).analyze();
        assert!(classification.unused_package_names().contains("vendor/logger"));
    }

    #[test]
    fn test_package_without_roots_is_never_used() {
        let candidates = vec![package("vendor/meta", r#"{"name": "vendor/meta"}"#)];
        let ledger = ledger(&[("Vendor\\Meta\\X", Environment::production())]);

        let classification = UsageAnalyzer::new(&candidates, &ledger).analyze();
        assert!(!classification.get("vendor/meta").unwrap().is_used());
        assert!(classification.unused_package_names().contains("vendor/meta"));
    }

    #[test]
    fn test_exemptions() {
        let candidates = vec![
            package(
                "vendor/plugin",
                r#"{"type": "composer-plugin", "autoload": {"psr-4": {"P\\": "src"}}}"#,
            ),
            package("vendor/tool", r#"{"bin": ["bin/tool"]}"#),
            package("vendor/files", r#"{"autoload": {"files": ["helpers.php"]}}"#),
            package("vendor/classmap", r#"{"autoload": {"classmap": ["lib/"]}}"#),
            package("vendor/impl", r#"{"provide": {"psr/log-implementation": "1.0"}}"#),
            package("psr/log-implementation", r#"{"autoload": {"psr-4": {"X\\": ""}}}"#),
            psr4("vendor/ignored", "Ignored\\"),
            package("ext-json", "{}"),
        ];
        let ledger = UsageLedger::new();

        let classification = UsageAnalyzer::new(&candidates, &ledger)
            .with_ignored(["vendor/ignored"])
            .analyze();

        let exemption = |name: &str| classification.get(name).unwrap().exemption().cloned();
        assert_eq!(exemption("vendor/plugin"), Some(Exemption::Plugin));
        assert_eq!(exemption("vendor/tool"), Some(Exemption::ExecutableTools));
        assert_eq!(exemption("vendor/files"), Some(Exemption::NonStandardAutoload));
        assert_eq!(exemption("vendor/classmap"), Some(Exemption::NonStandardAutoload));
        assert_eq!(
            exemption("psr/log-implementation"),
            Some(Exemption::ProvidedBy("vendor/impl".to_string()))
        );
        assert_eq!(exemption("vendor/ignored"), Some(Exemption::Ignored));
        assert_eq!(exemption("ext-json"), Some(Exemption::PlatformRequirement));

        assert_eq!(
            classification.unused_package_names(),
            BTreeSet::from(["vendor/impl".to_string()])
        );
    }

    #[test]
    fn test_provided_by_other_installed_package() {
        let candidates = vec![psr4("psr/http-client-implementation", "Psr\\Impl\\")];
        let provider = package(
            "guzzle/guzzle",
            r#"{"provide": {"psr/http-client-implementation": "1.0"}}"#,
        );
        let providers = [provider];

        let classification = UsageAnalyzer::new(&candidates, &UsageLedger::new())
            .with_providers(&providers)
            .analyze();

        assert_eq!(
            classification
                .get("psr/http-client-implementation")
                .unwrap()
                .exemption(),
            Some(&Exemption::ProvidedBy("guzzle/guzzle".to_string()))
        );
        assert!(classification.unused_package_names().is_empty());
    }

    #[test]
    fn test_exempt_packages_are_not_listed_for_moves() {
        let candidates = vec![package(
            "vendor/tool",
            r#"{"bin": "bin/tool", "autoload": {"psr-4": {"Tool\\": "src"}}}"#,
        )];
        let ledger = ledger(&[("Tool\\Runner", Environment::production())]);

        let classification = UsageAnalyzer::new(&candidates, &ledger).analyze();
        assert!(classification.used_in_environment("vendor/tool", &Environment::production()));
        assert!(classification.names_used_in(&Environment::production()).is_empty());
    }
}
