//! composer.json manifest model.
//!
//! The manifest is kept as the decoded JSON document so that everything
//! outside the two dependency sections survives a rewrite untouched, in its
//! original key order. Structural questions (namespace roots, exemption
//! flags) are answered directly from the document.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::core::dependency::{Dependency, DependencyKind, DependencySection};
use crate::core::errors::DepsyncError;
use crate::core::platform;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "composer.json";

/// Package type that marks a tooling plugin.
const PLUGIN_TYPE: &str = "composer-plugin";

/// Autoload rules keyed by namespace root.
const NAMESPACE_RULES: [&str; 2] = ["psr-4", "psr-0"];

/// Autoload rules that list files or class maps instead of namespace roots.
const OPAQUE_RULES: [&str; 2] = ["classmap", "files"];

/// One of the two autoload groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoloadGroup {
    /// `autoload`
    Runtime,
    /// `autoload-dev`
    Development,
}

impl AutoloadGroup {
    pub const ALL: [AutoloadGroup; 2] = [AutoloadGroup::Runtime, AutoloadGroup::Development];

    pub fn key(&self) -> &'static str {
        match self {
            AutoloadGroup::Runtime => "autoload",
            AutoloadGroup::Development => "autoload-dev",
        }
    }
}

/// A parsed composer.json.
#[derive(Debug, Clone)]
pub struct Manifest {
    document: Map<String, Value>,
    path: PathBuf,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self, DepsyncError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| DepsyncError::io(path, e))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content. `path` is only used for error reporting.
    pub fn parse(content: &str, path: &Path) -> Result<Self, DepsyncError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| DepsyncError::manifest(path, e.to_string()))?;

        Self::from_value(value, path)
    }

    /// Build a manifest from an already-decoded document, such as one entry
    /// of `vendor/composer/installed.json`.
    pub fn from_value(value: Value, path: &Path) -> Result<Self, DepsyncError> {
        let document = match value {
            Value::Object(map) => map,
            other => {
                return Err(DepsyncError::manifest(
                    path,
                    format!("expected a JSON object, found {}", json_type(&other)),
                ))
            }
        };

        let manifest = Manifest {
            document,
            path: path.to_path_buf(),
        };

        // Surface malformed sections at load time rather than mid-run
        for kind in DependencyKind::ALL {
            manifest.dependency_section(kind)?;
        }

        Ok(manifest)
    }

    /// The path this manifest was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The declared package name, if any.
    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    /// Read one dependency section. A missing section is empty.
    pub fn dependency_section(&self, kind: DependencyKind) -> Result<DependencySection, DepsyncError> {
        let key = kind.key();
        match self.document.get(key) {
            None => Ok(DependencySection::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, constraint)| match constraint {
                    Value::String(c) => Ok(Dependency::new(name.clone(), c.clone())),
                    other => Err(DepsyncError::manifest(
                        &self.path,
                        format!(
                            "constraint for `{}` in `{}` must be a string, found {}",
                            name,
                            key,
                            json_type(other)
                        ),
                    )),
                })
                .collect(),
            // An empty PHP array encodes as `[]`
            Some(Value::Array(items)) if items.is_empty() => Ok(DependencySection::new()),
            Some(other) => Err(DepsyncError::manifest(
                &self.path,
                format!("`{}` must be an object, found {}", key, json_type(other)),
            )),
        }
    }

    /// Replace one dependency section, keeping the given order.
    ///
    /// An empty section removes the key from the document. A section that
    /// did not exist before is placed next to its sibling section, or at the
    /// end of the document.
    pub fn set_dependency_section(&mut self, kind: DependencyKind, section: &DependencySection) {
        let key = kind.key();

        if section.is_empty() {
            self.remove_key(key);
            return;
        }

        let value: Map<String, Value> = section
            .iter()
            .map(|d| (d.name().to_string(), Value::String(d.constraint().to_string())))
            .collect();

        if self.document.contains_key(key) {
            self.document.insert(key.to_string(), Value::Object(value));
            return;
        }

        match kind {
            DependencyKind::Primary => {
                self.insert_before(key, Value::Object(value), DependencyKind::Development.key())
            }
            DependencyKind::Development => {
                self.insert_after(key, Value::Object(value), DependencyKind::Primary.key())
            }
        }
    }

    /// Union of the namespace roots declared in `autoload` and
    /// `autoload-dev`.
    ///
    /// Roots are returned without a leading separator. The empty fallback
    /// root is not a usable prefix and is left out; see
    /// [`Manifest::uses_non_standard_autoload`].
    pub fn namespace_roots(&self) -> BTreeSet<String> {
        let mut roots = BTreeSet::new();

        for group in AutoloadGroup::ALL {
            for rule in NAMESPACE_RULES {
                let Some(Value::Object(map)) = self.autoload_rule(group, rule) else {
                    continue;
                };
                for root in map.keys() {
                    let root = root.trim_start_matches('\\');
                    if !root.is_empty() {
                        roots.insert(root.to_string());
                    }
                }
            }
        }

        roots
    }

    /// Whether this package loads code in a way that cannot be mapped back
    /// from class names: class maps, eagerly included files, or the empty
    /// fallback namespace root.
    pub fn uses_non_standard_autoload(&self) -> bool {
        AutoloadGroup::ALL.iter().any(|&group| {
            let opaque = OPAQUE_RULES
                .iter()
                .any(|rule| self.autoload_rule(group, rule).is_some_and(is_non_empty));

            let fallback_root = NAMESPACE_RULES.iter().any(|rule| {
                matches!(
                    self.autoload_rule(group, rule),
                    Some(Value::Object(map)) if map.keys().any(|k| k.trim_start_matches('\\').is_empty())
                )
            });

            opaque || fallback_root
        })
    }

    /// Every directory or file referenced by one autoload group, in
    /// document order and without duplicates.
    pub fn autoload_paths(&self, group: AutoloadGroup) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let Some(Value::Object(rules)) = self.document.get(group.key()) else {
            return paths;
        };

        let mut push = |p: &str| {
            let p = p.trim();
            let p = if p.is_empty() { "." } else { p };
            if !paths.iter().any(|existing| existing == p) {
                paths.push(p.to_string());
            }
        };

        for (rule, value) in rules {
            if rule == "exclude-from-classmap" {
                continue;
            }
            match value {
                Value::Object(map) => {
                    for v in map.values() {
                        for_each_string(v, &mut push);
                    }
                }
                other => for_each_string(other, &mut push),
            }
        }

        paths
    }

    /// `exclude-from-classmap` entries of both autoload groups, with
    /// leading and trailing separators trimmed. Wildcard patterns are
    /// returned as written.
    pub fn classmap_exclusions(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for group in AutoloadGroup::ALL {
            let Some(value) = self.autoload_rule(group, "exclude-from-classmap") else {
                continue;
            };
            for_each_string(value, &mut |p: &str| {
                let p = p.trim().trim_matches('/');
                if !p.is_empty() && !paths.iter().any(|existing| existing == p) {
                    paths.push(p.to_string());
                }
            });
        }
        paths
    }

    /// Whether `name` is a platform requirement rather than a package.
    pub fn is_platform_requirement(name: &str) -> bool {
        platform::is_platform_requirement(name)
    }

    /// Whether this manifest declares that it provides `name`.
    pub fn provides_virtual_package(&self, name: &str) -> bool {
        self.provided_packages().any(|p| p == name)
    }

    /// Names listed under `provide`.
    pub fn provided_packages(&self) -> impl Iterator<Item = &str> {
        self.document
            .get("provide")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Whether this package ships command-line entry points (`bin`).
    pub fn declares_executable_tools(&self) -> bool {
        self.document.get("bin").is_some_and(is_non_empty)
    }

    /// Whether this package is a tooling plugin.
    pub fn is_plugin_package(&self) -> bool {
        self.document.get("type").and_then(Value::as_str) == Some(PLUGIN_TYPE)
    }

    /// Whether `config.sort-packages` is enabled.
    pub fn sorting_enabled(&self) -> bool {
        self.config_value("sort-packages")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// `config.vendor-dir`, if set.
    pub fn vendor_dir(&self) -> Option<&str> {
        self.config_value("vendor-dir").and_then(Value::as_str)
    }

    /// Serialize the document: four-space indentation, unescaped slashes and
    /// unicode, trailing newline. Keys keep their document order.
    pub fn serialize(&self) -> Result<String, DepsyncError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);

        self.document
            .serialize(&mut ser)
            .map_err(|e| DepsyncError::manifest(&self.path, e.to_string()))?;

        let mut text = String::from_utf8(buf)
            .map_err(|e| DepsyncError::manifest(&self.path, e.to_string()))?;
        text.push('\n');
        Ok(text)
    }

    fn autoload_rule(&self, group: AutoloadGroup, rule: &str) -> Option<&Value> {
        self.document.get(group.key())?.as_object()?.get(rule)
    }

    fn config_value(&self, key: &str) -> Option<&Value> {
        self.document.get("config")?.as_object()?.get(key)
    }

    fn remove_key(&mut self, key: &str) {
        if !self.document.contains_key(key) {
            return;
        }
        let document = std::mem::take(&mut self.document);
        self.document = document.into_iter().filter(|(k, _)| k != key).collect();
    }

    fn insert_before(&mut self, key: &str, value: Value, anchor: &str) {
        if !self.document.contains_key(anchor) {
            self.document.insert(key.to_string(), value);
            return;
        }
        let document = std::mem::take(&mut self.document);
        let mut value = Some(value);
        for (k, v) in document {
            if k == anchor {
                if let Some(value) = value.take() {
                    self.document.insert(key.to_string(), value);
                }
            }
            self.document.insert(k, v);
        }
    }

    fn insert_after(&mut self, key: &str, value: Value, anchor: &str) {
        if !self.document.contains_key(anchor) {
            self.document.insert(key.to_string(), value);
            return;
        }
        let document = std::mem::take(&mut self.document);
        let mut value = Some(value);
        for (k, v) in document {
            let is_anchor = k == anchor;
            self.document.insert(k, v);
            if is_anchor {
                if let Some(value) = value.take() {
                    self.document.insert(key.to_string(), value);
                }
            }
        }
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn for_each_string<F: FnMut(&str)>(value: &Value, f: &mut F) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => {
            for item in items {
                for_each_string(item, f);
            }
        }
        _ => {}
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    const APP_MANIFEST: &str = r#"{
    "name": "acme/app",
    "description": "Example application",
    "type": "project",
    "require": {
        "php": ">=8.1",
        "ext-json": "*",
        "vendor/logger": "^2.0"
    },
    "require-dev": {
        "phpunit/phpunit": "^10.0"
    },
    "autoload": {
        "psr-4": {
            "Acme\\App\\": "src/"
        }
    },
    "autoload-dev": {
        "psr-4": {
            "Acme\\App\\Tests\\": "tests/"
        }
    },
    "config": {
        "sort-packages": true
    }
}
"#;

    fn parse(content: &str) -> Manifest {
        Manifest::parse(content, Path::new(MANIFEST_NAME)).unwrap()
    }

    #[test]
    fn test_parse_sections() {
        let manifest = parse(APP_MANIFEST);
        assert_eq!(manifest.name(), Some("acme/app"));

        let require = manifest.dependency_section(DependencyKind::Primary).unwrap();
        assert_eq!(
            require.names().collect::<Vec<_>>(),
            ["php", "ext-json", "vendor/logger"]
        );

        let require_dev = manifest
            .dependency_section(DependencyKind::Development)
            .unwrap();
        assert_eq!(require_dev.get("phpunit/phpunit").unwrap().constraint(), "^10.0");
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let manifest = parse(APP_MANIFEST);
        assert_eq!(manifest.serialize().unwrap(), APP_MANIFEST);
    }

    #[test]
    fn test_round_trip_keeps_slashes_and_unicode() {
        let content = r#"{
    "name": "acme/lib",
    "homepage": "https://example.com/docs",
    "authors": [
        {
            "name": "Zoë Müller"
        }
    ],
    "keywords": [],
    "extra": {}
}
"#;
        assert_eq!(parse(content).serialize().unwrap(), content);
    }

    #[test]
    fn test_invalid_json_is_manifest_error() {
        let err = Manifest::parse("{ \"name\": ", Path::new(MANIFEST_NAME)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Manifest);

        let err = Manifest::parse("[1, 2]", Path::new(MANIFEST_NAME)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Manifest);
        assert!(err.to_string().contains("expected a JSON object"));
    }

    #[test]
    fn test_non_string_constraint_is_rejected() {
        let err = Manifest::parse(
            r#"{"require": {"vendor/logger": 2}}"#,
            Path::new(MANIFEST_NAME),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Manifest);
        assert!(err.to_string().contains("vendor/logger"));
    }

    #[test]
    fn test_empty_array_section_is_empty() {
        let manifest = parse(r#"{"require": []}"#);
        assert!(manifest
            .dependency_section(DependencyKind::Primary)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_namespace_roots_union_both_groups() {
        let manifest = parse(
            r#"{
                "autoload": {
                    "psr-4": {"Vendor\\Logger\\": "src/", "": "fallback/"},
                    "psr-0": {"Legacy_": "lib/"}
                },
                "autoload-dev": {"psr-4": {"Vendor\\Logger\\Tests\\": "tests/"}}
            }"#,
        );

        let roots: Vec<_> = manifest.namespace_roots().into_iter().collect();
        assert_eq!(
            roots,
            ["Legacy_", "Vendor\\Logger\\", "Vendor\\Logger\\Tests\\"]
        );
        // the empty fallback root cannot be prefix-matched
        assert!(manifest.uses_non_standard_autoload());
    }

    #[test]
    fn test_non_standard_autoload() {
        let classmap = parse(r#"{"autoload": {"classmap": ["lib/"]}}"#);
        assert!(classmap.uses_non_standard_autoload());

        let files = parse(r#"{"autoload-dev": {"files": ["helpers.php"]}}"#);
        assert!(files.uses_non_standard_autoload());

        let empty_files = parse(r#"{"autoload": {"psr-4": {"A\\": "src"}, "files": []}}"#);
        assert!(!empty_files.uses_non_standard_autoload());
    }

    #[test]
    fn test_exemption_flags() {
        let tool = parse(r#"{"name": "vendor/tool", "bin": ["bin/tool"]}"#);
        assert!(tool.declares_executable_tools());
        assert!(!tool.is_plugin_package());

        let single_bin = parse(r#"{"bin": "bin/tool"}"#);
        assert!(single_bin.declares_executable_tools());

        let plugin = parse(r#"{"type": "composer-plugin"}"#);
        assert!(plugin.is_plugin_package());

        let provider = parse(r#"{"provide": {"psr/log-implementation": "3.0"}}"#);
        assert!(provider.provides_virtual_package("psr/log-implementation"));
        assert!(!provider.provides_virtual_package("psr/log"));

        assert!(Manifest::is_platform_requirement("ext-intl"));
        assert!(!Manifest::is_platform_requirement("vendor/logger"));
    }

    #[test]
    fn test_config_flags() {
        let manifest = parse(APP_MANIFEST);
        assert!(manifest.sorting_enabled());
        assert_eq!(manifest.vendor_dir(), None);

        let custom = parse(r#"{"config": {"vendor-dir": "lib/vendor"}}"#);
        assert!(!custom.sorting_enabled());
        assert_eq!(custom.vendor_dir(), Some("lib/vendor"));
    }

    #[test]
    fn test_autoload_paths() {
        let manifest = parse(
            r#"{
                "autoload": {
                    "psr-4": {"A\\": "src/", "B\\": ["src/", "lib/"]},
                    "files": ["bootstrap.php"],
                    "exclude-from-classmap": ["src/Legacy/"]
                }
            }"#,
        );

        assert_eq!(
            manifest.autoload_paths(AutoloadGroup::Runtime),
            ["src/", "lib/", "bootstrap.php"]
        );
        assert!(manifest.autoload_paths(AutoloadGroup::Development).is_empty());
        assert_eq!(manifest.classmap_exclusions(), ["src/Legacy"]);
    }

    #[test]
    fn test_root_mapped_autoload_path() {
        let manifest = parse(
            r#"{
                "autoload": {"psr-4": {"Acme\\Lib\\": ""}, "exclude-from-classmap": ["/Tests/", "**/Fixtures/"]},
                "autoload-dev": {"psr-4": {"Acme\\Lib\\Tests\\": "Tests/"}}
            }"#,
        );

        assert_eq!(manifest.autoload_paths(AutoloadGroup::Runtime), ["."]);
        assert_eq!(manifest.autoload_paths(AutoloadGroup::Development), ["Tests/"]);
        assert_eq!(manifest.classmap_exclusions(), ["Tests", "**/Fixtures"]);
        assert!(!manifest.uses_non_standard_autoload());
    }

    #[test]
    fn test_set_empty_section_removes_key() {
        let mut manifest = parse(APP_MANIFEST);
        manifest.set_dependency_section(DependencyKind::Development, &DependencySection::new());

        let text = manifest.serialize().unwrap();
        assert!(!text.contains("require-dev"));
        assert!(text.contains("\"autoload-dev\""));
    }

    #[test]
    fn test_new_dev_section_lands_after_require() {
        let mut manifest = parse(
            r#"{
    "name": "acme/app",
    "require": {
        "vendor/logger": "^2.0"
    },
    "autoload": {}
}
"#,
        );

        let section: DependencySection =
            [Dependency::new("vendor/debugbar", "dev-master")].into_iter().collect();
        manifest.set_dependency_section(DependencyKind::Development, &section);

        assert_eq!(
            manifest.serialize().unwrap(),
            r#"{
    "name": "acme/app",
    "require": {
        "vendor/logger": "^2.0"
    },
    "require-dev": {
        "vendor/debugbar": "dev-master"
    },
    "autoload": {}
}
"#
        );
    }

    #[test]
    fn test_new_primary_section_lands_before_require_dev() {
        let mut manifest = parse(r#"{"name": "acme/app", "require-dev": {"a/a": "^1.0"}}"#);

        let section: DependencySection =
            [Dependency::new("b/b", "^2.0")].into_iter().collect();
        manifest.set_dependency_section(DependencyKind::Primary, &section);

        let text = manifest.serialize().unwrap();
        let require = text.find("\"require\"").unwrap();
        let require_dev = text.find("\"require-dev\"").unwrap();
        assert!(require < require_dev);
    }
}
