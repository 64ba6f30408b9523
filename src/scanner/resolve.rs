//! Name resolution.
//!
//! Turns the raw names of a [`SyntaxTree`] into fully qualified names,
//! applying the namespace in effect and the import aliases declared in it.

use std::collections::HashMap;

use super::parser::{Node, ReferenceKind, SyntaxTree};

/// Receives each resolved reference.
pub trait ReferenceVisitor {
    fn visit_class(&mut self, name: &str);
    fn visit_function(&mut self, name: &str);
    fn visit_constant(&mut self, name: &str);

    fn visit(&mut self, kind: ReferenceKind, name: &str) {
        match kind {
            ReferenceKind::Class => self.visit_class(name),
            ReferenceKind::Function => self.visit_function(name),
            ReferenceKind::Constant => self.visit_constant(name),
        }
    }
}

/// Resolution state for one file.
///
/// Class and function aliases are case-insensitive, constant aliases are
/// not. Every namespace declaration starts a fresh alias table.
#[derive(Debug, Default)]
pub struct NameResolver {
    namespace: Option<String>,
    classes: HashMap<String, String>,
    functions: HashMap<String, String>,
    constants: HashMap<String, String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every reference in `tree`, in order.
    pub fn walk(&mut self, tree: &SyntaxTree, visitor: &mut impl ReferenceVisitor) {
        for node in &tree.nodes {
            match node {
                Node::Namespace { name, .. } => self.enter_namespace(name.clone()),
                Node::Use(imports) => {
                    for import in imports {
                        self.import(import.kind, &import.name, &import.alias);
                    }
                }
                Node::Reference(reference) => {
                    if let Some(name) = self.resolve(reference.kind, &reference.name) {
                        visitor.visit(reference.kind, &name);
                    }
                }
            }
        }
    }

    pub fn enter_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self.classes.clear();
        self.functions.clear();
        self.constants.clear();
    }

    pub fn import(&mut self, kind: ReferenceKind, name: &str, alias: &str) {
        let name = name.trim_start_matches('\\').to_string();
        match kind {
            ReferenceKind::Class => self.classes.insert(alias.to_ascii_lowercase(), name),
            ReferenceKind::Function => self.functions.insert(alias.to_ascii_lowercase(), name),
            ReferenceKind::Constant => self.constants.insert(alias.to_string(), name),
        };
    }

    /// Fully qualified form of `name`, or `None` for an unqualified constant
    /// that was not imported. Those fall back to the global constant at
    /// runtime and never name a package symbol.
    pub fn resolve(&self, kind: ReferenceKind, name: &str) -> Option<String> {
        if let Some(absolute) = name.strip_prefix('\\') {
            return Some(absolute.to_string());
        }

        if let Some(relative) = strip_prefix_ignore_case(name, "namespace\\") {
            return Some(self.qualify(relative));
        }

        if let Some((first, rest)) = name.split_once('\\') {
            return Some(match self.classes.get(&first.to_ascii_lowercase()) {
                Some(target) => format!("{}\\{}", target, rest),
                None => self.qualify(name),
            });
        }

        match kind {
            ReferenceKind::Class => Some(
                self.classes
                    .get(&name.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_else(|| self.qualify(name)),
            ),
            ReferenceKind::Function => Some(
                self.functions
                    .get(&name.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_else(|| self.qualify(name)),
            ),
            ReferenceKind::Constant => self.constants.get(name).cloned(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}\\{}", ns, name),
            None => name.to_string(),
        }
    }
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &name[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::parser::{PhpParser, SourceParser};

    #[derive(Default)]
    struct Collect(Vec<(ReferenceKind, String)>);

    impl ReferenceVisitor for Collect {
        fn visit_class(&mut self, name: &str) {
            self.0.push((ReferenceKind::Class, name.to_string()));
        }

        fn visit_function(&mut self, name: &str) {
            self.0.push((ReferenceKind::Function, name.to_string()));
        }

        fn visit_constant(&mut self, name: &str) {
            self.0.push((ReferenceKind::Constant, name.to_string()));
        }
    }

    fn resolve(src: &str) -> Vec<(ReferenceKind, String)> {
        let tree = PhpParser::new().parse(src).unwrap();
        let mut collect = Collect::default();
        NameResolver::new().walk(&tree, &mut collect);
        collect.0
    }

    fn names(src: &str) -> Vec<String> {
        resolve(src).into_iter().map(|(_, n)| n).collect()
    }

    #[test]
    fn test_aliases_and_namespace() {
        let src = r#"<?php
namespace Acme\App;

use Vendor\Logger\Writer as LogWriter;
use Vendor\Http;
use function Vendor\Util\helper;
use const Vendor\Util\VERSION;

new LogWriter();
new logwriter();
Http\Client::send();
helper();
echo VERSION, OTHER;
new Local();
\Absolute\Name::x();
namespace\Sub\thing();
"#;
        assert_eq!(
            names(src),
            [
                "Vendor\\Logger\\Writer",
                "Vendor\\Logger\\Writer",
                "Vendor\\Http\\Client",
                "Vendor\\Util\\helper",
                "Vendor\\Util\\VERSION",
                "Acme\\App\\Local",
                "Absolute\\Name",
                "Acme\\App\\Sub\\thing",
            ]
        );
    }

    #[test]
    fn test_constant_aliases_are_case_sensitive() {
        let src = "<?php use const Vendor\\LEVEL; echo LEVEL, level;";
        assert_eq!(names(src), ["Vendor\\LEVEL"]);
    }

    #[test]
    fn test_global_namespace() {
        let src = "<?php new Foo(); bar(); Baz\\qux();";
        assert_eq!(names(src), ["Foo", "bar", "Baz\\qux"]);
    }

    #[test]
    fn test_namespace_resets_aliases() {
        let src = "<?php namespace A; use Vendor\\X; new X(); namespace B; new X();";
        assert_eq!(names(src), ["Vendor\\X", "B\\X"]);
    }

    #[test]
    fn test_kinds_are_reported() {
        let src = "<?php use Vendor\\Pkg; Pkg\\run(); echo \\Vendor\\Pkg\\FLAG;";
        assert_eq!(
            resolve(src),
            [
                (ReferenceKind::Function, "Vendor\\Pkg\\run".to_string()),
                (ReferenceKind::Constant, "Vendor\\Pkg\\FLAG".to_string()),
            ]
        );
    }
}
