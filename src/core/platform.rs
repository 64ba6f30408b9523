//! Platform requirements: names that stand for the interpreter, its
//! extensions, or runtime capabilities rather than installable packages.

use std::sync::LazyLock;

use regex::Regex;

/// The interpreter entry, sorted first in a dependency section.
pub const RUNTIME_PACKAGE: &str = "php";

/// Prefix shared by all extension requirements.
pub const EXTENSION_PREFIX: &str = "ext-";

static PLATFORM_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:php(?:-64bit|-ipv6|-zts|-debug)?|hhvm|(?:ext|lib)-[a-z0-9](?:[_.-]?[a-z0-9]+)*|composer(?:-(?:plugin|runtime)-api)?)$",
    )
    .expect("platform package pattern is valid")
});

static INTERPRETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:php(?:-64bit|-ipv6|-zts|-debug)?|hhvm)$")
        .expect("interpreter pattern is valid")
});

/// Whether `name` is the interpreter itself or one of its variants.
pub fn is_interpreter(name: &str) -> bool {
    INTERPRETER.is_match(name)
}

/// Whether `name` is a platform requirement.
pub fn is_platform_requirement(name: &str) -> bool {
    PLATFORM_PACKAGE.is_match(name)
}
