//! Reference removal rules for release packaging.
//!
//! These cover VCS metadata, test suites, front-end build tooling, caches,
//! documentation and environment-specific configuration that must never be
//! shipped.

use crate::ruleset::{Pattern, RemovalRuleSet};
use std::sync::LazyLock;

/// File names removed when they sit directly under the staging root.
pub const REFERENCE_EXACT_FILES: &[&str] = &[".DS_Store", ".gitignore", ".gitmodules", ".travis.yml"];

/// Folder paths (relative to the staging root) removed wholesale.
pub const REFERENCE_EXACT_FOLDERS: &[&str] = &[];

/// Patterns matched against the root-anchored path, with an optional exception.
///
/// The exception stands in for look-behind, which `regex` does not support:
/// `package.json` is removed everywhere except under `_dev/` folders.
pub const REFERENCE_PATTERNS: &[(&str, Option<&str>)] = &[
    ("tests$", None),
    ("tools/contrib$", None),
    (r"travis-scripts$", None),
    (r"CONTRIBUTING\.md$", None),
    (r"composer\.json$", None),
    (r"diff-hooks\.php", None),
    (r"package\.json$", Some(r"_dev/package\.json$")),
    (r"(.*)?\.composer$", None),
    (r"(.*)?\.git(.*)?$", None),
    (r".*\.map$", None),
    (r".*\.psd$", None),
    (r".*\.md$", None),
    (r".*\.rst$", None),
    (r".*phpunit(.*)?", None),
    (r"(.*)?\.travis\.", None),
    (r".*\.DS_Store$", None),
    (r".*\.eslintrc$", None),
    (r".*\.editorconfig$", None),
    (r"web/.*$", None),
    (r"app/config/parameters\.yml$", None),
    (r"app/config/parameters\.php$", None),
    (r"config/settings\.inc\.php$", None),
    (r"app/cache/..*$", None),
    (r"\.t9n\.yml$", None),
    (r"\.scrutinizer\.yml$", None),
    (r"admin-dev/(.*/)?webpack\.config\.js$", None),
    (r"admin-dev/(.*/)?package\.json$", None),
    (r"admin-dev/(.*/)?bower\.json$", None),
    (r"admin-dev/(.*/)?config\.rb$", None),
    (r"admin-dev/themes/default/sass$", None),
    (r"admin-dev/themes/new-theme/js$", None),
    (r"admin-dev/themes/new-theme/scss$", None),
    (r"themes/_core$", None),
    (r"themes/webpack\.config\.js$", None),
    (r"themes/package\.json$", None),
    (r"vendor/[a-zA-Z0-9_-]+/[a-zA-Z0-9_-]+/[Tt]ests?$", None),
    (r"vendor/tecnickcom/tcpdf/examples$", None),
    (r".idea", None),
    (r"tools/build$", None),
    (r".*node_modules.*", None),
];

/// Compiled reference rule set.
pub static REFERENCE_RULES: LazyLock<RemovalRuleSet> = LazyLock::new(|| {
    let patterns = REFERENCE_PATTERNS
        .iter()
        .map(|(pattern, unless)| Pattern::new(pattern, *unless).unwrap())
        .collect();

    RemovalRuleSet::new(
        REFERENCE_EXACT_FILES.iter().map(|s| s.to_string()),
        REFERENCE_EXACT_FOLDERS.iter().map(|s| s.to_string()),
        patterns,
    )
});
