//! Removal rules for relpack releases.
//!
//! This crate decides which files and folders of a staged project are
//! development-only and must not ship in a release.

pub mod classifier;
pub mod patterns;
pub mod ruleset;

pub use classifier::{MatchedRule, PathClassifier};
pub use ruleset::{Pattern, PatternSpec, RemovalRuleSet, RuleSpec};

/// Render a path the way removal patterns expect to see it.
///
/// Patterns are written with `/` separators regardless of platform.
pub fn path_key(path: &std::path::Path) -> String {
    let key = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        key.into_owned()
    } else {
        key.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
