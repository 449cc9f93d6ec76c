//! Path classification against a removal rule set.

use crate::path_key;
use crate::ruleset::RemovalRuleSet;
use std::fmt;
use std::path::Path;
use tracing::trace;

/// The rule that caused a path to be classified for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedRule {
    ExactFile(String),
    ExactFolder(String),
    Pattern(String),
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedRule::ExactFile(name) => write!(f, "file:{}", name),
            MatchedRule::ExactFolder(name) => write!(f, "folder:{}", name),
            MatchedRule::Pattern(pattern) => write!(f, "pattern:{}", pattern),
        }
    }
}

/// Decides whether a staged path is development-only.
///
/// Exact entries are resolved against `root`. Patterns see the path as if
/// `root` were the filesystem root (`/app/cache/prod`), so the location of the
/// staging directory can never match a rule.
pub struct PathClassifier<'a> {
    rules: &'a RemovalRuleSet,
    root: &'a Path,
}

impl<'a> PathClassifier<'a> {
    pub fn new(rules: &'a RemovalRuleSet, root: &'a Path) -> Self {
        Self { rules, root }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    /// Whether `path` must be removed.
    pub fn should_remove(&self, path: &Path, is_dir: bool) -> bool {
        self.classify(path, is_dir).is_some()
    }

    /// The first rule matching `path`, if any.
    ///
    /// Exact entries are checked before patterns; which rule wins never
    /// changes the outcome, only what gets reported.
    pub fn classify(&self, path: &Path, is_dir: bool) -> Option<MatchedRule> {
        let exact = if is_dir {
            self.rules.exact_folders()
        } else {
            self.rules.exact_files()
        };

        if let Some(entry) = exact.iter().find(|e| self.root.join(e) == path) {
            return Some(if is_dir {
                MatchedRule::ExactFolder(entry.clone())
            } else {
                MatchedRule::ExactFile(entry.clone())
            });
        }

        let key = self.pattern_key(path);
        let matched = self
            .rules
            .patterns()
            .iter()
            .find(|p| p.is_match(&key))
            .map(|p| MatchedRule::Pattern(p.as_str().to_string()));

        if let Some(ref rule) = matched {
            trace!(path = %key, %rule, "Classified for removal");
        }

        matched
    }

    fn pattern_key(&self, path: &Path) -> String {
        match path.strip_prefix(self.root) {
            Ok(rel) => format!("/{}", path_key(rel)),
            Err(_) => path_key(path),
        }
    }
}
