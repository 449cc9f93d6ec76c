//! Removal rule sets and their serialized form.

use crate::patterns::REFERENCE_RULES;
use regex::Regex;
use relpack_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// A removal pattern with an optional exception.
///
/// A path matches when `regex` matches it and `unless` (if any) does not.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    unless: Option<Regex>,
}

impl Pattern {
    /// Compile a pattern and its optional exception.
    pub fn new(pattern: &str, unless: Option<&str>) -> Result<Self> {
        let regex = compile(pattern)?;
        let unless = unless.map(compile).transpose()?;
        Ok(Self { regex, unless })
    }

    /// Check the pattern against a `/`-separated path.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path) && !self.unless.as_ref().is_some_and(|u| u.is_match(path))
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The exception source, if any.
    pub fn unless(&self) -> Option<&str> {
        self.unless.as_ref().map(Regex::as_str)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Exact-file, exact-folder and pattern criteria for stripping a release.
///
/// Passed explicitly to the classifier; there is no process-wide rule list.
#[derive(Debug, Clone, Default)]
pub struct RemovalRuleSet {
    exact_files: BTreeSet<String>,
    exact_folders: BTreeSet<String>,
    patterns: Vec<Pattern>,
}

impl RemovalRuleSet {
    pub fn new(
        exact_files: impl IntoIterator<Item = String>,
        exact_folders: impl IntoIterator<Item = String>,
        patterns: Vec<Pattern>,
    ) -> Self {
        Self {
            exact_files: exact_files.into_iter().collect(),
            exact_folders: exact_folders.into_iter().collect(),
            patterns,
        }
    }

    /// The built-in reference rules.
    pub fn reference() -> Self {
        REFERENCE_RULES.clone()
    }

    pub fn exact_files(&self) -> &BTreeSet<String> {
        &self.exact_files
    }

    pub fn exact_folders(&self) -> &BTreeSet<String> {
        &self.exact_folders
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Append another rule set's criteria. Patterns keep their relative order.
    pub fn extend(&mut self, other: RemovalRuleSet) {
        self.exact_files.extend(other.exact_files);
        self.exact_folders.extend(other.exact_folders);
        self.patterns.extend(other.patterns);
    }

    /// Build a rule set from its serialized form.
    pub fn from_spec(spec: &RuleSpec) -> Result<Self> {
        let mut rules = if spec.extends_reference {
            Self::reference()
        } else {
            Self::default()
        };

        let patterns = spec
            .patterns
            .iter()
            .map(|p| match p {
                PatternSpec::Plain(pattern) => Pattern::new(pattern, None),
                PatternSpec::WithException { pattern, unless } => {
                    Pattern::new(pattern, unless.as_deref())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        rules.extend(Self::new(
            spec.exact_files.iter().cloned(),
            spec.exact_folders.iter().cloned(),
            patterns,
        ));

        Ok(rules)
    }

    /// Serialized form of the effective rules (reference rules inlined).
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            extends_reference: false,
            exact_files: self.exact_files.iter().cloned().collect(),
            exact_folders: self.exact_folders.iter().cloned().collect(),
            patterns: self
                .patterns
                .iter()
                .map(|p| match p.unless() {
                    None => PatternSpec::Plain(p.as_str().to_string()),
                    Some(unless) => PatternSpec::WithException {
                        pattern: p.as_str().to_string(),
                        unless: Some(unless.to_string()),
                    },
                })
                .collect(),
        }
    }

    /// Load rules from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let spec: RuleSpec = serde_yaml::from_str(&content)?;
        Self::from_spec(&spec)
    }
}

/// Serialized rule set, as found in `relpack.yaml` or a standalone rules file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Start from the built-in reference rules.
    #[serde(default = "default_true")]
    pub extends_reference: bool,
    #[serde(default)]
    pub exact_files: Vec<String>,
    #[serde(default)]
    pub exact_folders: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self {
            extends_reference: true,
            exact_files: Vec::new(),
            exact_folders: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A pattern entry: either a bare regex or a regex with an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Plain(String),
    WithException {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unless: Option<String>,
    },
}
