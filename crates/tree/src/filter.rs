//! Rule-driven pruning of a staged tree, on disk and in memory.

use crate::node::Node;
use crate::safety::{ensure_contained, ensure_tree_contained};
use relpack_common::{Error, Result};
use relpack_rules::{MatchedRule, PathClassifier};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// An entry removed from the staged tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub path: PathBuf,
    pub rule: String,
    pub is_dir: bool,
}

/// An entry classified for removal that could not be deleted.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub rule: String,
    pub error: String,
}

/// Outcome of a filter pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    pub removed: Vec<Removal>,
    pub failures: Vec<DeletionFailure>,
    pub kept_files: usize,
    pub kept_dirs: usize,
}

impl FilterReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Prunes development-only entries from a staged tree.
///
/// Matched entries are deleted from disk and dropped from their parent's
/// children; surviving directories are recursed into and kept even when they
/// end up empty.
pub struct TreeFilter<'a> {
    classifier: &'a PathClassifier<'a>,
    trusted_root: &'a Path,
    strict: bool,
}

impl<'a> TreeFilter<'a> {
    pub fn new(classifier: &'a PathClassifier<'a>, trusted_root: &'a Path) -> Self {
        Self {
            classifier,
            trusted_root,
            strict: false,
        }
    }

    /// Abort on the first deletion failure instead of reporting it.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Filter `tree` in place.
    ///
    /// The whole tree is checked against the trusted root before anything is
    /// deleted; a single foreign path aborts with `UnsafeDeletionTarget`.
    #[instrument(skip_all, fields(root = %tree.path().display()))]
    pub fn filter(&self, tree: &mut Node) -> Result<FilterReport> {
        let start = Instant::now();
        ensure_tree_contained(tree, self.trusted_root)?;

        let mut report = FilterReport::default();
        match tree {
            Node::Dir { children, .. } => self.filter_children(children, &mut report)?,
            Node::File { .. } => report.kept_files += 1,
        }

        info!(
            removed = report.removed.len(),
            failures = report.failures.len(),
            kept_files = report.kept_files,
            kept_dirs = report.kept_dirs,
            duration_ms = start.elapsed().as_millis(),
            "Tree filtered"
        );
        Ok(report)
    }

    fn filter_children(&self, children: &mut Vec<Node>, report: &mut FilterReport) -> Result<()> {
        let mut kept = Vec::with_capacity(children.len());

        for mut child in children.drain(..) {
            match self.classifier.classify(child.path(), child.is_dir()) {
                Some(rule) => self.remove(&child, &rule, report)?,
                None => {
                    match &mut child {
                        Node::Dir { children, .. } => {
                            self.filter_children(children, report)?;
                            report.kept_dirs += 1;
                        }
                        Node::File { .. } => report.kept_files += 1,
                    }
                    kept.push(child);
                }
            }
        }

        *children = kept;
        Ok(())
    }

    fn remove(&self, node: &Node, rule: &MatchedRule, report: &mut FilterReport) -> Result<()> {
        let path = node.path();
        ensure_contained(path, self.trusted_root)?;

        let result = if node.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };

        match result {
            Ok(()) => debug!(path = %path.display(), %rule, "Removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), %rule, "Already gone")
            }
            Err(source) if self.strict => {
                return Err(Error::RuleMismatchIo {
                    path: path.to_path_buf(),
                    rule: rule.to_string(),
                    source,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), %rule, error = %e, "Failed to delete");
                report.failures.push(DeletionFailure {
                    path: path.to_path_buf(),
                    rule: rule.to_string(),
                    error: e.to_string(),
                });
                return Ok(());
            }
        }

        report.removed.push(Removal {
            path: path.to_path_buf(),
            rule: rule.to_string(),
            is_dir: node.is_dir(),
        });
        Ok(())
    }
}

/// What a filter pass would remove, without touching the disk.
///
/// Matched directories are reported once; their contents are not visited.
pub fn plan_removals(tree: &Node, classifier: &PathClassifier<'_>) -> Vec<Removal> {
    let mut planned = Vec::new();
    let mut stack: Vec<&Node> = tree.children().iter().rev().collect();

    while let Some(node) = stack.pop() {
        match classifier.classify(node.path(), node.is_dir()) {
            Some(rule) => planned.push(Removal {
                path: node.path().to_path_buf(),
                rule: rule.to_string(),
                is_dir: node.is_dir(),
            }),
            None => stack.extend(node.children().iter().rev()),
        }
    }

    planned
}
