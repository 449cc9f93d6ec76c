//! In-memory representation of a staged directory tree.

use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// A file or directory of the staged tree.
///
/// Directory children are kept sorted by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    File { path: PathBuf },
    Dir { path: PathBuf, children: Vec<Node> },
}

impl Node {
    pub fn path(&self) -> &Path {
        match self {
            Node::File { path } | Node::Dir { path, .. } => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir { .. })
    }

    /// Basename of the node's path.
    pub fn name(&self) -> Cow<'_, str> {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| self.path().to_string_lossy())
    }

    /// Children of a directory; empty for files.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Dir { children, .. } => children,
            Node::File { .. } => &[],
        }
    }

    /// All nodes in pre-order, including `self`.
    pub fn descendants(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children().iter().rev());
        }
        out
    }

    /// Number of files and directories below `self` (excluding `self`).
    pub fn counts(&self) -> (usize, usize) {
        self.descendants()
            .into_iter()
            .skip(1)
            .fold((0, 0), |(files, dirs), n| {
                if n.is_dir() {
                    (files, dirs + 1)
                } else {
                    (files + 1, dirs)
                }
            })
    }
}
