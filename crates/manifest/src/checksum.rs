//! Checksum entries mirroring a filtered tree.

use relpack_common::{hash, Result};
use relpack_tree::Node;
use serde::Serialize;
use tracing::trace;

/// A manifest entry: a hashed file or a directory of entries.
///
/// Only basenames are recorded; nesting carries the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChecksumEntry {
    File { name: String, hash: String },
    Dir { name: String, children: Vec<ChecksumEntry> },
}

impl ChecksumEntry {
    /// Hash every file below `node`, keeping the node order.
    pub fn from_node(node: &Node) -> Result<Self> {
        let name = node.name().into_owned();
        match node {
            Node::File { path } => {
                let hash = hash::md5_file(path).map_err(|e| {
                    std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
                })?;
                trace!(path = %path.display(), %hash, "Hashed file");
                Ok(ChecksumEntry::File { name, hash })
            }
            Node::Dir { children, .. } => Ok(ChecksumEntry::Dir {
                name,
                children: children
                    .iter()
                    .map(ChecksumEntry::from_node)
                    .collect::<Result<Vec<_>>>()?,
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChecksumEntry::File { name, .. } | ChecksumEntry::Dir { name, .. } => name,
        }
    }

    pub fn children(&self) -> &[ChecksumEntry] {
        match self {
            ChecksumEntry::Dir { children, .. } => children,
            ChecksumEntry::File { .. } => &[],
        }
    }

    /// Number of file entries below (and including) `self`.
    pub fn file_count(&self) -> usize {
        match self {
            ChecksumEntry::File { .. } => 1,
            ChecksumEntry::Dir { children, .. } => children.iter().map(Self::file_count).sum(),
        }
    }
}
