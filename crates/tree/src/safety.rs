//! Path-safety guard for destructive operations.
//!
//! Nothing is ever deleted unless it lies inside the disposable staging copy.

use crate::node::Node;
use relpack_common::{Error, Result};
use std::path::{Component, Path};

/// Fail with `UnsafeDeletionTarget` unless `path` lies under `trusted_root`.
///
/// The comparison is component-wise, so `/tmp/stage-1` is not inside
/// `/tmp/stage`. Paths carrying `..` components are rejected outright, and so
/// is a trusted root that is not an absolute path below the filesystem root.
pub fn ensure_contained(path: &Path, trusted_root: &Path) -> Result<()> {
    let unsafe_target = || Error::UnsafeDeletionTarget {
        path: path.to_path_buf(),
        trusted_root: trusted_root.to_path_buf(),
    };

    let root_depth = trusted_root
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    if !trusted_root.is_absolute() || root_depth == 0 {
        return Err(unsafe_target());
    }

    let escapes = |p: &Path| p.components().any(|c| matches!(c, Component::ParentDir));
    if escapes(path) || escapes(trusted_root) {
        return Err(unsafe_target());
    }

    if !path.starts_with(trusted_root) {
        return Err(unsafe_target());
    }

    Ok(())
}

/// Check every node of `tree` before any deletion happens.
pub fn ensure_tree_contained(tree: &Node, trusted_root: &Path) -> Result<()> {
    tree.descendants()
        .into_iter()
        .try_for_each(|node| ensure_contained(node.path(), trusted_root))
}
