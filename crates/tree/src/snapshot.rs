//! Snapshot of a directory tree at a point in time.

use crate::node::Node;
use relpack_common::{Error, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Build a sorted in-memory tree of `root`.
///
/// Directories are resolved depth-first; each directory's children are sorted
/// by path once collected, so the result does not depend on the order the
/// filesystem lists entries in. Symbolic links are left out. Dot-files are
/// kept so that removal rules can see them.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn build(root: &Path) -> Result<Node> {
    let start = Instant::now();

    let root = std::path::absolute(root).map_err(|_| Error::InvalidRoot {
        path: root.to_path_buf(),
    })?;
    match std::fs::metadata(&root) {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(Error::InvalidRoot { path: root }),
    }

    let tree = build_dir(&root)?;

    let (files, dirs) = tree.counts();
    info!(
        files,
        dirs,
        duration_ms = start.elapsed().as_millis(),
        "Snapshot built"
    );
    Ok(tree)
}

fn build_dir(dir: &Path) -> Result<Node> {
    let mut children = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            warn!(path = %path.display(), "Skipping symbolic link");
            continue;
        }

        if file_type.is_dir() {
            children.push(build_dir(&path)?);
        } else if file_type.is_file() {
            children.push(Node::File { path });
        } else {
            debug!(path = %path.display(), "Skipping special file");
        }
    }

    children.sort_by(|a, b| a.path().cmp(b.path()));

    Ok(Node::Dir {
        path: dir.to_path_buf(),
        children,
    })
}
