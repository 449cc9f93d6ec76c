//! The XML checksum document.
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8" ?>
//! <checksum_list>
//!     <ps_root_dir version="1.7.0">
//!         <dir name="app">
//!             <md5file name="a.php">...</md5file>
//!         </dir>
//!     </ps_root_dir>
//! </checksum_list>
//! ```

use crate::checksum::ChecksumEntry;
use relpack_common::{Error, Result};
use relpack_tree::Node;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

/// Element wrapping the root directory's entries.
pub const DEFAULT_ROOT_LABEL: &str = "ps_root_dir";

/// A checksum manifest for one release version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumManifest {
    root_label: String,
    version: String,
    root: ChecksumEntry,
}

impl ChecksumManifest {
    /// Hash the (already filtered) tree.
    #[instrument(skip_all, fields(root = %tree.path().display(), version = version))]
    pub fn generate(tree: &Node, root_label: &str, version: &str) -> Result<Self> {
        validate_root_label(root_label)?;
        let start = Instant::now();
        let root = ChecksumEntry::from_node(tree)?;
        info!(
            files = root.file_count(),
            duration_ms = start.elapsed().as_millis(),
            "Checksums computed"
        );

        Ok(Self {
            root_label: root_label.to_string(),
            version: version.to_string(),
            root,
        })
    }

    pub fn root(&self) -> &ChecksumEntry {
        &self.root
    }

    /// Render the document. Output depends only on the tree and version.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n");
        out.push_str("<checksum_list>\n");
        let _ = writeln!(
            out,
            "\t<{} version=\"{}\">",
            self.root_label,
            escape(&self.version)
        );
        for child in self.root.children() {
            render_entry(child, 2, &mut out);
        }
        let _ = writeln!(out, "\t</{}>", self.root_label);
        out.push_str("</checksum_list>\n");
        out
    }

    /// Persist the rendered document to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()).map_err(|source| Error::ManifestWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Checksum manifest written");
        Ok(())
    }
}

/// Check that `label` can be written verbatim as an XML element name.
///
/// Accepts ASCII letters, digits, `_` and `-`, starting with a letter or `_`.
pub fn validate_root_label(label: &str) -> Result<()> {
    let mut chars = label.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "root label '{}' is not a valid element name",
            label
        )))
    }
}

/// Render one entry, indented by `depth` tabs, children one tab deeper.
pub fn render_entry(entry: &ChecksumEntry, depth: usize, out: &mut String) {
    let indent = "\t".repeat(depth);
    match entry {
        ChecksumEntry::File { name, hash } => {
            let _ = writeln!(out, "{indent}<md5file name=\"{}\">{hash}</md5file>", escape(name));
        }
        ChecksumEntry::Dir { name, children } => {
            let _ = writeln!(out, "{indent}<dir name=\"{}\">", escape(name));
            for child in children {
                render_entry(child, depth + 1, out);
            }
            let _ = writeln!(out, "{indent}</dir>");
        }
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
