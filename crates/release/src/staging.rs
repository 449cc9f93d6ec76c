//! The disposable staging copy of a project.

use regex::Regex;
use relpack_common::{Error, Result, Timestamp};
use relpack_tree::ensure_contained;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Files folded into the generated `LICENSES` file.
static LICENSE_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)license(\.txt)?$").unwrap());

/// Name of the concatenated license file at the staging root.
pub const LICENSES_FILE_NAME: &str = "LICENSES";

/// A uniquely named staging area: `<base>/<package_name>`.
///
/// `base` also holds build by-products (archives) so that they never end up
/// inside the tree being packaged.
#[derive(Debug)]
pub struct Staging {
    base: PathBuf,
    root: PathBuf,
}

impl Staging {
    /// Create `relpack-<version>-<stamp>-<id>/<package_name>` under `temp_dir`.
    pub fn create(
        temp_dir: &Path,
        package_name: &str,
        version: &str,
        stamp: &Timestamp,
    ) -> Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let base = temp_dir.join(format!(
            "relpack-{}-{}-{}",
            version,
            stamp.to_release_stamp(),
            &id[..8]
        ));
        let root = base.join(package_name);
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::Staging(format!("cannot create {}: {}", root.display(), e)))?;

        // Resolve symlinked temp dirs so tree paths and the trusted root agree.
        let base = base.canonicalize()?;
        let root = base.join(package_name);
        info!(root = %root.display(), "Staging directory created");
        Ok(Self { base, root })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove the whole staging area.
    pub fn cleanup(self) -> Result<()> {
        ensure_contained(&self.root, &self.base)?;
        if self.base.exists() {
            std::fs::remove_dir_all(&self.base)?;
        }
        debug!(base = %self.base.display(), "Staging directory removed");
        Ok(())
    }
}

/// Copy `src` into `dst`, skipping symbolic links and the `exclude` paths.
///
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[PathBuf]) -> Result<u64> {
    let mut files = 0;
    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !exclude.iter().any(|x| e.path() == x));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Staging(format!("walk failed: {}", e)))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Staging(e.to_string()))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            warn!(path = %entry.path().display(), "Not copying symbolic link");
        } else if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }

    Ok(files)
}

/// Create the required folders and apply the configured renames.
pub fn apply_layout(
    root: &Path,
    ensure_dirs: &[PathBuf],
    renames: &BTreeMap<String, String>,
) -> Result<()> {
    for dir in ensure_dirs {
        std::fs::create_dir_all(root.join(dir))?;
    }

    for (from, to) in renames {
        let source = root.join(from);
        if !source.exists() {
            return Err(Error::Staging(format!(
                "cannot rename {} to {}: {} does not exist",
                from,
                to,
                source.display()
            )));
        }
        std::fs::rename(&source, root.join(to))?;
        debug!(from, to, "Renamed");
    }

    Ok(())
}

/// Concatenate every license file under `root` into `root/LICENSES`.
///
/// Files are joined byte for byte, whatever their encoding. Returns `None`
/// when the project has no license files.
pub fn write_licenses(root: &Path) -> Result<Option<PathBuf>> {
    let mut content: Vec<u8> = Vec::new();
    let mut found = 0;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Staging(format!("walk failed: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if LICENSE_FILE_PATTERN.is_match(&name) {
            content.extend_from_slice(&std::fs::read(entry.path())?);
            content.extend_from_slice(b"\r\n\r\n");
            found += 1;
        }
    }

    if found == 0 {
        info!("No license files found, skipping LICENSES");
        return Ok(None);
    }

    let path = root.join(LICENSES_FILE_NAME);
    std::fs::write(&path, content)?;
    info!(files = found, "LICENSES file generated");
    Ok(Some(path))
}

/// Move a file or directory, falling back to copy + delete across devices.
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "Rename crosses devices, copying");
        }
        Err(e) => {
            return Err(Error::Staging(format!(
                "cannot move {} to {}: {}",
                from.display(),
                to.display(),
                e
            )))
        }
    }

    if from.is_dir() {
        copy_tree(from, to, &[])?;
        std::fs::remove_dir_all(from)?;
    } else {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

/// Total size in bytes of the files under `path` (or of `path` itself).
pub fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_staging_is_unique_and_removable() {
        let tmp = tempdir().unwrap();
        let stamp = Timestamp::now();
        let a = Staging::create(tmp.path(), "shop", "1.0.0", &stamp).unwrap();
        let b = Staging::create(tmp.path(), "shop", "1.0.0", &stamp).unwrap();

        assert_ne!(a.base(), b.base());
        assert!(a.root().ends_with("shop"));
        assert!(a.root().is_dir());

        let base = a.base().to_path_buf();
        a.cleanup().unwrap();
        assert!(!base.exists());
        assert!(b.root().is_dir());
    }

    #[test]
    fn test_copy_tree_skips_excluded() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir_all(src.path().join("lib/sub")).unwrap();
        fs::create_dir_all(src.path().join("releases/old")).unwrap();
        fs::write(src.path().join("lib/sub/a.php"), "a").unwrap();
        fs::write(src.path().join(".env"), "x").unwrap();
        fs::write(src.path().join("releases/old/x.tar.gz"), "x").unwrap();

        let copied = copy_tree(
            src.path(),
            dst.path(),
            &[src.path().join("releases")],
        )
        .unwrap();

        assert_eq!(copied, 2);
        assert!(dst.path().join("lib/sub/a.php").is_file());
        assert!(dst.path().join(".env").is_file());
        assert!(!dst.path().join("releases").exists());
    }

    #[test]
    fn test_apply_layout() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("admin-dev")).unwrap();

        let mut renames = BTreeMap::new();
        renames.insert("admin-dev".to_string(), "admin".to_string());
        apply_layout(root.path(), &[PathBuf::from("app/cache")], &renames).unwrap();

        assert!(root.path().join("app/cache").is_dir());
        assert!(root.path().join("admin").is_dir());
        assert!(!root.path().join("admin-dev").exists());
    }

    #[test]
    fn test_missing_rename_source_fails() {
        let root = tempdir().unwrap();
        let mut renames = BTreeMap::new();
        renames.insert("install-dev".to_string(), "install".to_string());

        let err = apply_layout(root.path(), &[], &renames).unwrap_err();
        assert!(matches!(err, Error::Staging(_)));
    }

    #[test]
    fn test_write_licenses_concatenates_sorted() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("vendor")).unwrap();
        fs::write(root.path().join("LICENSE.txt"), "root").unwrap();
        fs::write(root.path().join("vendor/License"), "vendor").unwrap();
        fs::write(root.path().join("README"), "no").unwrap();

        let path = write_licenses(root.path()).unwrap().unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "root\r\n\r\nvendor\r\n\r\n"
        );
    }

    #[test]
    fn test_write_licenses_keeps_raw_bytes() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("LICENSE"), b"Copyright \xA9 2024 Acme").unwrap();

        let path = write_licenses(root.path()).unwrap().unwrap();
        assert_eq!(fs::read(path).unwrap(), b"Copyright \xA9 2024 Acme\r\n\r\n");
    }

    #[test]
    fn test_write_licenses_without_any() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("index.php"), "x").unwrap();
        assert!(write_licenses(root.path()).unwrap().is_none());
        assert!(!root.path().join(LICENSES_FILE_NAME).exists());
    }

    #[test]
    fn test_move_path_and_disk_usage() {
        let tmp = tempdir().unwrap();
        let from = tmp.path().join("a");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("f1"), "12345").unwrap();
        fs::write(from.join("f2"), "123").unwrap();

        let to = tmp.path().join("b");
        move_path(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(disk_usage(&to), 8);
    }

    #[test]
    fn test_move_path_reports_rename_error() {
        let tmp = tempdir().unwrap();
        let from = tmp.path().join("shop_1.0.0.xml");
        fs::write(&from, "<checksum_list />").unwrap();

        let err = move_path(&from, &tmp.path().join("missing/shop_1.0.0.xml")).unwrap_err();
        assert!(matches!(err, Error::Staging(_)));
        assert!(from.is_file());
    }
}
