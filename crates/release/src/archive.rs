//! Gzip-compressed tar archives of the release tree.

use flate2::write::GzEncoder;
use flate2::Compression;
use relpack_common::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tar::Builder;
use tracing::info;
use walkdir::WalkDir;

/// Archive `source_dir` into `dest`, with every entry under `prefix/`.
///
/// Entries are added in sorted order so the same tree gives the same
/// entry list. Symbolic links are left out, as in the staging copy.
pub fn write_tree_archive(source_dir: &Path, prefix: &str, dest: &Path) -> Result<u64> {
    let file = File::create(dest)
        .map_err(|e| Error::Archive(format!("cannot create {}: {}", dest.display(), e)))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = Builder::new(encoder);
    archive.follow_symlinks(false);

    let mut files = 0;
    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Archive(format!("walk failed: {}", e)))?;
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| Error::Archive(e.to_string()))?;
        let name = Path::new(prefix).join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            archive
                .append_dir(&name, entry.path())
                .map_err(|e| archive_error(entry.path(), e))?;
        } else if file_type.is_file() {
            archive
                .append_path_with_name(entry.path(), &name)
                .map_err(|e| archive_error(entry.path(), e))?;
            files += 1;
        }
    }

    finish(archive, dest)?;
    info!(archive = %dest.display(), files, "Archive written");
    Ok(files)
}

/// Wrap an inner archive and the installer stub entry into `dest`.
///
/// Both are stored at the top level of the outer archive under their own
/// file names.
pub fn write_installer_archive(inner: &Path, stub_entry: &Path, dest: &Path) -> Result<()> {
    let file = File::create(dest)
        .map_err(|e| Error::Archive(format!("cannot create {}: {}", dest.display(), e)))?;
    let mut archive = Builder::new(GzEncoder::new(file, Compression::default()));

    for path in [inner, stub_entry] {
        let name = path
            .file_name()
            .ok_or_else(|| Error::Archive(format!("{} has no file name", path.display())))?;
        archive
            .append_path_with_name(path, name)
            .map_err(|e| archive_error(path, e))?;
    }

    finish(archive, dest)?;
    info!(archive = %dest.display(), "Installer archive written");
    Ok(())
}

fn finish<W: Write>(archive: Builder<GzEncoder<W>>, dest: &Path) -> Result<()> {
    let encoder = archive
        .into_inner()
        .map_err(|e| archive_error(dest, e))?;
    let mut writer = encoder.finish().map_err(|e| archive_error(dest, e))?;
    writer.flush().map_err(|e| archive_error(dest, e))?;
    Ok(())
}

fn archive_error(path: &Path, e: std::io::Error) -> Error {
    Error::Archive(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Read;
    use tar::Archive;
    use tempfile::tempdir;

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_tree_archive_layout() {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("app/cache")).unwrap();
        fs::write(src.path().join("index.php"), "<?php").unwrap();
        fs::write(src.path().join("app/config.yml"), "a: 1").unwrap();

        let out = tempdir().unwrap();
        let dest = out.path().join("shop.tar.gz");
        let files = write_tree_archive(src.path(), "shop", &dest).unwrap();

        assert_eq!(files, 2);
        assert_eq!(
            entry_names(&dest),
            vec![
                "shop",
                "shop/app",
                "shop/app/cache",
                "shop/app/config.yml",
                "shop/index.php",
            ]
        );
    }

    #[test]
    fn test_installer_archive_wraps_inner() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("shop.tar.gz");
        fs::write(&inner, b"inner-bytes").unwrap();
        let stub = dir.path().join("index.php");
        fs::write(&stub, "<?php // installer").unwrap();

        let dest = dir.path().join("shop_1.0.0.tar.gz");
        write_installer_archive(&inner, &stub, &dest).unwrap();

        let mut archive = Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let mut seen = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().to_string();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            seen.push((name, content));
        }

        assert_eq!(
            seen,
            vec![
                ("shop.tar.gz".to_string(), b"inner-bytes".to_vec()),
                ("index.php".to_string(), b"<?php // installer".to_vec()),
            ]
        );
    }

    #[test]
    fn test_unwritable_destination() {
        let src = tempdir().unwrap();
        let err = write_tree_archive(
            src.path(),
            "shop",
            &src.path().join("missing/out.tar.gz"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }
}
