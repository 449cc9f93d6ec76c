//! Build report.

use relpack_common::{Result, Timestamp};
use relpack_tree::{DeletionFailure, FilterReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the JSON report written next to the artifacts.
pub const REPORT_FILE_NAME: &str = "release-report.json";

/// Summary of a release build.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    pub version: String,
    pub package_name: String,
    pub destination: PathBuf,
    /// Final archive, absent with `--no-archive`.
    pub archive: Option<PathBuf>,
    pub archive_sha256: Option<String>,
    /// Moved release tree, present with `--no-archive`.
    pub release_dir: Option<PathBuf>,
    pub manifest: PathBuf,
    pub files_kept: usize,
    pub dirs_kept: usize,
    pub removed: usize,
    pub failures: Vec<DeletionFailure>,
    pub release_size_bytes: u64,
    pub started_at: Timestamp,
    pub duration_seconds: f64,
}

impl ReleaseReport {
    /// Start a report from the filter outcome.
    pub fn new(
        version: &str,
        package_name: &str,
        destination: &Path,
        manifest: &Path,
        filter: FilterReport,
        started_at: Timestamp,
    ) -> Self {
        Self {
            version: version.to_string(),
            package_name: package_name.to_string(),
            destination: destination.to_path_buf(),
            archive: None,
            archive_sha256: None,
            release_dir: None,
            manifest: manifest.to_path_buf(),
            files_kept: filter.kept_files,
            dirs_kept: filter.kept_dirs,
            removed: filter.removed.len(),
            failures: filter.failures,
            release_size_bytes: 0,
            started_at,
            duration_seconds: 0.0,
        }
    }

    /// No deletion failures were reported.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write `release-report.json` into `dir`.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Release report written");
        Ok(path)
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("=== Release {} ({}) ===\n", self.version, self.package_name);
        println!("  Destination: {}", self.destination.display());
        if let Some(archive) = &self.archive {
            println!("  Archive:     {}", archive.display());
        }
        if let Some(sha) = &self.archive_sha256 {
            println!("  SHA-256:     {}", sha);
        }
        if let Some(dir) = &self.release_dir {
            println!("  Release dir: {}", dir.display());
        }
        println!("  Manifest:    {}", self.manifest.display());
        println!();
        println!("  Kept:    {} files, {} directories", self.files_kept, self.dirs_kept);
        println!("  Removed: {} entries", self.removed);
        println!("  Size:    {}", human_size(self.release_size_bytes));
        println!("  Time:    {:.1}s", self.duration_seconds);

        if !self.failures.is_empty() {
            println!("\nDeletion failures ({}):", self.failures.len());
            for failure in &self.failures {
                println!(
                    "  - {} [{}]: {}",
                    failure.path.display(),
                    failure.rule,
                    failure.error
                );
            }
        }
    }
}

/// Format a byte count with a binary unit.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
