//! Release assembly pipeline.
//!
//! staging copy -> layout -> licenses -> patch -> install -> filter ->
//! manifest -> archive (+ installer) -> move -> cleanup

use crate::archive::{write_installer_archive, write_tree_archive};
use crate::config::{check_file_component, CommandSpec, ReleaseConfig, CONFIG_FILE_NAME};
use crate::executor::{run_step, Executor, LocalExecutor};
use crate::report::ReleaseReport;
use crate::staging::{self, Staging};
use relpack_common::hash::sha256_file;
use relpack_common::{Error, Result, Timestamp};
use relpack_manifest::ChecksumManifest;
use relpack_rules::{PathClassifier, RemovalRuleSet};
use relpack_tree::{FilterReport, TreeFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Per-build options, usually from the command line.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub project_root: PathBuf,
    pub version: String,
    /// Wrap the archive together with the installer stub.
    pub use_installer: bool,
    /// Produce an archive; otherwise the release tree itself is delivered.
    pub use_archive: bool,
    /// Overrides the dated folder under `releases_dir`.
    pub destination: Option<PathBuf>,
    pub strict: bool,
    pub keep_staging: bool,
}

impl BuildOptions {
    pub fn new(project_root: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            version: version.into(),
            use_installer: false,
            use_archive: true,
            destination: None,
            strict: false,
            keep_staging: false,
        }
    }
}

/// Paths resolved once at the start of a build.
struct BuildContext {
    project: PathBuf,
    destination: PathBuf,
    package: String,
    started_at: Timestamp,
}

/// Produces a release from a project checkout.
pub struct ReleaseAssembler {
    config: ReleaseConfig,
    options: BuildOptions,
    executor: Arc<dyn Executor>,
    temp_dir: PathBuf,
}

impl ReleaseAssembler {
    pub fn new(config: ReleaseConfig, options: BuildOptions) -> Self {
        Self {
            config,
            options,
            executor: Arc::new(LocalExecutor::new()),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Use another executor for the external steps.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Create staging directories under `temp_dir` instead of the system one.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Run the whole build.
    ///
    /// The staging copy is removed afterwards, whether the build succeeded or
    /// not, unless `keep_staging` is set.
    #[instrument(skip_all, fields(version = %self.options.version))]
    pub async fn assemble(&self) -> Result<ReleaseReport> {
        let ctx = self.prepare()?;
        let rules = RemovalRuleSet::from_spec(&self.config.rules)?;
        let staging = Staging::create(
            &self.temp_dir,
            &ctx.package,
            &self.options.version,
            &ctx.started_at,
        )?;

        let result = self.run(&ctx, rules, &staging).await;

        if self.options.keep_staging {
            info!(base = %staging.base().display(), "Keeping staging directory");
        } else {
            let base = staging.base().to_path_buf();
            if let Err(e) = staging.cleanup() {
                warn!(base = %base.display(), error = %e, "Failed to remove staging directory");
            }
        }

        let mut report = result?;
        report.duration_seconds = ctx.started_at.elapsed().num_milliseconds() as f64 / 1000.0;
        report.write_json(&ctx.destination)?;
        info!(
            duration_seconds = report.duration_seconds,
            failures = report.failures.len(),
            "Release built"
        );
        Ok(report)
    }

    /// Validate inputs and resolve the project and destination folders.
    fn prepare(&self) -> Result<BuildContext> {
        let started_at = Timestamp::now();
        check_file_component("version", &self.options.version)?;

        let root = &self.options.project_root;
        let project = root
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| Error::InvalidRoot { path: root.clone() })?;
        let package = self.config.package_name_for(&project);
        check_file_component("package_name", &package)?;

        let stub_configured = self.config.stub.is_some() && self.config.stub_entry.is_some();
        if self.options.use_installer && self.options.use_archive && !stub_configured {
            return Err(Error::Config(
                "installer requested but `stub` and `stub_entry` are not configured".to_string(),
            ));
        }

        let destination = match &self.options.destination {
            Some(dir) => dir.clone(),
            None => project.join(&self.config.releases_dir).join(format!(
                "{}_{}",
                self.options.version,
                started_at.to_release_stamp()
            )),
        };
        std::fs::create_dir_all(&destination)?;
        let destination = destination.canonicalize()?;
        info!(
            project = %project.display(),
            destination = %destination.display(),
            package = %package,
            "Starting release build"
        );

        Ok(BuildContext {
            project,
            destination,
            package,
            started_at,
        })
    }

    async fn run(
        &self,
        ctx: &BuildContext,
        rules: RemovalRuleSet,
        staging: &Staging,
    ) -> Result<ReleaseReport> {
        let root = staging.root().to_path_buf();
        let version = self.options.version.clone();

        info!("Copying project into staging");
        let exclude = vec![
            ctx.destination.clone(),
            ctx.project.join(&self.config.releases_dir),
            ctx.project.join(CONFIG_FILE_NAME),
        ];
        let copied = blocking({
            let (project, root) = (ctx.project.clone(), root.clone());
            move || staging::copy_tree(&project, &root, &exclude)
        })
        .await?;
        info!(files = copied, "Project copied");

        staging::apply_layout(&root, &self.config.ensure_dirs, &self.config.renames)?;
        if self.config.licenses {
            staging::write_licenses(&root)?;
        }

        if let Some(patch) = &self.config.patch {
            run_step(self.executor.as_ref(), "patch", patch, &root).await?;
        }
        if let Some(install) = &self.config.install {
            run_step(self.executor.as_ref(), "install", install, &root).await?;
        }

        let strict = self.options.strict || self.config.strict_deletion;
        let label = self.config.manifest_root.clone();
        let (filter, manifest) = blocking({
            let (root, version) = (root.clone(), version.clone());
            move || filter_and_hash(&root, &rules, strict, &label, &version)
        })
        .await?;

        let manifest_name = format!("{}_{}.xml", ctx.package, version);
        let staged_manifest = staging.base().join(&manifest_name);
        manifest.write_to(&staged_manifest)?;

        let (archive, release_dir) = if self.options.use_archive {
            (Some(self.package_archive(ctx, staging).await?), None)
        } else {
            if self.options.use_installer {
                warn!("Installer requested without an archive, ignoring it");
            }
            let target = ctx.destination.join(&ctx.package);
            if target.exists() {
                return Err(Error::Staging(format!(
                    "{} already exists",
                    target.display()
                )));
            }
            staging::move_path(&root, &target)?;
            info!(path = %target.display(), "Release tree delivered");
            (None, Some(target))
        };

        let manifest_path = ctx.destination.join(&manifest_name);
        staging::move_path(&staged_manifest, &manifest_path)?;

        let mut report = ReleaseReport::new(
            &version,
            &ctx.package,
            &ctx.destination,
            &manifest_path,
            filter,
            ctx.started_at,
        );
        if let Some(path) = &archive {
            report.archive_sha256 = Some(sha256_file(path)?);
            report.release_size_bytes = std::fs::metadata(path)?.len();
        }
        if let Some(dir) = &release_dir {
            report.release_size_bytes = staging::disk_usage(dir);
        }
        report.archive = archive;
        report.release_dir = release_dir;
        Ok(report)
    }

    /// Archive the filtered tree and move the artifact to the destination.
    async fn package_archive(&self, ctx: &BuildContext, staging: &Staging) -> Result<PathBuf> {
        let final_name = format!("{}_{}.tar.gz", ctx.package, self.options.version);
        let final_path = ctx.destination.join(&final_name);
        let inner = staging.base().join(format!("{}.tar.gz", ctx.package));

        info!("Creating archive");
        blocking({
            let (root, prefix, inner) =
                (staging.root().to_path_buf(), ctx.package.clone(), inner.clone());
            move || write_tree_archive(&root, &prefix, &inner)
        })
        .await?;

        if !self.options.use_installer {
            staging::move_path(&inner, &final_path)?;
            return Ok(final_path);
        }

        let (Some(stub), Some(entry)) = (&self.config.stub, &self.config.stub_entry) else {
            return Err(Error::Config("installer stub is not configured".to_string()));
        };
        let entry = self.build_stub(stub, &ctx.project.join(entry), &ctx.project).await?;

        let outer = staging.base().join(&final_name);
        let written = blocking({
            let (inner, entry, outer) = (inner.clone(), entry.clone(), outer.clone());
            move || write_installer_archive(&inner, &entry, &outer)
        })
        .await;
        if let Err(e) = std::fs::remove_file(&entry) {
            warn!(path = %entry.display(), error = %e, "Failed to remove installer stub");
        }
        written?;

        staging::move_path(&outer, &final_path)?;
        Ok(final_path)
    }

    /// Run the stub compiler in the project root and check its output.
    async fn build_stub(&self, stub: &CommandSpec, entry: &Path, project: &Path) -> Result<PathBuf> {
        run_step(self.executor.as_ref(), "stub", stub, project).await?;
        if !entry.is_file() {
            return Err(Error::Staging(format!(
                "installer stub {} was not produced",
                entry.display()
            )));
        }
        Ok(entry.to_path_buf())
    }
}

/// Snapshot, filter and hash the staged tree.
fn filter_and_hash(
    root: &Path,
    rules: &RemovalRuleSet,
    strict: bool,
    label: &str,
    version: &str,
) -> Result<(FilterReport, ChecksumManifest)> {
    let mut tree = relpack_tree::build(root)?;
    let classifier = PathClassifier::new(rules, root);
    let report = TreeFilter::new(&classifier, root)
        .strict(strict)
        .filter(&mut tree)?;
    let manifest = ChecksumManifest::generate(&tree, label, version)?;
    Ok((report, manifest))
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("blocking task failed: {}", e)))?
}
