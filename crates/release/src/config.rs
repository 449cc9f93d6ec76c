//! Release configuration (`relpack.yaml`).

use relpack_common::{Error, Result};
use relpack_manifest::{validate_root_label, DEFAULT_ROOT_LABEL};
use relpack_rules::RuleSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "relpack.yaml";

/// An external command: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The command line, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Project-level release settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Name of the packaged folder and artifact prefix; defaults to the
    /// project directory name.
    pub package_name: Option<String>,
    /// Where dated release folders are created, relative to the project.
    pub releases_dir: PathBuf,
    /// Element wrapping the root entries of the checksum manifest.
    pub manifest_root: String,
    /// Treat any deletion failure as fatal.
    pub strict_deletion: bool,
    /// Concatenate license files into `LICENSES`.
    pub licenses: bool,
    /// Folders created in the staging copy.
    pub ensure_dirs: Vec<PathBuf>,
    /// Staging entries renamed before filtering (`from: to`).
    pub renames: BTreeMap<String, String>,
    pub rules: RuleSpec,
    /// Config-constant patcher, run in the staging copy.
    pub patch: Option<CommandSpec>,
    /// Dependency installer, run in the staging copy.
    pub install: Option<CommandSpec>,
    /// Installer-stub compiler, run in the project root.
    pub stub: Option<CommandSpec>,
    /// File produced by the stub compiler, relative to the project root.
    pub stub_entry: Option<PathBuf>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            package_name: None,
            releases_dir: PathBuf::from("tools/build/releases"),
            manifest_root: DEFAULT_ROOT_LABEL.to_string(),
            strict_deletion: false,
            licenses: true,
            ensure_dirs: Vec::new(),
            renames: BTreeMap::new(),
            rules: RuleSpec::default(),
            patch: None,
            install: None,
            stub: None,
            stub_entry: None,
        }
    }
}

impl ReleaseConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: ReleaseConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded release config");
        Ok(config)
    }

    /// Load `relpack.yaml` from the project root, or fall back to defaults.
    pub fn discover(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Package name, falling back to the project directory name.
    pub fn package_name_for(&self, project_root: &Path) -> String {
        self.package_name.clone().unwrap_or_else(|| {
            project_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "release".to_string())
        })
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.package_name {
            check_file_component("package_name", name)?;
        }
        for (from, to) in &self.renames {
            check_relative("renames", Path::new(from))?;
            check_relative("renames", Path::new(to))?;
        }
        for dir in &self.ensure_dirs {
            check_relative("ensure_dirs", dir)?;
        }
        validate_root_label(&self.manifest_root)?;
        Ok(())
    }
}

/// Reject values that would escape a single path component.
pub fn check_file_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(Error::Config(format!(
            "{} '{}' must be a plain file name",
            field, value
        )));
    }
    Ok(())
}

fn check_relative(field: &str, path: &Path) -> Result<()> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)));
    if path.as_os_str().is_empty() || escapes {
        return Err(Error::Config(format!(
            "{} entry '{}' must be a relative path inside the project",
            field,
            path.display()
        )));
    }
    Ok(())
}
