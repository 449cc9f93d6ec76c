//! relpack - release packager for PHP e-commerce projects.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use relpack_manifest::{ChecksumManifest, DEFAULT_ROOT_LABEL};
use relpack_release::{BuildOptions, ReleaseAssembler, ReleaseConfig};
use relpack_rules::{PathClassifier, RemovalRuleSet};
use relpack_tree::Removal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code when a release was produced but some entries could not be deleted.
const EXIT_DELETION_FAILURES: u8 = 2;

#[derive(Parser)]
#[command(name = "relpack")]
#[command(
    author,
    version,
    about = "Build filtered, checksummed release packages from a project checkout"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a release package
    Build {
        /// Release version
        #[arg(long)]
        version: String,

        /// Wrap the archive with the installer stub
        #[arg(long)]
        installer: bool,

        /// Deliver the filtered tree instead of an archive
        #[arg(long)]
        no_archive: bool,

        /// Destination directory (default: <releases_dir>/<version>_<date>)
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Project root
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Config file (default: <project>/relpack.yaml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fail on the first deletion error
        #[arg(long)]
        strict: bool,

        /// Keep the staging directory for inspection
        #[arg(long)]
        keep_staging: bool,
    },

    /// List what the removal rules would delete, without touching anything
    Snapshot {
        /// Directory to classify
        dir: PathBuf,

        /// Rules file (default: rules from <dir>/relpack.yaml, or the reference rules)
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Write the checksum manifest of a directory as it is
    Manifest {
        /// Directory to hash
        dir: PathBuf,

        /// Version recorded in the manifest
        #[arg(long)]
        version: String,

        /// Output file (default: stdout)
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Element wrapping the root entries
        #[arg(long, default_value = DEFAULT_ROOT_LABEL)]
        root_label: String,
    },

    /// Print the effective removal rules as YAML
    Rules {
        /// Rules file to merge with the reference rules
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct SnapshotOutput {
    root: PathBuf,
    files: usize,
    dirs: usize,
    removals: Vec<Removal>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so command results on stdout stay parseable.
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Build {
            version,
            installer,
            no_archive,
            destination,
            project,
            config,
            strict,
            keep_staging,
        } => {
            let config = match config {
                Some(path) => ReleaseConfig::load(&path)?,
                None => ReleaseConfig::discover(&project)?,
            };

            let options = BuildOptions {
                project_root: project,
                version,
                use_installer: installer,
                use_archive: !no_archive,
                destination,
                strict,
                keep_staging,
            };

            let report = ReleaseAssembler::new(config, options).assemble().await?;

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => report.print_summary(),
            }

            if report.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_DELETION_FAILURES))
            }
        }

        Commands::Snapshot { dir, rules } => {
            let rules = load_rules(rules.as_deref(), Some(&dir))?;
            let tree = relpack_tree::build(&dir)?;
            let root = tree.path().to_path_buf();
            let classifier = PathClassifier::new(&rules, &root);
            let removals = relpack_tree::plan_removals(&tree, &classifier);
            let (files, dirs) = tree.counts();

            match cli.format {
                OutputFormat::Json => {
                    let output = SnapshotOutput {
                        root,
                        files,
                        dirs,
                        removals,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    for removal in &removals {
                        let rel = removal.path.strip_prefix(&root).unwrap_or(&removal.path);
                        let suffix = if removal.is_dir { "/" } else { "" };
                        println!("remove {}{}  ({})", rel.display(), suffix, removal.rule);
                    }
                    println!(
                        "\n{} of {} files and {} directories would be removed",
                        removals.len(),
                        files,
                        dirs
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Manifest {
            dir,
            version,
            out,
            root_label,
        } => {
            let tree = relpack_tree::build(&dir)?;
            let manifest = ChecksumManifest::generate(&tree, &root_label, &version)?;
            match out {
                Some(path) => {
                    manifest.write_to(&path)?;
                    info!("Manifest written to {}", path.display());
                }
                None => print!("{}", manifest.render()),
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Rules { rules } => {
            let spec = load_rules(rules.as_deref(), None)?.to_spec();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&spec)?),
                OutputFormat::Text => print!("{}", serde_yaml::to_string(&spec)?),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Rules from an explicit file, the project config, or the reference set.
fn load_rules(rules: Option<&Path>, project: Option<&Path>) -> anyhow::Result<RemovalRuleSet> {
    if let Some(path) = rules {
        return RemovalRuleSet::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()));
    }
    let spec = match project {
        Some(dir) => ReleaseConfig::discover(dir)?.rules,
        None => Default::default(),
    };
    Ok(RemovalRuleSet::from_spec(&spec)?)
}
