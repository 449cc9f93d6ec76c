//! Release assembly: staging, external steps, filtering, manifest and archive.

pub mod archive;
pub mod assembler;
pub mod config;
pub mod executor;
pub mod report;
pub mod staging;

pub use assembler::{BuildOptions, ReleaseAssembler};
pub use config::{CommandSpec, ReleaseConfig, CONFIG_FILE_NAME};
pub use executor::{CommandOutput, Executor, LocalExecutor};
pub use report::ReleaseReport;
