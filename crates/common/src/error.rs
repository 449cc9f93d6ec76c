//! Common error types for relpack.

use std::path::PathBuf;
use thiserror::Error;

/// Common error type for relpack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid snapshot root: {}", .path.display())]
    InvalidRoot { path: PathBuf },

    #[error("Refusing to delete {} outside of staging root {}", .path.display(), .trusted_root.display())]
    UnsafeDeletionTarget {
        path: PathBuf,
        trusted_root: PathBuf,
    },

    #[error("Failed to delete {} (matched by {rule}): {source}", .path.display())]
    RuleMismatchIo {
        path: PathBuf,
        rule: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checksum manifest {}: {source}", .path.display())]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("External step '{step}' failed: {program} exited with {} - {stderr}", .status.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ExternalCollaborator {
        step: String,
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Required tool not found: {0}")]
    MissingTool(String),

    #[error("Invalid removal pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_deletion_message_names_both_paths() {
        let err = Error::UnsafeDeletionTarget {
            path: PathBuf::from("/home/user/project/secret"),
            trusted_root: PathBuf::from("/tmp/staging-xyz"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/home/user/project/secret"));
        assert!(msg.contains("/tmp/staging-xyz"));
    }

    #[test]
    fn test_external_collaborator_without_exit_code() {
        let err = Error::ExternalCollaborator {
            step: "install".to_string(),
            program: "composer".to_string(),
            status: None,
            stderr: "killed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "External step 'install' failed: composer exited with signal - killed"
        );
    }

    #[test]
    fn test_deletion_failure_keeps_source() {
        let err = Error::RuleMismatchIo {
            path: PathBuf::from("/tmp/stage/tests"),
            rule: "pattern:tests$".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to delete /tmp/stage/tests (matched by pattern:tests$): denied"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
