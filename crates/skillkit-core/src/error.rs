use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures that abort an install run.
///
/// Everything except `TargetInvalid` is raised after the transaction may have
/// touched the target, so the installer rolls back before surfacing it.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("target {} is not usable: {reason}", path.display())]
    TargetInvalid {
        path: PathBuf,
        reason: String,
        #[source]
        cause: Option<Cause>,
    },

    #[error("content source {source_desc} is unavailable")]
    SourceUnavailable {
        source_desc: String,
        #[source]
        cause: Cause,
    },

    #[error("content from {source_desc} is incomplete: {reason}")]
    SourceIncomplete { source_desc: String, reason: String },

    #[error("failed to back up {} to {}", original.display(), backup.display())]
    BackupFailed {
        original: PathBuf,
        backup: PathBuf,
        #[source]
        cause: Cause,
    },

    #[error("failed to copy {} into {}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        cause: Cause,
    },

    #[error("install cancelled during {stage}")]
    Cancelled { stage: &'static str },
}

impl InstallError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TargetInvalid { .. } => "target-invalid",
            Self::SourceUnavailable { .. } => "source-unavailable",
            Self::SourceIncomplete { .. } => "source-incomplete",
            Self::BackupFailed { .. } => "backup-failed",
            Self::CopyFailed { .. } => "copy-failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn target_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::TargetInvalid {
            path: path.into(),
            reason: reason.into(),
            cause: None,
        }
    }
}

/// Problems in steps that run after the transaction committed. They are
/// reported but never roll back the installed files.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallWarning {
    #[error("{tool} was not found on PATH; skipped dependency install in {}", dir.display())]
    DependencyToolMissing { tool: String, dir: PathBuf },

    #[error("dependency install in {} failed: {detail}", dir.display())]
    DependencyInstallFailed { dir: PathBuf, detail: String },

    #[error("failed to mark {} executable: {detail}", path.display())]
    PermissionFailed { path: PathBuf, detail: String },
}

impl InstallWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DependencyToolMissing { .. } => "dependency-tool-missing",
            Self::DependencyInstallFailed { .. } => "dependency-install-failed",
            Self::PermissionFailed { .. } => "permission-failed",
        }
    }
}
