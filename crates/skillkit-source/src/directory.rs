use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use skillkit_core::CancelToken;
use tracing::debug;

use crate::fs_ops::copy_path;
use crate::{ensure_not_cancelled, ContentSource, FetchProgress, StagedContent};

/// Serves the template tree from a local checkout or offline mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    fn fetch(
        &self,
        staged: &StagedContent,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<()> {
        if !self.root.is_dir() {
            anyhow::bail!(
                "source location is not a directory: {}",
                self.root.display()
            );
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("failed to read {}", self.root.display()))?;
        let total = entries.len() as u64;

        for (index, entry) in entries.into_iter().enumerate() {
            ensure_not_cancelled(cancel, "directory copy")?;
            let name = entry.file_name();
            // VCS metadata is never template content.
            if name == ".git" {
                continue;
            }
            let dst = staged.tree().join(&name);
            debug!(from = %entry.path().display(), to = %dst.display(), "staging entry");
            copy_path(&entry.path(), &dst)?;
            progress(FetchProgress {
                completed: index as u64 + 1,
                total: Some(total),
            });
        }

        Ok(())
    }
}
