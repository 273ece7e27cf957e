use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use skillkit_core::ManagedEntry;
use tempfile::TempDir;

/// Scratch area owned by a single run.
///
/// The fetched template tree lives under `tree()`; sources may keep
/// intermediate files (downloaded archives) beside it in `scratch_dir()`.
/// Dropping the value deletes everything.
#[derive(Debug)]
pub struct StagedContent {
    dir: TempDir,
    tree: PathBuf,
}

impl StagedContent {
    pub fn new() -> Result<Self> {
        Self::new_in(std::env::temp_dir())
    }

    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix("skillkit-stage-")
            .tempdir_in(parent)
            .with_context(|| format!("failed to create staging dir in {}", parent.display()))?;
        let tree = dir.path().join("tree");
        fs::create_dir(&tree).with_context(|| format!("failed to create {}", tree.display()))?;
        Ok(Self { dir, tree })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn tree(&self) -> &Path {
        &self.tree
    }

    pub fn entry_path(&self, entry: &ManagedEntry) -> PathBuf {
        self.tree.join(entry.source_name)
    }
}
