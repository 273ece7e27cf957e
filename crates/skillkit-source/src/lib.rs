mod archive;
mod directory;
mod fs_ops;
mod staging;

use anyhow::Result;
use skillkit_core::CancelToken;

pub use archive::ArchiveSource;
pub use directory::DirectorySource;
pub use fs_ops::{copy_path, path_exists, remove_path};
pub use staging::StagedContent;

/// Units are bytes for downloads and top-level entries for directory copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub completed: u64,
    pub total: Option<u64>,
}

/// Something that can materialize the template tree for one reference.
pub trait ContentSource {
    /// Human-readable origin used in logs and error messages.
    fn describe(&self) -> String;

    /// Populates `staged.tree()`. Implementations poll `cancel` between units
    /// of work and fail once it is set.
    fn fetch(
        &self,
        staged: &StagedContent,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<()>;
}

pub(crate) fn ensure_not_cancelled(cancel: &CancelToken, what: &str) -> Result<()> {
    if cancel.is_cancelled() {
        anyhow::bail!("{what} cancelled");
    }
    Ok(())
}

#[cfg(test)]
mod tests;
