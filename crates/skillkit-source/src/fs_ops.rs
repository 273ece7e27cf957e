use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};

/// True when anything, including a dangling symlink, occupies `path`.
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Removes a file, symlink, or directory tree. Missing paths are fine.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Copies a single file, symlink, or whole directory tree from `src` to `dst`.
/// `dst` must not exist yet.
pub fn copy_path(src: &Path, dst: &Path) -> Result<()> {
    let metadata =
        fs::symlink_metadata(src).with_context(|| format!("failed to stat {}", src.display()))?;
    if metadata.is_dir() {
        return copy_dir_recursive(src, dst);
    }
    copy_leaf(src, dst, &metadata)
}

pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry.with_context(|| format!("failed to read {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
            continue;
        }
        copy_leaf(&src_path, &dst_path, &metadata)?;
    }
    Ok(())
}

fn copy_leaf(src: &Path, dst: &Path, metadata: &fs::Metadata) -> Result<()> {
    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        let target =
            fs::read_link(src).with_context(|| format!("failed to read symlink {}", src.display()))?;
        std::os::unix::fs::symlink(&target, dst).with_context(|| {
            format!(
                "failed to create symlink {} -> {}",
                dst.display(),
                target.display()
            )
        })?;
        return Ok(());
    }
    #[cfg(not(unix))]
    let _ = metadata;

    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}
