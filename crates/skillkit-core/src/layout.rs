use std::path::{Path, PathBuf};

use crate::entry::ManagedEntry;

/// Infix separating a managed destination name from its backup suffix.
pub const BACKUP_MARKER: &str = ".backup.";

/// Paths inside one installation target, all derived from its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    root: PathBuf,
}

impl TargetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn claude_dir(&self) -> PathBuf {
        self.root.join(".claude")
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.claude_dir().join("skills")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.claude_dir().join("agents")
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.claude_dir().join("commands")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.claude_dir().join("hooks")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.claude_dir().join("settings.json")
    }

    pub fn entry_path(&self, entry: &ManagedEntry) -> PathBuf {
        self.root.join(entry.dest_name)
    }

    pub fn backup_path(&self, entry: &ManagedEntry, suffix: &str) -> PathBuf {
        self.root
            .join(format!("{}{BACKUP_MARKER}{suffix}", entry.dest_name))
    }
}

/// Splits `<dest_name>.backup.<suffix>` into its parts.
///
/// The destination name itself may contain dots (`SKILLKIT_README.md`), so the
/// split happens at the last marker occurrence.
pub fn parse_backup_name(file_name: &str) -> Option<(&str, &str)> {
    let index = file_name.rfind(BACKUP_MARKER)?;
    let dest_name = &file_name[..index];
    let suffix = &file_name[index + BACKUP_MARKER.len()..];
    if dest_name.is_empty() || suffix.is_empty() {
        return None;
    }
    Some((dest_name, suffix))
}
