mod cancel;
mod config;
mod entry;
mod error;
mod layout;
mod reference;

pub use cancel::CancelToken;
pub use config::{default_config_path, SkillkitConfig};
pub use entry::{managed_entries, EntryKind, ManagedEntry};
pub use error::{InstallError, InstallWarning};
pub use layout::{parse_backup_name, TargetLayout, BACKUP_MARKER};
pub use reference::{ContentRef, DEFAULT_ARCHIVE_BASE, DEFAULT_REFERENCE, DEFAULT_REPOSITORY};

#[cfg(test)]
mod tests;
