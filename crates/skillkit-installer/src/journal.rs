use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use skillkit_core::{ManagedEntry, TargetLayout};
use skillkit_source::path_exists;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub entry: ManagedEntry,
    pub original: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalStep {
    /// An existing entry was moved aside.
    Backup(BackupRecord),
    /// The install step is about to write a path that did not exist before.
    Created(PathBuf),
}

/// In-memory journal of everything the current run changed in the target,
/// in the order it happened. Never persisted; rollback replays it backwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionLog {
    steps: Vec<JournalStep>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_backup(&mut self, record: BackupRecord) {
        self.steps.push(JournalStep::Backup(record));
    }

    pub fn push_created(&mut self, path: PathBuf) {
        self.steps.push(JournalStep::Created(path));
    }

    pub fn steps(&self) -> &[JournalStep] {
        &self.steps
    }

    pub fn backups(&self) -> impl Iterator<Item = &BackupRecord> {
        self.steps.iter().filter_map(|step| match step {
            JournalStep::Backup(record) => Some(record),
            JournalStep::Created(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Picks the suffix shared by every backup of this run.
///
/// The unix timestamp alone collides when two runs land in the same second,
/// so a `-N` counter is appended until no managed entry's backup path with
/// that suffix exists yet.
pub fn choose_backup_suffix(layout: &TargetLayout, entries: &[ManagedEntry]) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    choose_backup_suffix_at(layout, entries, now)
}

pub(crate) fn choose_backup_suffix_at(
    layout: &TargetLayout,
    entries: &[ManagedEntry],
    unix_secs: u64,
) -> String {
    let base = unix_secs.to_string();
    let mut candidate = base.clone();
    let mut counter = 0_u32;
    while entries
        .iter()
        .any(|entry| path_exists(&layout.backup_path(entry, &candidate)))
    {
        counter += 1;
        candidate = format!("{base}-{counter}");
    }
    candidate
}

/// Sort key for suffixes produced by `choose_backup_suffix`; anything else
/// sorts after them by plain string order.
pub(crate) fn suffix_order_key(suffix: &str) -> (Option<(u64, u32)>, &str) {
    let (secs, counter) = match suffix.split_once('-') {
        Some((secs, counter)) => (secs, counter.parse::<u32>().ok()),
        None => (suffix, Some(0)),
    };
    match (secs.parse::<u64>().ok(), counter) {
        (Some(secs), Some(counter)) => (Some((secs, counter)), suffix),
        _ => (None, suffix),
    }
}
