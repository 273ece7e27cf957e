use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use skillkit_core::{parse_backup_name, ManagedEntry, TargetLayout};
use skillkit_source::path_exists;

use crate::journal::suffix_order_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannedAction {
    /// The destination exists and will be moved aside first.
    BackupAndReplace,
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    pub entry: ManagedEntry,
    pub destination: PathBuf,
    pub action: PlannedAction,
}

/// Previews what `backup` would do right now without touching the target.
pub fn plan(layout: &TargetLayout, entries: &[ManagedEntry]) -> Vec<PlannedChange> {
    entries
        .iter()
        .map(|entry| {
            let destination = layout.entry_path(entry);
            let action = if path_exists(&destination) {
                PlannedAction::BackupAndReplace
            } else {
                PlannedAction::Create
            };
            PlannedChange {
                entry: *entry,
                destination,
                action,
            }
        })
        .collect()
}

/// All backups one run produced, recognized by their shared suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSet {
    pub suffix: String,
    pub paths: Vec<PathBuf>,
}

/// Finds `<dest_name>.backup.<suffix>` paths of managed entries in the target
/// root and groups them per run, newest first.
pub fn list_backups(layout: &TargetLayout, entries: &[ManagedEntry]) -> Result<Vec<BackupSet>> {
    let root = layout.root();
    let mut by_suffix: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some((dest_name, suffix)) = parse_backup_name(file_name) else {
            continue;
        };
        if !entries.iter().any(|managed| managed.dest_name == dest_name) {
            continue;
        }
        by_suffix
            .entry(suffix.to_string())
            .or_default()
            .push(entry.path());
    }

    let mut sets = by_suffix
        .into_iter()
        .map(|(suffix, mut paths)| {
            paths.sort();
            BackupSet { suffix, paths }
        })
        .collect::<Vec<_>>();
    sets.sort_by(|left, right| {
        let left_key = suffix_order_key(&left.suffix);
        let right_key = suffix_order_key(&right.suffix);
        match (left_key.0, right_key.0) {
            (Some(left_order), Some(right_order)) => right_order.cmp(&left_order),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => left_key.1.cmp(right_key.1),
        }
    });
    Ok(sets)
}
