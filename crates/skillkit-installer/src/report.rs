use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use skillkit_core::{EntryKind, InstallWarning, TargetLayout};

use crate::journal::BackupRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledEntry {
    pub kind: EntryKind,
    pub source_name: String,
    pub destination: PathBuf,
    pub renamed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCounts {
    pub skills: usize,
    pub agents: usize,
    pub commands: usize,
    pub hooks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub target: PathBuf,
    pub source: String,
    pub backup_suffix: String,
    pub backups: Vec<BackupRecord>,
    pub installed: Vec<InstalledEntry>,
    pub counts: ContentCounts,
    pub warnings: Vec<InstallWarning>,
}

impl InstallReport {
    pub fn summary_line(&self) -> String {
        format!(
            "skills={} agents={} commands={} hooks={} backups={}",
            self.counts.skills,
            self.counts.agents,
            self.counts.commands,
            self.counts.hooks,
            self.backups.len()
        )
    }
}

const HOOK_MANIFEST_FILES: [&str; 2] = ["package.json", "package-lock.json"];

/// Counts the installed sub-items. Missing directories count as zero.
pub fn count_contents(layout: &TargetLayout) -> ContentCounts {
    ContentCounts {
        skills: count_child_dirs(&layout.skills_dir()),
        agents: count_markdown_files(&layout.agents_dir()),
        commands: count_markdown_files(&layout.commands_dir()),
        hooks: count_hook_files(&layout.hooks_dir()),
    }
}

fn count_child_dirs(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .count()
}

fn count_markdown_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut count = 0;
    for entry in entries.filter_map(Result::ok) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            count += count_markdown_files(&path);
        } else if file_type.is_file()
            && path.extension().and_then(|value| value.to_str()) == Some("md")
        {
            count += 1;
        }
    }
    count
}

fn count_hook_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
        .filter(|entry| {
            let name = entry.file_name();
            !HOOK_MANIFEST_FILES
                .iter()
                .any(|manifest| name.to_str() == Some(*manifest))
        })
        .count()
}
