use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use skillkit_core::{
    managed_entries, CancelToken, InstallError, ManagedEntry, TargetLayout,
};
use skillkit_source::{copy_path, path_exists, remove_path, ContentSource, FetchProgress, StagedContent};
use tracing::{debug, info, warn};

use crate::journal::{choose_backup_suffix, BackupRecord, JournalStep, TransactionLog};
use crate::post_install::{run_post_install, PostInstallOptions};
use crate::report::{count_contents, InstallReport, InstalledEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Staging,
    BackingUp,
    Installing,
    RollingBack,
    PostInstall,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::BackingUp => "backup",
            Self::Installing => "install",
            Self::RollingBack => "rollback",
            Self::PostInstall => "post-install",
        }
    }
}

/// Callbacks for front ends that want to render progress. All methods
/// default to doing nothing.
pub trait InstallObserver {
    fn phase(&mut self, _phase: Phase) {}
    fn fetch_progress(&mut self, _progress: FetchProgress) {}
    fn backed_up(&mut self, _record: &BackupRecord) {}
    fn installed(&mut self, _entry: &InstalledEntry) {}
    fn rolled_back(&mut self, _summary: &RollbackSummary) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl InstallObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub entries: Vec<ManagedEntry>,
    pub cancel: CancelToken,
    /// Where the scratch area is created; the system temp dir when unset.
    pub staging_parent: Option<PathBuf>,
    pub post_install: PostInstallOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            entries: managed_entries().to_vec(),
            cancel: CancelToken::new(),
            staging_parent: None,
            post_install: PostInstallOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub removed: usize,
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RollbackSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Resolves `path` to an absolute, existing, writable directory.
///
/// With `create_missing` a missing directory is created first; otherwise it
/// is rejected. Nothing else in the target is touched.
pub fn validate_target(path: &Path, create_missing: bool) -> Result<TargetLayout, InstallError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| InstallError::TargetInvalid {
                path: path.to_path_buf(),
                reason: "current directory is unavailable".to_string(),
                cause: Some(Box::new(err)),
            })?
            .join(path)
    };

    match fs::metadata(&absolute) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(InstallError::target_invalid(
                absolute,
                "exists and is not a directory",
            ));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if !create_missing {
                return Err(InstallError::target_invalid(absolute, "does not exist"));
            }
            fs::create_dir_all(&absolute).map_err(|err| InstallError::TargetInvalid {
                path: absolute.clone(),
                reason: "could not be created".to_string(),
                cause: Some(Box::new(err)),
            })?;
            info!(target = %absolute.display(), "created target directory");
        }
        Err(err) => {
            return Err(InstallError::TargetInvalid {
                path: absolute,
                reason: "could not be inspected".to_string(),
                cause: Some(Box::new(err)),
            });
        }
    }

    tempfile::Builder::new()
        .prefix(".skillkit-write-probe-")
        .tempfile_in(&absolute)
        .map_err(|err| InstallError::TargetInvalid {
            path: absolute.clone(),
            reason: "is not writable".to_string(),
            cause: Some(Box::new(err)),
        })?;

    Ok(TargetLayout::new(absolute))
}

/// Materializes the source into a fresh scratch area and checks that the
/// tree is installable. The returned value owns the scratch area.
pub fn stage(
    source: &dyn ContentSource,
    entries: &[ManagedEntry],
    staging_parent: Option<&Path>,
    cancel: &CancelToken,
    observer: &mut dyn InstallObserver,
) -> Result<StagedContent, InstallError> {
    let source_desc = source.describe();
    let staged = match staging_parent {
        Some(parent) => StagedContent::new_in(parent),
        None => StagedContent::new(),
    }
    .map_err(|err| InstallError::SourceUnavailable {
        source_desc: source_desc.clone(),
        cause: err.into(),
    })?;
    debug!(scratch = %staged.scratch_dir().display(), "allocated staging area");

    source
        .fetch(&staged, cancel, &mut |progress| observer.fetch_progress(progress))
        .map_err(|err| {
            if cancel.is_cancelled() {
                InstallError::Cancelled { stage: "staging" }
            } else {
                InstallError::SourceUnavailable {
                    source_desc: source_desc.clone(),
                    cause: err.into(),
                }
            }
        })?;

    verify_staged_tree(&staged, entries, &source_desc)?;
    info!(source = %source_desc, "staged content");
    Ok(staged)
}

fn verify_staged_tree(
    staged: &StagedContent,
    entries: &[ManagedEntry],
    source_desc: &str,
) -> Result<(), InstallError> {
    let incomplete = |reason: String| InstallError::SourceIncomplete {
        source_desc: source_desc.to_string(),
        reason,
    };

    for entry in entries.iter().filter(|entry| entry.required) {
        if !path_exists(&staged.entry_path(entry)) {
            return Err(incomplete(format!(
                "required entry '{}' is missing",
                entry.source_name
            )));
        }
    }

    let settings_path = TargetLayout::new(staged.tree()).settings_path();
    if settings_path.is_file() {
        let raw = fs::read_to_string(&settings_path)
            .map_err(|err| incomplete(format!("unreadable .claude/settings.json: {err}")))?;
        serde_json::from_str::<serde_json::Value>(&raw)
            .map_err(|err| incomplete(format!("invalid .claude/settings.json: {err}")))?;
    }

    Ok(())
}

/// Moves every existing managed entry aside to `<name>.backup.<suffix>`.
///
/// Records are appended to `log` as they happen, so a failure part-way
/// leaves exactly the completed moves in the log for rollback.
pub fn backup(
    layout: &TargetLayout,
    entries: &[ManagedEntry],
    suffix: &str,
    log: &mut TransactionLog,
    cancel: &CancelToken,
    observer: &mut dyn InstallObserver,
) -> Result<(), InstallError> {
    for entry in entries {
        ensure_not_cancelled(cancel, "backup")?;
        let original = layout.entry_path(entry);
        if !path_exists(&original) {
            debug!(entry = entry.dest_name, "nothing to back up");
            continue;
        }

        let backup = layout.backup_path(entry, suffix);
        if path_exists(&backup) {
            return Err(InstallError::BackupFailed {
                original,
                backup,
                cause: Box::new(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "backup path already exists",
                )),
            });
        }

        if let Err(err) = fs::rename(&original, &backup) {
            return Err(InstallError::BackupFailed {
                original,
                backup,
                cause: Box::new(err),
            });
        }

        info!(from = %original.display(), to = %backup.display(), "backed up entry");
        let record = BackupRecord {
            entry: *entry,
            original,
            backup,
        };
        observer.backed_up(&record);
        log.push_backup(record);
    }
    Ok(())
}

/// Copies every staged entry into the target under its destination name.
pub fn install(
    layout: &TargetLayout,
    staged: &StagedContent,
    entries: &[ManagedEntry],
    log: &mut TransactionLog,
    cancel: &CancelToken,
    observer: &mut dyn InstallObserver,
) -> Result<Vec<InstalledEntry>, InstallError> {
    install_with_copier(layout, staged, entries, log, cancel, observer, &mut copy_path)
}

pub(crate) fn install_with_copier<C>(
    layout: &TargetLayout,
    staged: &StagedContent,
    entries: &[ManagedEntry],
    log: &mut TransactionLog,
    cancel: &CancelToken,
    observer: &mut dyn InstallObserver,
    copy_entry: &mut C,
) -> Result<Vec<InstalledEntry>, InstallError>
where
    C: FnMut(&Path, &Path) -> anyhow::Result<()>,
{
    let mut installed = Vec::new();
    for entry in entries {
        ensure_not_cancelled(cancel, "install")?;
        let from = staged.entry_path(entry);
        if !path_exists(&from) {
            debug!(entry = entry.source_name, "entry not present in source");
            continue;
        }

        let to = layout.entry_path(entry);
        if path_exists(&to) {
            // Only possible if something recreated the path after backup.
            return Err(InstallError::CopyFailed {
                from,
                to,
                cause: Box::new(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "destination appeared after backup",
                )),
            });
        }

        log.push_created(to.clone());
        if let Err(err) = copy_entry(&from, &to) {
            return Err(InstallError::CopyFailed {
                from,
                to,
                cause: err.into(),
            });
        }

        debug!(from = %from.display(), to = %to.display(), "installed entry");
        let entry = InstalledEntry {
            kind: entry.kind,
            source_name: entry.source_name.to_string(),
            destination: to,
            renamed: entry.is_renamed(),
        };
        observer.installed(&entry);
        installed.push(entry);
    }
    Ok(installed)
}

/// Undoes the journal back to front. Each step is attempted on its own and
/// problems are logged rather than returned, so this never fails and running
/// it twice is harmless.
pub fn rollback(log: &TransactionLog) -> RollbackSummary {
    let mut summary = RollbackSummary::default();
    for step in log.steps().iter().rev() {
        match step {
            JournalStep::Created(path) => {
                if !path_exists(path) {
                    continue;
                }
                // Once its backup has been moved back, the path holds the
                // original again.
                if log
                    .backups()
                    .any(|record| record.original == *path && !path_exists(&record.backup))
                {
                    continue;
                }
                match remove_path(path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "removed partially installed entry");
                        summary.removed += 1;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to remove installed entry");
                        summary.failed += 1;
                    }
                }
            }
            JournalStep::Backup(record) => {
                if !path_exists(&record.backup) {
                    warn!(
                        backup = %record.backup.display(),
                        "backup is gone; nothing to restore"
                    );
                    summary.skipped += 1;
                    continue;
                }
                if let Err(err) = remove_path(&record.original) {
                    warn!(
                        path = %record.original.display(),
                        error = %err,
                        "failed to clear path before restore"
                    );
                    summary.failed += 1;
                    continue;
                }
                match fs::rename(&record.backup, &record.original) {
                    Ok(()) => {
                        info!(path = %record.original.display(), "restored from backup");
                        summary.restored += 1;
                    }
                    Err(err) => {
                        warn!(
                            backup = %record.backup.display(),
                            error = %err,
                            "failed to restore backup"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }
    }
    summary
}

/// Runs one complete install transaction against `layout`.
///
/// On any failure after staging began, the journal is rolled back before the
/// originating error is returned. The staging area is released on every path.
pub fn run(
    layout: &TargetLayout,
    source: &dyn ContentSource,
    options: &RunOptions,
    observer: &mut dyn InstallObserver,
) -> Result<InstallReport, InstallError> {
    run_with_copier(layout, source, options, observer, &mut copy_path)
}

pub(crate) fn run_with_copier<C>(
    layout: &TargetLayout,
    source: &dyn ContentSource,
    options: &RunOptions,
    observer: &mut dyn InstallObserver,
    copy_entry: &mut C,
) -> Result<InstallReport, InstallError>
where
    C: FnMut(&Path, &Path) -> anyhow::Result<()>,
{
    let source_desc = source.describe();
    info!(target = %layout.root().display(), source = %source_desc, "starting install");

    let mut log = TransactionLog::new();
    let result = (|| -> Result<(String, Vec<InstalledEntry>), InstallError> {
        observer.phase(Phase::Staging);
        let staged = stage(
            source,
            &options.entries,
            options.staging_parent.as_deref(),
            &options.cancel,
            observer,
        )?;

        let suffix = choose_backup_suffix(layout, &options.entries);
        observer.phase(Phase::BackingUp);
        backup(
            layout,
            &options.entries,
            &suffix,
            &mut log,
            &options.cancel,
            observer,
        )?;

        observer.phase(Phase::Installing);
        let installed = install_with_copier(
            layout,
            &staged,
            &options.entries,
            &mut log,
            &options.cancel,
            observer,
            copy_entry,
        )?;
        Ok((suffix, installed))
    })();

    let (suffix, installed) = match result {
        Ok(value) => value,
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "install failed; rolling back");
            observer.phase(Phase::RollingBack);
            let summary = rollback(&log);
            if !summary.is_clean() {
                warn!(?summary, "rollback finished with problems");
            }
            observer.rolled_back(&summary);
            return Err(err);
        }
    };

    observer.phase(Phase::PostInstall);
    let warnings = run_post_install(layout, &options.post_install);
    for warning in &warnings {
        warn!(kind = warning.kind(), "{warning}");
    }

    let report = InstallReport {
        target: layout.root().to_path_buf(),
        source: source_desc,
        backup_suffix: suffix,
        backups: log.backups().cloned().collect(),
        installed,
        counts: count_contents(layout),
        warnings,
    };
    info!(
        backups = report.backups.len(),
        installed = report.installed.len(),
        "install committed"
    );
    Ok(report)
}

fn ensure_not_cancelled(cancel: &CancelToken, stage: &'static str) -> Result<(), InstallError> {
    if cancel.is_cancelled() {
        return Err(InstallError::Cancelled { stage });
    }
    Ok(())
}
