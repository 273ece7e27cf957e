use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use skillkit_core::{managed_entries, CancelToken, ContentRef, TargetLayout};
use skillkit_installer::{
    list_backups, plan, run, validate_target, BackupSet, InstallReport, PlannedAction,
    PlannedChange, PostInstallOptions, RunOptions,
};
use skillkit_source::{ArchiveSource, ContentSource, DirectorySource};
use tracing::info;

use crate::prompt::Confirmer;
use crate::render::{
    format_backup_set_lines, format_plan_lines, format_report_lines, format_warning_lines,
    OutputStyle, ProgressUnit, TerminalObserver,
};
use crate::settings::{SettingOverrides, Settings};
use crate::InstallArgs;

#[derive(Debug)]
pub(crate) enum InstallOutcome {
    DryRun(Vec<PlannedChange>),
    Installed(InstallReport),
}

pub(crate) fn install_overrides(args: &InstallArgs) -> SettingOverrides {
    SettingOverrides {
        repository: args.repo.clone(),
        reference: args.reference.clone(),
        archive_base: args.archive_base.clone(),
        skip_dependencies: args.skip_deps.then_some(true),
    }
}

fn build_source(
    args: &InstallArgs,
    settings: &Settings,
) -> Result<(Box<dyn ContentSource>, ProgressUnit)> {
    if let Some(dir) = &args.source_dir {
        return Ok((Box::new(DirectorySource::new(dir)), ProgressUnit::Entries));
    }
    let content = ContentRef::parse(&settings.repository.value, &settings.reference.value)?;
    let source = ArchiveSource::for_ref(&content, &settings.archive_base.value);
    info!(url = source.url(), "resolved template archive");
    Ok((Box::new(source), ProgressUnit::Bytes))
}

fn absolute_target(target: &Path) -> Result<PathBuf> {
    if target.is_absolute() {
        return Ok(target.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(target))
}

pub(crate) fn run_install_command(
    args: &InstallArgs,
    settings: &Settings,
    style: OutputStyle,
    confirmer: &mut dyn Confirmer,
    cancel: CancelToken,
) -> Result<InstallOutcome> {
    let (source, unit) = build_source(args, settings)?;
    let target = absolute_target(args.target.as_deref().unwrap_or(Path::new(".")))?;
    let target_exists = target.exists();

    if args.dry_run {
        let layout = if target_exists {
            validate_target(&target, false)?
        } else {
            TargetLayout::new(&target)
        };
        return Ok(InstallOutcome::DryRun(plan(&layout, managed_entries())));
    }

    let create_missing = !target_exists
        && confirmer.confirm(&format!("{} does not exist. Create it?", target.display()))?;
    if !target_exists && !create_missing {
        bail!(
            "install declined: {} does not exist and was not created",
            target.display()
        );
    }
    let layout = validate_target(&target, create_missing)?;

    let replaced = plan(&layout, managed_entries())
        .into_iter()
        .filter(|change| change.action == PlannedAction::BackupAndReplace)
        .count();
    if replaced > 0
        && !confirmer.confirm(&format!(
            "{replaced} existing entries in {} will be backed up and replaced. Continue?",
            target.display()
        ))?
    {
        bail!("install declined: {} was left unchanged", target.display());
    }

    let options = RunOptions {
        cancel,
        post_install: PostInstallOptions {
            skip_dependencies: settings.skip_dependencies.value,
        },
        ..RunOptions::default()
    };
    let observer_style = if args.json { OutputStyle::Plain } else { style };
    let mut observer = TerminalObserver::new(observer_style, unit);
    let report = run(&layout, source.as_ref(), &options, &mut observer)?;
    Ok(InstallOutcome::Installed(report))
}

pub(crate) fn format_install_outcome(
    outcome: &InstallOutcome,
    style: OutputStyle,
    json: bool,
) -> Result<Vec<String>> {
    if json {
        let rendered = match outcome {
            InstallOutcome::DryRun(changes) => serde_json::to_string_pretty(changes),
            InstallOutcome::Installed(report) => serde_json::to_string_pretty(report),
        }
        .context("failed to encode install output as JSON")?;
        return Ok(vec![rendered]);
    }
    Ok(match outcome {
        InstallOutcome::DryRun(changes) => format_plan_lines(changes, style),
        InstallOutcome::Installed(report) => format_report_lines(report, style),
    })
}

/// Lines for stderr. JSON output already carries the warnings.
pub(crate) fn install_warning_lines(outcome: &InstallOutcome, json: bool) -> Vec<String> {
    match outcome {
        InstallOutcome::Installed(report) if !json => format_warning_lines(&report.warnings),
        _ => Vec::new(),
    }
}

pub(crate) fn run_backups_command(target: Option<&Path>) -> Result<Vec<BackupSet>> {
    let target = absolute_target(target.unwrap_or(Path::new(".")))?;
    if !target.is_dir() {
        bail!("target {} is not a directory", target.display());
    }
    list_backups(&TargetLayout::new(target), managed_entries())
}

pub(crate) fn format_backups_output(
    sets: &[BackupSet],
    style: OutputStyle,
    json: bool,
) -> Result<Vec<String>> {
    if json {
        let rendered =
            serde_json::to_string_pretty(sets).context("failed to encode backups as JSON")?;
        return Ok(vec![rendered]);
    }
    Ok(format_backup_set_lines(sets, style))
}
