use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use skillkit_core::InstallWarning;
use skillkit_installer::{
    BackupSet, InstallObserver, InstallReport, InstalledEntry, Phase,
    PlannedAction, PlannedChange, RollbackSummary,
};
use skillkit_source::FetchProgress;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_terminal: bool, plain_requested: bool) -> OutputStyle {
    if stdout_is_terminal && !plain_requested {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "error" => "[ERR]",
        _ => "[..]",
    }
}

pub(crate) fn format_report_lines(report: &InstallReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if style == OutputStyle::Rich {
        for record in &report.backups {
            lines.push(render_status_line(
                style,
                "step",
                &format!(
                    "backed up {} -> {}",
                    record.original.display(),
                    record.backup.display()
                ),
            ));
        }
        for entry in &report.installed {
            lines.push(render_status_line(style, "step", &installed_message(entry)));
        }
    }
    lines.push(render_status_line(style, "ok", &report.summary_line()));
    lines
}

/// Warnings keep their badge in every style; they go to stderr so plain
/// stdout stays a single summary line.
pub(crate) fn format_warning_lines(warnings: &[InstallWarning]) -> Vec<String> {
    warnings
        .iter()
        .map(|warning| format!("{} {warning}", status_badge("warn")))
        .collect()
}

fn installed_message(entry: &InstalledEntry) -> String {
    if entry.renamed {
        format!(
            "installed {} (from {})",
            entry.destination.display(),
            entry.source_name
        )
    } else {
        format!("installed {}", entry.destination.display())
    }
}

pub(crate) fn format_plan_lines(changes: &[PlannedChange], style: OutputStyle) -> Vec<String> {
    let mut lines = changes
        .iter()
        .map(|change| {
            let verb = match change.action {
                PlannedAction::BackupAndReplace => "replace",
                PlannedAction::Create => "create",
            };
            render_status_line(
                style,
                "step",
                &format!("{verb} {}", change.destination.display()),
            )
        })
        .collect::<Vec<_>>();
    let replaced = changes
        .iter()
        .filter(|change| change.action == PlannedAction::BackupAndReplace)
        .count();
    lines.push(render_status_line(
        style,
        "ok",
        &format!("dry run: {replaced} backups, no changes made"),
    ));
    lines
}

pub(crate) fn format_backup_set_lines(sets: &[BackupSet], style: OutputStyle) -> Vec<String> {
    if sets.is_empty() {
        return vec![render_status_line(style, "ok", "no backups found")];
    }
    let mut lines = Vec::new();
    for set in sets {
        lines.push(render_status_line(
            style,
            "step",
            &format!("suffix={} entries={}", set.suffix, set.paths.len()),
        ));
        for path in &set.paths {
            lines.push(format!("  {}", path.display()));
        }
    }
    lines
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ProgressUnit {
    Bytes,
    Entries,
}

/// Renders installer callbacks on stderr. Plain style stays silent and leaves
/// reporting to the log.
pub(crate) struct TerminalObserver {
    style: OutputStyle,
    unit: ProgressUnit,
    progress_bar: Option<ProgressBar>,
    fetched: u64,
    started_at: Instant,
}

impl TerminalObserver {
    pub(crate) fn new(style: OutputStyle, unit: ProgressUnit) -> Self {
        Self {
            style,
            unit,
            progress_bar: None,
            fetched: 0,
            started_at: Instant::now(),
        }
    }

    fn finish_progress(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
            let amount = match self.unit {
                ProgressUnit::Bytes => format_download_size(self.fetched),
                ProgressUnit::Entries => format!("{} entries", self.fetched),
            };
            eprintln!(
                "{} {amount} in {}",
                colorize(progress_label_style(), "staged"),
                format_elapsed(self.started_at.elapsed())
            );
        }
    }

    fn start_progress(&self, total: Option<u64>) -> ProgressBar {
        let progress_bar = match total {
            Some(total) => ProgressBar::new(total.max(1)),
            None => ProgressBar::new_spinner(),
        };
        let counts = match (self.unit, total) {
            (ProgressUnit::Bytes, Some(_)) => "[{bar:20.cyan/blue}] {binary_bytes}/{binary_total_bytes}",
            (ProgressUnit::Bytes, None) => "{binary_bytes}",
            (ProgressUnit::Entries, Some(_)) => "[{bar:20.cyan/blue}] {pos}/{len}",
            (ProgressUnit::Entries, None) => "{pos}",
        };
        let template = format!("{{spinner:.cyan.bold}} {{msg:<10}} {counts} {{elapsed_precise}}");
        if let Ok(style) = ProgressStyle::with_template(&template) {
            progress_bar.set_style(style.progress_chars("=>-"));
        }
        progress_bar.set_message("staging");
        progress_bar.enable_steady_tick(Duration::from_millis(80));
        progress_bar
    }
}

impl InstallObserver for TerminalObserver {
    fn phase(&mut self, phase: Phase) {
        if self.style == OutputStyle::Plain {
            return;
        }
        if phase != Phase::Staging {
            self.finish_progress();
        }
        eprintln!("{}", colorize(section_style(), &format!("== {} ==", phase.as_str())));
    }

    fn fetch_progress(&mut self, progress: FetchProgress) {
        if self.style == OutputStyle::Plain {
            return;
        }
        if self.progress_bar.is_none() {
            self.started_at = Instant::now();
            self.progress_bar = Some(self.start_progress(progress.total));
        }
        if let Some(progress_bar) = &self.progress_bar {
            if let Some(total) = progress.total {
                progress_bar.set_length(total.max(1));
            }
            progress_bar.set_position(progress.completed);
        }
        self.fetched = progress.completed;
    }

    fn rolled_back(&mut self, summary: &RollbackSummary) {
        self.finish_progress();
        if self.style == OutputStyle::Plain {
            return;
        }
        let status = if summary.is_clean() { "ok" } else { "warn" };
        eprintln!(
            "{}",
            render_status_line(
                self.style,
                status,
                &format!(
                    "rolled back: restored={} removed={} skipped={} failed={}",
                    summary.restored, summary.removed, summary.skipped, summary.failed
                )
            )
        );
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn format_download_size(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
