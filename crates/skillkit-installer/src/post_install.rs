use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use skillkit_core::{InstallWarning, TargetLayout};
use tracing::{debug, info};

const DEPENDENCY_TOOL: &str = "npm";
const HOOK_SCRIPT_EXTENSIONS: [&str; 6] = ["sh", "py", "js", "mjs", "cjs", "ts"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostInstallOptions {
    pub skip_dependencies: bool,
}

/// Steps that follow a committed install. Failures come back as warnings and
/// never undo the installed files.
pub fn run_post_install(layout: &TargetLayout, options: &PostInstallOptions) -> Vec<InstallWarning> {
    let mut warnings = Vec::new();
    if options.skip_dependencies {
        debug!("dependency install skipped by request");
    } else if let Some(warning) = install_hook_dependencies(layout) {
        warnings.push(warning);
    }
    warnings.extend(mark_hooks_executable(layout));
    warnings
}

/// Runs `npm install` inside `.claude/hooks` when it carries a `package.json`.
pub fn install_hook_dependencies(layout: &TargetLayout) -> Option<InstallWarning> {
    install_hook_dependencies_with(
        layout,
        |tool| which::which(tool).ok(),
        run_dependency_install,
    )
}

pub(crate) fn install_hook_dependencies_with<Locate, Run>(
    layout: &TargetLayout,
    locate: Locate,
    run: Run,
) -> Option<InstallWarning>
where
    Locate: FnOnce(&str) -> Option<PathBuf>,
    Run: FnOnce(&Path, &Path) -> Result<()>,
{
    let hooks_dir = layout.hooks_dir();
    if !hooks_dir.join("package.json").is_file() {
        debug!(dir = %hooks_dir.display(), "no package.json; no dependencies to install");
        return None;
    }

    let Some(tool) = locate(DEPENDENCY_TOOL) else {
        return Some(InstallWarning::DependencyToolMissing {
            tool: DEPENDENCY_TOOL.to_string(),
            dir: hooks_dir,
        });
    };

    match run(&tool, &hooks_dir) {
        Ok(()) => {
            info!(dir = %hooks_dir.display(), "installed hook dependencies");
            None
        }
        Err(err) => Some(InstallWarning::DependencyInstallFailed {
            dir: hooks_dir,
            detail: format!("{err:#}"),
        }),
    }
}

fn run_dependency_install(tool: &Path, dir: &Path) -> Result<()> {
    let mut command = Command::new(tool);
    command
        .arg("install")
        .arg("--no-audit")
        .arg("--no-fund")
        .current_dir(dir);
    run_command(&mut command, "npm install failed")
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

pub(crate) fn is_hook_script(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|ext| HOOK_SCRIPT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Sets mode 0755 on the script files directly under `.claude/hooks`.
#[cfg(unix)]
pub fn mark_hooks_executable(layout: &TargetLayout) -> Vec<InstallWarning> {
    use std::os::unix::fs::PermissionsExt;

    let hooks_dir = layout.hooks_dir();
    let entries = match fs::read_dir(&hooks_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            return vec![InstallWarning::PermissionFailed {
                path: hooks_dir,
                detail: err.to_string(),
            }];
        }
    };

    let mut warnings = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warnings.push(InstallWarning::PermissionFailed {
                    path: hooks_dir.clone(),
                    detail: err.to_string(),
                });
                continue;
            }
        };
        let path = entry.path();
        let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
        if !is_file || !is_hook_script(&path) {
            continue;
        }
        if let Err(err) = fs::set_permissions(&path, fs::Permissions::from_mode(0o755)) {
            warnings.push(InstallWarning::PermissionFailed {
                path,
                detail: err.to_string(),
            });
            continue;
        }
        debug!(path = %path.display(), "marked hook executable");
    }
    warnings
}

#[cfg(not(unix))]
pub fn mark_hooks_executable(_layout: &TargetLayout) -> Vec<InstallWarning> {
    Vec::new()
}
