use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use skillkit_core::{
    default_config_path, SkillkitConfig, DEFAULT_ARCHIVE_BASE, DEFAULT_REFERENCE,
    DEFAULT_REPOSITORY,
};
use tracing::debug;

const ENV_REPO: &str = "SKILLKIT_REPO";
const ENV_REF: &str = "SKILLKIT_REF";
const ENV_ARCHIVE_BASE: &str = "SKILLKIT_ARCHIVE_BASE";
const ENV_SKIP_DEPS: &str = "SKILLKIT_SKIP_DEPS";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Origin {
    Flag,
    Env,
    File,
    Default,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::File => "file",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Setting<T> {
    pub(crate) value: T,
    pub(crate) origin: Origin,
}

/// Values given on the command line. `None` means the flag was absent.
#[derive(Clone, Debug, Default)]
pub(crate) struct SettingOverrides {
    pub(crate) repository: Option<String>,
    pub(crate) reference: Option<String>,
    pub(crate) archive_base: Option<String>,
    pub(crate) skip_dependencies: Option<bool>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Settings {
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) repository: Setting<String>,
    pub(crate) reference: Setting<String>,
    pub(crate) archive_base: Setting<String>,
    pub(crate) skip_dependencies: Setting<bool>,
}

pub(crate) fn load_settings(
    explicit_config: Option<&Path>,
    overrides: &SettingOverrides,
) -> Result<Settings> {
    let (config_path, file) = match explicit_config {
        Some(path) => (Some(path.to_path_buf()), SkillkitConfig::load(path, true)?),
        None => match default_config_path() {
            Ok(path) => {
                let file = SkillkitConfig::load(&path, false)?;
                (Some(path), file)
            }
            Err(err) => {
                debug!(error = %err, "no default config location");
                (None, SkillkitConfig::default())
            }
        },
    };

    resolve_settings(config_path, &file, overrides, |key| std::env::var(key).ok())
}

/// Applies flag > environment > file > default for each setting.
pub(crate) fn resolve_settings<E>(
    config_path: Option<PathBuf>,
    file: &SkillkitConfig,
    overrides: &SettingOverrides,
    env: E,
) -> Result<Settings>
where
    E: Fn(&str) -> Option<String>,
{
    let non_empty_env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
    let skip_env = match non_empty_env(ENV_SKIP_DEPS) {
        Some(raw) => Some(parse_bool_env(ENV_SKIP_DEPS, &raw)?),
        None => None,
    };

    Ok(Settings {
        config_path,
        repository: pick(
            overrides.repository.clone(),
            non_empty_env(ENV_REPO),
            file.repository.clone(),
            DEFAULT_REPOSITORY.to_string(),
        ),
        reference: pick(
            overrides.reference.clone(),
            non_empty_env(ENV_REF),
            file.reference.clone(),
            DEFAULT_REFERENCE.to_string(),
        ),
        archive_base: pick(
            overrides.archive_base.clone(),
            non_empty_env(ENV_ARCHIVE_BASE),
            file.archive_base.clone(),
            DEFAULT_ARCHIVE_BASE.to_string(),
        ),
        skip_dependencies: pick(
            overrides.skip_dependencies,
            skip_env,
            file.skip_dependencies,
            false,
        ),
    })
}

fn pick<T>(flag: Option<T>, env: Option<T>, file: Option<T>, default: T) -> Setting<T> {
    if let Some(value) = flag {
        return Setting {
            value,
            origin: Origin::Flag,
        };
    }
    if let Some(value) = env {
        return Setting {
            value,
            origin: Origin::Env,
        };
    }
    if let Some(value) = file {
        return Setting {
            value,
            origin: Origin::File,
        };
    }
    Setting {
        value: default,
        origin: Origin::Default,
    }
}

fn parse_bool_env(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid value for {key}: '{other}' (expected true or false)"),
    }
}

pub(crate) fn format_settings_lines(settings: &Settings) -> Vec<String> {
    let config_path = settings
        .config_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    vec![
        format!("config_file={config_path}"),
        format!(
            "repository={} ({})",
            settings.repository.value, settings.repository.origin
        ),
        format!(
            "reference={} ({})",
            settings.reference.value, settings.reference.origin
        ),
        format!(
            "archive_base={} ({})",
            settings.archive_base.value, settings.archive_base.origin
        ),
        format!(
            "skip_dependencies={} ({})",
            settings.skip_dependencies.value, settings.skip_dependencies.origin
        ),
    ]
}
