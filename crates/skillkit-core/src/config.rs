use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Values read from `config.toml`. Every field is optional; flags and
/// environment variables take precedence over anything set here.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SkillkitConfig {
    pub repository: Option<String>,
    pub reference: Option<String>,
    pub archive_base: Option<String>,
    pub skip_dependencies: Option<bool>,
}

impl SkillkitConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse skillkit config")
    }

    /// Reads `path`. A missing file yields the empty config unless `required`
    /// is set, which is the case when the user named the file explicitly.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config file: {}", path.display()));
            }
        };

        Self::from_toml_str(&raw).with_context(|| format!("invalid config file: {}", path.display()))
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    resolve_default_config_path(
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        std::env::var("HOME").ok().as_deref(),
        std::env::var("APPDATA").ok().as_deref(),
    )
}

pub(crate) fn resolve_default_config_path(
    xdg_config_home: Option<&str>,
    home: Option<&str>,
    app_data: Option<&str>,
) -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = app_data
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("APPDATA is not set; cannot resolve config path"))?;
        return Ok(PathBuf::from(app_data).join("skillkit").join("config.toml"));
    }

    if let Some(xdg) = xdg_config_home.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(xdg).join("skillkit").join("config.toml"));
    }

    let home = home
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("HOME is not set; cannot resolve config path"))?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("skillkit")
        .join("config.toml"))
}
