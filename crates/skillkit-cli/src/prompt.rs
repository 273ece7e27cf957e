use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use tracing::warn;

pub(crate) trait Confirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Answers every prompt with yes; backs `--yes`.
pub(crate) struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

pub(crate) struct TerminalConfirmer {
    interactive: bool,
}

impl TerminalConfirmer {
    pub(crate) fn new(stdin_is_terminal: bool) -> Self {
        Self {
            interactive: stdin_is_terminal,
        }
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if !self.interactive {
            warn!("stdin is not a terminal; treating '{prompt}' as declined (pass --yes to proceed)");
            return Ok(false);
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("failed to read confirmation")
    }
}
