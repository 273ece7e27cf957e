use anyhow::{anyhow, Result};

pub const DEFAULT_REPOSITORY: &str = "skillkit-dev/skillkit-templates";
pub const DEFAULT_REFERENCE: &str = "main";
pub const DEFAULT_ARCHIVE_BASE: &str = "https://github.com";

/// A repository plus the branch or tag to install from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    owner: String,
    repo: String,
    reference: String,
}

impl ContentRef {
    pub fn parse(repository: &str, reference: &str) -> Result<Self> {
        let (owner, repo) = repository
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow!("repository must be '<owner>/<repo>': {repository}"))?;
        if !is_repo_token(owner) || !is_repo_token(repo) {
            return Err(anyhow!(
                "repository must be '<owner>/<repo>' using [A-Za-z0-9._-]: {repository}"
            ));
        }

        let reference = reference.trim();
        if reference.is_empty() {
            return Err(anyhow!("reference must not be empty"));
        }
        if reference.starts_with('/')
            || reference.ends_with('/')
            || reference.split('/').any(|part| part.is_empty() || part == "..")
            || reference
                .chars()
                .any(|ch| ch.is_whitespace() || matches!(ch, '?' | '#' | '\\' | '~' | '^' | ':'))
        {
            return Err(anyhow!("invalid reference: {reference}"));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference: reference.to_string(),
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn archive_url(&self, base: &str) -> String {
        format!(
            "{}/{}/{}/archive/{}.tar.gz",
            base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.reference
        )
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.reference)
    }
}

fn is_repo_token(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}
