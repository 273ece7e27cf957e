use std::error::Error as _;
use std::path::PathBuf;

use super::*;
use crate::config::resolve_default_config_path;

#[test]
fn only_readme_is_renamed() {
    let renamed = managed_entries()
        .iter()
        .filter(|entry| entry.is_renamed())
        .map(|entry| entry.kind)
        .collect::<Vec<_>>();
    assert_eq!(renamed, vec![EntryKind::Readme]);

    let readme = managed_entries()
        .iter()
        .find(|entry| entry.kind == EntryKind::Readme)
        .expect("readme entry must exist");
    assert_eq!(readme.source_name, "README.md");
    assert_ne!(readme.dest_name, readme.source_name);
}

#[test]
fn managed_entries_keep_fixed_order_with_config_first() {
    let kinds = managed_entries()
        .iter()
        .map(|entry| entry.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            EntryKind::ConfigTree,
            EntryKind::DocsTree,
            EntryKind::LicenseFile,
            EntryKind::Readme,
        ]
    );
    let required = managed_entries()
        .iter()
        .filter(|entry| entry.required)
        .map(|entry| entry.source_name)
        .collect::<Vec<_>>();
    assert_eq!(required, vec![".claude"]);
}

#[test]
fn layout_paths_derive_from_root() {
    let layout = TargetLayout::new("/p");
    assert_eq!(layout.claude_dir(), PathBuf::from("/p/.claude"));
    assert_eq!(layout.hooks_dir(), PathBuf::from("/p/.claude/hooks"));
    assert_eq!(
        layout.settings_path(),
        PathBuf::from("/p/.claude/settings.json")
    );

    let readme = managed_entries()[3];
    assert_eq!(
        layout.entry_path(&readme),
        PathBuf::from("/p/SKILLKIT_README.md")
    );
    assert_eq!(
        layout.backup_path(&readme, "1700000000"),
        PathBuf::from("/p/SKILLKIT_README.md.backup.1700000000")
    );
}

#[test]
fn parse_backup_name_splits_at_last_marker() {
    assert_eq!(
        parse_backup_name(".claude.backup.1700000000-2"),
        Some((".claude", "1700000000-2"))
    );
    assert_eq!(
        parse_backup_name("SKILLKIT_README.md.backup.17"),
        Some(("SKILLKIT_README.md", "17"))
    );
    assert_eq!(parse_backup_name(".claude"), None);
    assert_eq!(parse_backup_name(".claude.backup."), None);
    assert_eq!(parse_backup_name(".backup.17"), None);
}

#[test]
fn content_ref_builds_archive_url() {
    let content = ContentRef::parse("acme/templates", "v1.2.0").expect("must parse");
    assert_eq!(
        content.archive_url("https://github.com/"),
        "https://github.com/acme/templates/archive/v1.2.0.tar.gz"
    );
    assert_eq!(content.to_string(), "acme/templates@v1.2.0");
}

#[test]
fn content_ref_accepts_nested_branch_names() {
    let content = ContentRef::parse("acme/templates", "release/2025").expect("must parse");
    assert_eq!(content.reference(), "release/2025");
}

#[test]
fn content_ref_rejects_malformed_input() {
    for (repository, reference) in [
        ("acme", "main"),
        ("acme/", "main"),
        ("/templates", "main"),
        ("acme/temp lates", "main"),
        ("acme/..", "main"),
        ("acme/templates", ""),
        ("acme/templates", "../main"),
        ("acme/templates", "main?x=1"),
        ("acme/templates", "feature//x"),
    ] {
        assert!(
            ContentRef::parse(repository, reference).is_err(),
            "{repository}@{reference} should be rejected"
        );
    }
}

#[test]
fn config_parses_known_keys() {
    let config = SkillkitConfig::from_toml_str(
        r#"
repository = "acme/templates"
reference = "stable"
skip_dependencies = true
"#,
    )
    .expect("must parse");
    assert_eq!(config.repository.as_deref(), Some("acme/templates"));
    assert_eq!(config.reference.as_deref(), Some("stable"));
    assert_eq!(config.archive_base, None);
    assert_eq!(config.skip_dependencies, Some(true));
}

#[test]
fn config_rejects_unknown_keys() {
    let err = SkillkitConfig::from_toml_str("repo = \"acme/templates\"\n")
        .expect_err("unknown key must fail");
    assert!(err.to_string().contains("failed to parse skillkit config"));
}

#[test]
fn config_missing_file_is_empty_unless_required() {
    let path = std::env::temp_dir().join(format!(
        "skillkit-core-missing-config-{}.toml",
        std::process::id()
    ));
    let config = SkillkitConfig::load(&path, false).expect("optional config may be absent");
    assert_eq!(config, SkillkitConfig::default());

    let err = SkillkitConfig::load(&path, true).expect_err("explicit config must exist");
    assert!(err.to_string().contains("failed to read config file"));
}

#[cfg(not(windows))]
#[test]
fn default_config_path_prefers_xdg_then_home() {
    assert_eq!(
        resolve_default_config_path(Some("/xdg"), Some("/home/u"), None).expect("xdg"),
        PathBuf::from("/xdg/skillkit/config.toml")
    );
    assert_eq!(
        resolve_default_config_path(Some(""), Some("/home/u"), None).expect("home"),
        PathBuf::from("/home/u/.config/skillkit/config.toml")
    );
    assert!(resolve_default_config_path(None, None, None).is_err());
}

#[test]
fn install_error_reports_kind_and_source() {
    let err = InstallError::CopyFailed {
        from: PathBuf::from("/stage/.claude"),
        to: PathBuf::from("/p/.claude"),
        cause: Box::new(std::io::Error::other("disk full")),
    };
    assert_eq!(err.kind(), "copy-failed");
    assert_eq!(
        err.to_string(),
        "failed to copy /stage/.claude into /p/.claude"
    );
    assert_eq!(
        err.source().map(|source| source.to_string()).as_deref(),
        Some("disk full")
    );
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let token = CancelToken::new();
    let observer = token.clone();
    assert!(!observer.is_cancelled());
    token.cancel();
    assert!(observer.is_cancelled());
}
