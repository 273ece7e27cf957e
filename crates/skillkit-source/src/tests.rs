use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use flate2::write::GzEncoder;
use flate2::Compression;
use skillkit_core::{managed_entries, CancelToken};

use super::*;
use crate::archive::{extract_tar_gz, strip_rel_components};

fn test_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("skillkit-source-test-{name}-{nanos}"));
    fs::create_dir_all(&path).expect("must create test dir");
    path
}

fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *contents)
            .expect("must append tar entry");
    }
    builder
        .into_inner()
        .expect("must finish tar")
        .finish()
        .expect("must finish gzip")
}

fn write_tarball(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join("fixture.tar.gz");
    fs::write(&path, tarball(entries)).expect("must write tarball");
    path
}

/// Serves exactly one HTTP response and returns the URL to request.
fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("must bind listener");
    let addr = listener.local_addr().expect("must read addr");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("must accept");
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = stream.read(&mut buf).expect("must read request");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        let head = format!(
            "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("must write head");
        stream.write_all(&body).expect("must write body");
    });
    format!("http://{addr}/acme/templates/archive/main.tar.gz")
}

#[test]
fn strip_rel_components_drops_leading_dirs() {
    assert_eq!(
        strip_rel_components(Path::new("templates-main/.claude/settings.json"), 1),
        Some(PathBuf::from(".claude/settings.json"))
    );
    assert_eq!(
        strip_rel_components(Path::new("templates-main"), 1),
        None
    );
}

#[test]
fn extract_tar_gz_strips_top_level_directory() {
    let dir = test_dir("extract");
    let archive = write_tarball(
        &dir,
        &[
            ("templates-main/.claude/settings.json", b"{}"),
            ("templates-main/.claude/skills/review/SKILL.md", b"# review"),
            ("templates-main/README.md", b"readme"),
        ],
    );
    let out = dir.join("out");
    fs::create_dir_all(&out).expect("must create out dir");

    let unpacked = extract_tar_gz(&archive, &out, 1).expect("must extract");
    assert_eq!(unpacked, 3);
    assert_eq!(
        fs::read_to_string(out.join(".claude/skills/review/SKILL.md")).expect("must read"),
        "# review"
    );
    assert!(out.join("README.md").is_file());
    assert!(!out.join("templates-main").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn extract_tar_gz_rejects_parent_dir_escape() {
    let dir = test_dir("escape");
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let contents = b"owned";
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    // Bypass the builder's own path validation to produce a hostile entry.
    let name = b"templates-main/../../escaped.txt";
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_cksum();
    builder
        .append(&header, &contents[..])
        .expect("must append raw entry");
    let bytes = builder
        .into_inner()
        .expect("must finish tar")
        .finish()
        .expect("must finish gzip");
    let archive = dir.join("hostile.tar.gz");
    fs::write(&archive, bytes).expect("must write archive");
    let out = dir.join("out");
    fs::create_dir_all(&out).expect("must create out dir");

    let err = extract_tar_gz(&archive, &out, 1).expect_err("escape must be rejected");
    assert!(err.to_string().contains("escapes the extraction root"));
    assert!(!dir.join("escaped.txt").exists());

    let _ = fs::remove_dir_all(&dir);
}

fn write_raw_entry_archive(dir: &Path, name: &[u8]) -> PathBuf {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let contents = b"owned";
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_cksum();
    builder
        .append(&header, &contents[..])
        .expect("must append raw entry");
    let bytes = builder
        .into_inner()
        .expect("must finish tar")
        .finish()
        .expect("must finish gzip");
    let archive = dir.join("hostile.tar.gz");
    fs::write(&archive, bytes).expect("must write archive");
    archive
}

#[test]
fn extract_tar_gz_rejects_absolute_entry() {
    let dir = test_dir("absolute");
    let target = dir.join("abs.txt");
    let name = target.to_str().expect("temp path must be utf-8").to_string();
    assert!(name.len() < 100, "name must fit the legacy header field");
    let archive = write_raw_entry_archive(&dir, name.as_bytes());
    let out = dir.join("out");
    fs::create_dir_all(&out).expect("must create out dir");

    let err = extract_tar_gz(&archive, &out, 1).expect_err("absolute entry must be rejected");
    assert!(err.to_string().contains("escapes the extraction root"));
    assert!(!target.exists());
    assert!(fs::read_dir(&out).expect("must read out").next().is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[cfg(unix)]
#[test]
fn extract_tar_gz_rejects_writes_through_symlinked_directory() {
    let dir = test_dir("symlink-escape");
    let outside = dir.join("outside");
    fs::create_dir_all(&outside).expect("must create outside dir");

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut link = tar::Header::new_gnu();
    link.set_entry_type(tar::EntryType::Symlink);
    link.set_size(0);
    link.set_mode(0o777);
    link.set_link_name(&outside).expect("must set link name");
    builder
        .append_data(&mut link, "top/.claude", std::io::empty())
        .expect("must append symlink");
    let contents = b"owned";
    let mut file = tar::Header::new_gnu();
    file.set_size(contents.len() as u64);
    file.set_mode(0o644);
    file.set_entry_type(tar::EntryType::Regular);
    builder
        .append_data(&mut file, "top/.claude/evil", &contents[..])
        .expect("must append file");
    let bytes = builder
        .into_inner()
        .expect("must finish tar")
        .finish()
        .expect("must finish gzip");
    let archive = dir.join("symlink.tar.gz");
    fs::write(&archive, bytes).expect("must write archive");
    let out = dir.join("out");
    fs::create_dir_all(&out).expect("must create out dir");

    let err = extract_tar_gz(&archive, &out, 1).expect_err("write through symlink must fail");
    assert!(err.to_string().contains("would be written through symlink"));
    assert!(!outside.join("evil").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn extract_tar_gz_fails_when_nothing_survives_stripping() {
    let dir = test_dir("empty");
    let archive = write_tarball(&dir, &[("only-top-level-file", b"x")]);
    let out = dir.join("out");
    fs::create_dir_all(&out).expect("must create out dir");

    let err = extract_tar_gz(&archive, &out, 1).expect_err("empty result must fail");
    assert!(err.to_string().contains("contained no entries"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn staged_content_is_removed_on_drop() {
    let parent = test_dir("staging");
    let staged = StagedContent::new_in(&parent).expect("must create staging");
    let scratch = staged.scratch_dir().to_path_buf();
    assert!(staged.tree().is_dir());
    assert_eq!(
        staged.entry_path(&managed_entries()[0]),
        staged.tree().join(".claude")
    );

    drop(staged);
    assert!(!scratch.exists(), "staging dir must be released on drop");

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn directory_source_copies_tree_without_vcs_metadata() {
    let root = test_dir("directory-source");
    let source_root = root.join("templates");
    fs::create_dir_all(source_root.join(".claude/agents")).expect("must create agents");
    fs::create_dir_all(source_root.join(".git")).expect("must create git dir");
    fs::write(source_root.join(".claude/agents/reviewer.md"), "agent").expect("must write");
    fs::write(source_root.join("LICENSE"), "MIT").expect("must write");

    let staged = StagedContent::new_in(&root).expect("must create staging");
    let source = DirectorySource::new(&source_root);
    let mut events = Vec::new();
    source
        .fetch(&staged, &CancelToken::new(), &mut |event| events.push(event))
        .expect("must copy tree");

    assert!(staged.tree().join(".claude/agents/reviewer.md").is_file());
    assert!(staged.tree().join("LICENSE").is_file());
    assert!(!staged.tree().join(".git").exists());
    assert_eq!(events.last().and_then(|event| event.total), Some(3));
    assert!(source.describe().starts_with("directory "));

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn directory_source_rejects_missing_root() {
    let root = test_dir("directory-missing");
    let staged = StagedContent::new_in(&root).expect("must create staging");
    let err = DirectorySource::new(root.join("absent"))
        .fetch(&staged, &CancelToken::new(), &mut |_| {})
        .expect_err("missing root must fail");
    assert!(err.to_string().contains("not a directory"));

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn directory_source_honors_cancellation() {
    let root = test_dir("directory-cancel");
    let source_root = root.join("templates");
    fs::create_dir_all(source_root.join(".claude")).expect("must create tree");
    let staged = StagedContent::new_in(&root).expect("must create staging");
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = DirectorySource::new(&source_root)
        .fetch(&staged, &cancel, &mut |_| {})
        .expect_err("cancelled copy must fail");
    assert!(err.to_string().contains("cancelled"));

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn archive_source_downloads_and_extracts() {
    let root = test_dir("archive-source");
    let body = tarball(&[
        ("templates-main/.claude/settings.json", b"{\"hooks\":{}}"),
        ("templates-main/LICENSE", b"MIT"),
    ]);
    let body_len = body.len() as u64;
    let url = serve_once("HTTP/1.1 200 OK", body);

    let staged = StagedContent::new_in(&root).expect("must create staging");
    let source = ArchiveSource::new(url.clone());
    let mut events = Vec::new();
    source
        .fetch(&staged, &CancelToken::new(), &mut |event| events.push(event))
        .expect("must download and extract");

    assert_eq!(source.describe(), url);
    assert!(staged.tree().join(".claude/settings.json").is_file());
    assert_eq!(
        fs::read_to_string(staged.tree().join("LICENSE")).expect("must read license"),
        "MIT"
    );
    let last = events.last().expect("progress must be reported");
    assert_eq!(last.completed, body_len);
    assert_eq!(last.total, Some(body_len));
    assert!(!staged.scratch_dir().join("archive.tar.gz.part").exists());

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn archive_source_reports_http_errors() {
    let root = test_dir("archive-404");
    let url = serve_once("HTTP/1.1 404 Not Found", b"missing".to_vec());
    let staged = StagedContent::new_in(&root).expect("must create staging");

    let err = ArchiveSource::new(url)
        .fetch(&staged, &CancelToken::new(), &mut |_| {})
        .expect_err("404 must fail");
    assert!(err.to_string().contains("HTTP 404"));
    assert!(fs::read_dir(staged.tree()).expect("must read tree").next().is_none());

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn archive_source_reports_unreachable_host() {
    let root = test_dir("archive-unreachable");
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("must bind listener");
        listener.local_addr().expect("must read addr").port()
    };
    let staged = StagedContent::new_in(&root).expect("must create staging");

    let err = ArchiveSource::new(format!("http://127.0.0.1:{port}/a/b/archive/main.tar.gz"))
        .fetch(&staged, &CancelToken::new(), &mut |_| {})
        .expect_err("closed port must fail");
    assert!(err.to_string().contains("failed to request"));

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn archive_source_stops_promptly_when_cancelled_during_stalled_body() {
    let root = test_dir("archive-stalled");
    let listener = TcpListener::bind("127.0.0.1:0").expect("must bind listener");
    let addr = listener.local_addr().expect("must read addr");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("must accept");
        let mut buf = [0_u8; 1024];
        let _ = stream.read(&mut buf);
        let head = "HTTP/1.1 200 OK\r\nContent-Length: 100000\r\nConnection: close\r\n\r\n";
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&[0_u8; 10]);
        let _ = stream.flush();
        // Hold the connection open without sending the rest of the body.
        thread::sleep(Duration::from_secs(10));
    });

    let staged = StagedContent::new_in(&root).expect("must create staging");
    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        canceller.cancel();
    });

    let started = Instant::now();
    let err = ArchiveSource::new(format!("http://{addr}/a/b/archive/main.tar.gz"))
        .fetch(&staged, &cancel, &mut |_| {})
        .expect_err("cancelled download must fail");
    let elapsed = started.elapsed();

    assert!(err.to_string().contains("download cancelled"), "unexpected error: {err:#}");
    assert!(elapsed < Duration::from_secs(3), "cancellation took {elapsed:?}");
    assert!(!staged.scratch_dir().join("archive.tar.gz.part").exists());

    drop(staged);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn archive_source_for_ref_uses_archive_url() {
    let content = skillkit_core::ContentRef::parse("acme/templates", "v2").expect("must parse");
    let source = ArchiveSource::for_ref(&content, "https://example.test");
    assert_eq!(
        source.url(),
        "https://example.test/acme/templates/archive/v2.tar.gz"
    );
}

#[test]
fn remove_path_handles_files_dirs_and_missing() {
    let root = test_dir("remove-path");
    let file = root.join("file.txt");
    let dir = root.join("dir");
    fs::write(&file, "x").expect("must write file");
    fs::create_dir_all(dir.join("nested")).expect("must create dir");

    remove_path(&file).expect("must remove file");
    remove_path(&dir).expect("must remove dir");
    remove_path(&root.join("absent")).expect("missing path is fine");
    assert!(!path_exists(&file));
    assert!(!path_exists(&dir));

    let _ = fs::remove_dir_all(&root);
}
