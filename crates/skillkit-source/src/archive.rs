use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use skillkit_core::{CancelToken, ContentRef};
use tar::EntryType;
use tracing::{debug, info};

use crate::{ensure_not_cancelled, ContentSource, FetchProgress, StagedContent};

const ARCHIVE_FILE_NAME: &str = "archive.tar.gz";
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;
const STRIP_COMPONENTS: usize = 1;
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fetches a `.tar.gz` snapshot over HTTP(S) and unpacks it into staging.
///
/// Forge archives wrap the repository in one top-level directory
/// (`<repo>-<ref>/`), which is stripped during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    url: String,
    timeout: Duration,
}

impl ArchiveSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn for_ref(content: &ContentRef, archive_base: &str) -> Self {
        Self::new(content.archive_url(archive_base))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ContentSource for ArchiveSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(
        &self,
        staged: &StagedContent,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<()> {
        let archive_path = staged.scratch_dir().join(ARCHIVE_FILE_NAME);
        download_archive(&self.url, &archive_path, self.timeout, cancel, progress)?;
        ensure_not_cancelled(cancel, "extraction")?;
        let unpacked = extract_tar_gz(&archive_path, staged.tree(), STRIP_COMPONENTS)?;
        info!(url = %self.url, entries = unpacked, "archive extracted");
        Ok(())
    }
}

fn download_archive(
    url: &str,
    archive_path: &Path,
    timeout: Duration,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(FetchProgress),
) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("skillkit/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .build()
        .context("failed to build http client")?;

    debug!(%url, "requesting archive");
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to request {url}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("download of {url} failed: HTTP {status}"));
    }

    let total = response.content_length();
    let chunks = spawn_body_reader(response)?;
    let part_path = archive_path.with_file_name(format!("{ARCHIVE_FILE_NAME}.part"));
    let result = (|| -> Result<()> {
        let mut file = File::create(&part_path)
            .with_context(|| format!("failed to create {}", part_path.display()))?;
        let mut completed = 0_u64;
        progress(FetchProgress { completed, total });
        loop {
            ensure_not_cancelled(cancel, "download")?;
            let chunk = match chunks.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(chunk) => {
                    chunk.with_context(|| format!("failed reading response body from {url}"))?
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("response body reader for {url} stopped unexpectedly"));
                }
            };
            if chunk.is_empty() {
                break;
            }
            file.write_all(&chunk)
                .with_context(|| format!("failed to write {}", part_path.display()))?;
            completed += chunk.len() as u64;
            progress(FetchProgress { completed, total });
        }
        file.flush()
            .with_context(|| format!("failed to flush {}", part_path.display()))?;

        if let Some(expected) = total {
            if completed != expected {
                return Err(anyhow!(
                    "download of {url} ended early: received {completed} of {expected} bytes"
                ));
            }
        }
        Ok(())
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&part_path);
        return Err(err);
    }

    fs::rename(&part_path, archive_path).with_context(|| {
        format!(
            "failed to move downloaded archive into place: {}",
            archive_path.display()
        )
    })?;
    Ok(())
}

/// Moves the blocking body reads onto their own thread so a stalled server
/// cannot hold off cancellation. An empty chunk marks the end of the body.
/// When the receiver is dropped the reader exits after its current read.
fn spawn_body_reader(
    mut response: reqwest::blocking::Response,
) -> Result<Receiver<io::Result<Vec<u8>>>> {
    let (tx, rx) = mpsc::sync_channel(4);
    thread::Builder::new()
        .name("skillkit-download".to_string())
        .spawn(move || loop {
            let mut buffer = vec![0_u8; DOWNLOAD_CHUNK_SIZE];
            match response.read(&mut buffer) {
                Ok(0) => {
                    let _ = tx.send(Ok(Vec::new()));
                    break;
                }
                Ok(read) => {
                    buffer.truncate(read);
                    if tx.send(Ok(buffer)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err));
                    break;
                }
            }
        })
        .context("failed to spawn download reader")?;
    Ok(rx)
}

/// Unpacks a gzip-compressed tarball into `dst`, dropping the first
/// `strip_components` path components of every entry. Returns how many
/// entries were written.
pub(crate) fn extract_tar_gz(
    archive_path: &Path,
    dst: &Path,
    strip_components: usize,
) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);

    let mut unpacked = 0_usize;
    for entry in archive
        .entries()
        .with_context(|| format!("failed to read archive {}", archive_path.display()))?
    {
        let mut entry = entry
            .with_context(|| format!("failed to read entry in {}", archive_path.display()))?;
        let entry_type = entry.header().entry_type();
        if !matches!(
            entry_type,
            EntryType::Regular | EntryType::Continuous | EntryType::Directory | EntryType::Symlink
        ) {
            // pax headers, hard links, device nodes
            continue;
        }

        let raw_path = entry
            .path()
            .context("archive entry has an unreadable path")?
            .into_owned();
        let relative = validated_relative_path(&raw_path)?;
        let Some(relative) = strip_rel_components(&relative, strip_components) else {
            continue;
        };

        let out_path = dst.join(&relative);
        ensure_no_symlink_ancestors(dst, &relative)?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        entry
            .unpack(&out_path)
            .with_context(|| format!("failed to unpack {}", out_path.display()))?;
        unpacked += 1;
    }

    if unpacked == 0 {
        return Err(anyhow!(
            "archive {} contained no entries after stripping {} component(s)",
            archive_path.display(),
            strip_components
        ));
    }
    Ok(unpacked)
}

fn validated_relative_path(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow!(
                    "archive entry escapes the extraction root: {}",
                    path.display()
                ));
            }
        }
    }
    Ok(out)
}

fn ensure_no_symlink_ancestors(root: &Path, relative: &Path) -> Result<()> {
    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if let Ok(metadata) = fs::symlink_metadata(&current) {
            if metadata.file_type().is_symlink() {
                return Err(anyhow!(
                    "archive entry {} would be written through symlink {}",
                    relative.display(),
                    current.display()
                ));
            }
        }
    }
    Ok(())
}

pub(crate) fn strip_rel_components(path: &Path, strip_components: usize) -> Option<PathBuf> {
    let components: Vec<_> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(value) => Some(value.to_os_string()),
            _ => None,
        })
        .collect();

    if components.len() <= strip_components {
        return None;
    }

    let mut out = PathBuf::new();
    for component in components.into_iter().skip(strip_components) {
        out.push(component);
    }
    Some(out)
}
