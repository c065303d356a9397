//! Writing resources to disk.

use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::providers::{FetchError, Resource};

/// Result of a successful resource fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Written { bytes: u64 },
    /// Destination already existed.
    Skipped,
}

/// Makes a provider-supplied name safe to use as a single path component.
///
/// `"Show: Title?"` becomes `"Show - Title"`.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.replace(": ", " - ");
    let cleaned: String = name
        .chars()
        .filter_map(|c| match c {
            ':' | '/' | '\\' => Some('-'),
            '<' | '>' | '"' | '|' | '?' | '*' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sibling path a download is staged at: `theme.mp3` stages as `.theme.mp3.part`.
fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.part", name))
}

/// Where `resource` lands under `root`.
pub fn destination(root: &Path, resource: &Resource) -> PathBuf {
    let mut path = root.to_path_buf();
    if let Some(directory) = &resource.directory {
        path.push(sanitize_filename(directory));
    }
    path.push(sanitize_filename(&resource.filename));
    path
}

/// Fetches `resource` through its scheduler and writes it under `root`.
///
/// The existence check runs before admission so skipped resources never use
/// a quota slot. Bytes go to a staging file beside the destination that is
/// renamed into place once complete, so an interrupted write never leaves a
/// truncated destination behind.
pub async fn fetch_resource(
    root: &Path,
    resource: Resource,
    skip_existing: bool,
) -> Result<Fetched, FetchError> {
    let destination = destination(root, &resource);

    if skip_existing && fs::try_exists(&destination).await? {
        debug!("Skipping existing {}", destination.display());
        return Ok(Fetched::Skipped);
    }

    let scheduler = resource.scheduler.clone();
    let bytes = scheduler
        .submit(|| write_stream(&destination, resource))
        .await??;

    debug!("Wrote {} bytes to {}", bytes, destination.display());
    Ok(Fetched::Written { bytes })
}

async fn write_stream(destination: &Path, resource: Resource) -> Result<u64, FetchError> {
    let mut stream = resource.open().await?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut partial = PartialFile::create(destination).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        partial.file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    partial.finish().await?;

    Ok(written)
}

/// A download staged beside its destination. The staging file is removed on
/// drop unless finished.
struct PartialFile {
    path: PathBuf,
    destination: PathBuf,
    file: fs::File,
    finished: bool,
}

impl PartialFile {
    async fn create(destination: &Path) -> io::Result<Self> {
        let path = staging_path(destination);
        let file = fs::File::create(&path).await?;
        Ok(Self {
            path,
            destination: destination.to_path_buf(),
            file,
            finished: false,
        })
    }

    /// Syncs the staged bytes and renames them over the destination.
    async fn finish(mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.path, &self.destination).await?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove partial file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
