//! Fetch orchestration: locator -> commit -> cached archive -> tree

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use super::cache::{ArchiveCache, default_cache_dir};
use super::extract::extract;
use super::progress::{DownloadProgress, OnData};
use super::refs::{self, RefSource};
use super::transport::{Transport, TransportError};
use crate::error::{Result, TargitError};
use crate::locator::{self, ArchiveType, DEFAULT_REF, FALLBACK_REF, Host, RepoReference};

/// Abort an archive transfer after this long without receiving a chunk
pub const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for [`download`] and [`download_and_extract`]
#[derive(Clone)]
pub struct FetchOptions {
    pub archive_type: ArchiveType,
    pub cache_dir: PathBuf,
    pub default_host: Host,
    /// Re-download even when the archive is already cached
    pub force: bool,
    /// Check the repository exists before downloading
    pub probe: bool,
    pub github_token: Option<String>,
    pub inactivity_timeout: Duration,
    pub on_data: Option<OnData>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            archive_type: ArchiveType::default(),
            cache_dir: default_cache_dir(),
            default_host: Host::default(),
            force: false,
            probe: true,
            github_token: None,
            inactivity_timeout: DOWNLOAD_INACTIVITY_TIMEOUT,
            on_data: None,
        }
    }
}

impl FetchOptions {
    /// Options rooted at an explicit cache directory
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Install a progress callback receiving `(content_length, chunk)`
    pub fn on_data<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<u64>, &[u8]) + Send + Sync + 'static,
    {
        self.on_data = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("archive_type", &self.archive_type)
            .field("cache_dir", &self.cache_dir)
            .field("default_host", &self.default_host)
            .field("force", &self.force)
            .field("probe", &self.probe)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("inactivity_timeout", &self.inactivity_timeout)
            .field("on_data", &self.on_data.is_some())
            .finish()
    }
}

/// Resolve `uri` to a commit and make sure its archive is in the cache.
///
/// Returns the path of the cached archive. A cached archive is returned
/// without any transfer unless `options.force` is set.
pub async fn download<T: Transport>(
    transport: &T,
    uri: &str,
    options: &FetchOptions,
) -> Result<PathBuf> {
    let reference = parse_uri(uri, options)?;
    let cache = ArchiveCache::new(&options.cache_dir);
    let entry_dir = cache.ensure_dir(&reference).await?;

    let token = options.github_token.as_deref();
    let resolution = refs::resolve(transport, &cache, &reference, &entry_dir, token).await?;
    if resolution.source == RefSource::Empty {
        log::warn!("No refs available for {}, neither remote nor cached", reference);
    }

    let (reference, commit) = match resolution.commit {
        Some(commit) => (reference, commit),
        None if reference.git_ref() == DEFAULT_REF => {
            let fallback = reference.with_ref(FALLBACK_REF);
            log::info!(
                "Ref '{}' not found for {}, retrying with '{}'",
                DEFAULT_REF,
                reference,
                FALLBACK_REF
            );
            match refs::lookup_commit(&resolution.refs, FALLBACK_REF) {
                Some(commit) => {
                    let commit = commit.to_string();
                    (fallback, commit)
                }
                None => {
                    return Err(TargitError::RefNotFound {
                        reference: fallback.to_string(),
                    });
                }
            }
        }
        None => {
            return Err(TargitError::RefNotFound {
                reference: reference.to_string(),
            });
        }
    };
    log::debug!("Resolved {} to {}", reference, commit);

    let archive_path = cache.locate(&reference, &commit, options.archive_type);
    if !options.force && ArchiveCache::exists(&archive_path).await {
        log::info!("Using cached archive {}", archive_path.display());
        return Ok(archive_path);
    }

    let url = reference.archive_url(options.archive_type);
    fetch_archive(transport, &cache, &entry_dir, url, &archive_path, options).await?;

    Ok(archive_path)
}

/// Optionally probe the repository, then [`download`] and [`extract`] into `to`
pub async fn download_and_extract<T: Transport>(
    transport: &T,
    uri: &str,
    to: &Path,
    options: &FetchOptions,
) -> Result<PathBuf> {
    let reference = parse_uri(uri, options)?;

    if options.probe {
        match transport.probe(reference.canonical_url()).await {
            Ok(()) => {}
            Err(TransportError::Status { url, status }) => {
                return Err(TargitError::RepoLookupFailed { url, status });
            }
            Err(e) => log::warn!("Repository probe failed, attempting download anyway: {}", e),
        }
    }

    let archive = download(transport, uri, options).await?;
    extract(&archive, to).await
}

fn parse_uri(uri: &str, options: &FetchOptions) -> Result<RepoReference> {
    if uri.trim().is_empty() {
        return Err(TargitError::InvalidArgument(
            "Expected uri to be a non-empty string".to_string(),
        ));
    }
    locator::parse(uri, options.default_host)
}

/// Stream `url` into a temporary file next to `dest` and rename it into place
async fn fetch_archive<T: Transport>(
    transport: &T,
    cache: &ArchiveCache,
    entry_dir: &Path,
    url: &str,
    dest: &Path,
    options: &FetchOptions,
) -> Result<()> {
    log::info!("Downloading {}", url);

    let stream = transport
        .open(url)
        .await
        .map_err(|e| download_failed(url, e))?;

    let pending = cache.begin_archive(entry_dir)?;
    let mut file = pending.writer()?;
    let mut progress = DownloadProgress::new(options.on_data.as_ref(), stream.content_length);
    let mut body = stream.body;

    loop {
        let chunk = match timeout(options.inactivity_timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => return Err(download_failed(url, e)),
            Ok(None) => break,
            Err(_) => {
                return Err(TargitError::DownloadFailed {
                    url: url.to_string(),
                    status: None,
                    reason: format!(
                        "no data received for {} seconds ({} bytes downloaded)",
                        options.inactivity_timeout.as_secs(),
                        progress.received()
                    ),
                });
            }
        };

        file.write_all(&chunk)
            .await
            .map_err(|e| TargitError::io(pending.path(), e))?;
        progress.chunk(&chunk);
    }

    if let Some(expected) = progress.total()
        && progress.received() != expected
    {
        return Err(TargitError::DownloadFailed {
            url: url.to_string(),
            status: None,
            reason: format!(
                "expected {} bytes, received {}",
                expected,
                progress.received()
            ),
        });
    }

    file.flush()
        .await
        .map_err(|e| TargitError::io(pending.path(), e))?;
    file.sync_all()
        .await
        .map_err(|e| TargitError::io(pending.path(), e))?;
    drop(file);

    pending.commit(dest)?;
    log::info!(
        "Saved {} bytes to {}",
        progress.received(),
        dest.display()
    );
    Ok(())
}

fn download_failed(url: &str, error: TransportError) -> TargitError {
    TargitError::DownloadFailed {
        url: url.to_string(),
        status: error.status(),
        reason: error.to_string(),
    }
}
