//! Ref resolution
//!
//! Resolution is two-tier: the host API is always asked first, the
//! persisted snapshot of the cache entry is used when the API cannot be
//! reached, and whatever was obtained is written back so the next offline
//! run still has something to work with.

use std::collections::BTreeMap;
use std::path::Path;

use super::cache::ArchiveCache;
use super::remote;
use super::transport::Transport;
use crate::error::Result;
use crate::locator::RepoReference;

/// Ref name (prefix stripped) -> full commit hash
pub type RefMap = BTreeMap<String, String>;

/// Refs shorter than this are never treated as abbreviated commit hashes
pub const MIN_SHORT_HASH_LEN: usize = 8;

/// Where a [`RefMap`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSource {
    Remote,
    Snapshot,
    /// Neither the API nor a snapshot was available
    Empty,
}

/// Outcome of resolving one ref
#[derive(Debug, Clone)]
pub struct Resolution {
    pub commit: Option<String>,
    pub refs: RefMap,
    pub source: RefSource,
}

/// Obtain the ref map for `reference`, falling back to the snapshot in
/// `entry_dir`, and persist the result.
pub async fn fetch_refs<T: Transport>(
    transport: &T,
    cache: &ArchiveCache,
    reference: &RepoReference,
    entry_dir: &Path,
    github_token: Option<&str>,
) -> Result<(RefMap, RefSource)> {
    let (refs, source) = match remote::list_refs(transport, reference, github_token).await {
        Ok(refs) => {
            log::debug!("Fetched {} refs for {}", refs.len(), reference);
            (refs, RefSource::Remote)
        }
        Err(e) => {
            log::warn!("Remote ref lookup failed, using cached refs: {}", e);
            match cache.load_refs(entry_dir).await {
                Some(refs) => (refs, RefSource::Snapshot),
                None => (RefMap::new(), RefSource::Empty),
            }
        }
    };

    // Nothing new was learned; leave whatever is on disk, readable or not.
    if source != RefSource::Empty {
        cache.store_refs(entry_dir, &refs).await?;
    }

    Ok((refs, source))
}

/// Find the commit a ref name or abbreviated hash points at
pub fn lookup_commit<'a>(refs: &'a RefMap, git_ref: &str) -> Option<&'a str> {
    if let Some(hash) = refs.get(git_ref) {
        return Some(hash);
    }

    if git_ref.len() < MIN_SHORT_HASH_LEN {
        return None;
    }

    refs.values()
        .find(|hash| hash.starts_with(git_ref))
        .map(String::as_str)
}

/// Resolve `reference`'s ref to a commit hash
pub async fn resolve<T: Transport>(
    transport: &T,
    cache: &ArchiveCache,
    reference: &RepoReference,
    entry_dir: &Path,
    github_token: Option<&str>,
) -> Result<Resolution> {
    let (refs, source) = fetch_refs(transport, cache, reference, entry_dir, github_token).await?;
    let commit = lookup_commit(&refs, reference.git_ref()).map(str::to_string);

    Ok(Resolution {
        commit,
        refs,
        source,
    })
}
