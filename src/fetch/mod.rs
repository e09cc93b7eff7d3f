//! Ref resolution, archive caching, download and extraction
//!
//! ## Module Organization
//!
//! - `transport` - The network boundary as a trait
//! - `http` - reqwest-backed transport
//! - `remote` - Host ref-listing APIs
//! - `refs` - Ref to commit resolution with snapshot fallback
//! - `cache` - Content-addressed archive cache
//! - `extract` - tar.gz / zip extraction with wrapper stripping
//! - `progress` - Download progress callback
//! - `core` - Download orchestration

pub mod cache;
mod core;
mod extract;
pub mod http;
mod progress;
pub mod refs;
mod remote;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export public API
pub use cache::{ArchiveCache, default_cache_dir};
pub use self::core::{DOWNLOAD_INACTIVITY_TIMEOUT, FetchOptions, download, download_and_extract};
pub use extract::extract;
pub use http::HttpTransport;
pub use progress::OnData;
pub use refs::{RefMap, RefSource, lookup_commit};
pub use remote::list_refs;
pub use transport::{ArchiveStream, JsonPage, Transport, TransportError};
