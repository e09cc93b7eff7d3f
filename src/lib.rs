//! targit library
//!
//! Resolves a repository locator such as `user/repo#v1.2.0` against
//! Bitbucket, GitHub or GitLab, pins the ref to a commit, caches that
//! commit's archive under `~/.targit` and extracts it.
//!
//! ```no_run
//! # async fn run() -> targit::Result<()> {
//! use targit::fetch::{FetchOptions, HttpTransport, download_and_extract};
//!
//! let transport = HttpTransport::new().expect("http client");
//! let tree = download_and_extract(
//!     &transport,
//!     "github:rust-lang/log#master",
//!     std::path::Path::new("log"),
//!     &FetchOptions::default(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod locator;

// Public exports
pub use config::Config;
pub use error::{ErrorKind, Result, TargitError};
pub use fetch::{FetchOptions, download, download_and_extract, extract};
pub use locator::{ArchiveType, Host, RepoReference, parse};
