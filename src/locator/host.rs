//! Supported hosting services and their archive URL templates

use std::fmt;
use std::str::FromStr;

use crate::error::TargitError;

/// Host names accepted by configuration, in display order
pub const SUPPORTED_HOSTS: [&str; 3] = ["bitbucket", "github", "gitlab"];

/// Archive type names accepted by configuration
pub const SUPPORTED_ARCHIVE_TYPES: [&str; 2] = ["tar.gz", "zip"];

/// Hosting service a repository lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Host {
    Bitbucket,
    #[default]
    GitHub,
    GitLab,
}

impl Host {
    pub fn as_str(&self) -> &'static str {
        match self {
            Host::Bitbucket => "bitbucket",
            Host::GitHub => "github",
            Host::GitLab => "gitlab",
        }
    }

    /// Public web domain of the service
    pub fn domain(&self) -> &'static str {
        match self {
            Host::Bitbucket => "bitbucket.org",
            Host::GitHub => "github.com",
            Host::GitLab => "gitlab.com",
        }
    }

    /// Normalize a host segment taken from a locator.
    ///
    /// Accepts `github`, `github.com`, `www.github.com` and the same shapes
    /// for the other services. Returns `None` for anything else.
    pub fn from_locator_segment(segment: &str) -> Option<Self> {
        let lower = segment.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("www.").unwrap_or(&lower);
        let name = name
            .strip_suffix(".com")
            .or_else(|| name.strip_suffix(".org"))
            .unwrap_or(name);

        match name {
            "bitbucket" => Some(Host::Bitbucket),
            "github" => Some(Host::GitHub),
            "gitlab" => Some(Host::GitLab),
            _ => None,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Host {
    type Err = TargitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bitbucket" => Ok(Host::Bitbucket),
            "github" => Ok(Host::GitHub),
            "gitlab" => Ok(Host::GitLab),
            other => Err(TargitError::UnsupportedHost {
                host: other.to_string(),
            }),
        }
    }
}

/// Container format of a downloaded snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchiveType {
    #[default]
    TarGz,
    Zip,
}

impl ArchiveType {
    /// File extension used for cached archives (`tar.gz` or `zip`)
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveType::TarGz => "tar.gz",
            ArchiveType::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveType {
    type Err = TargitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tar.gz" => Ok(ArchiveType::TarGz),
            "zip" => Ok(ArchiveType::Zip),
            other => Err(TargitError::UnsupportedArchiveType {
                archive_type: other.to_string(),
            }),
        }
    }
}

/// Download URLs for each archive type of one repository ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUrls {
    pub tgz: String,
    pub zip: String,
}

impl ArchiveUrls {
    pub fn get(&self, archive_type: ArchiveType) -> &str {
        match archive_type {
            ArchiveType::TarGz => &self.tgz,
            ArchiveType::Zip => &self.zip,
        }
    }
}

/// Canonical web URL of a repository
pub fn canonical_url(host: Host, user: &str, repo: &str) -> String {
    format!("https://{}/{}/{}", host.domain(), user, repo)
}

/// Archive download URLs for `user/repo` at `git_ref` on `host`
pub fn archive_urls(host: Host, user: &str, repo: &str, git_ref: &str) -> ArchiveUrls {
    let base = canonical_url(host, user, repo);
    match host {
        Host::Bitbucket => ArchiveUrls {
            tgz: format!("{base}/get/{git_ref}.tar.gz"),
            zip: format!("{base}/get/{git_ref}.zip"),
        },
        Host::GitLab => ArchiveUrls {
            tgz: format!("{base}/repository/archive.tar.gz?ref={git_ref}"),
            zip: format!("{base}/repository/archive.zip?ref={git_ref}"),
        },
        Host::GitHub => ArchiveUrls {
            tgz: format!("{base}/archive/{git_ref}.tar.gz"),
            zip: format!("{base}/archive/{git_ref}.zip"),
        },
    }
}
