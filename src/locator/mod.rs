//! Repository locator parsing
//!
//! Turns the short references people type (`user/repo`, `github:user/repo#tag`,
//! `https://gitlab.com/user/repo`, `git@bitbucket.org:user/repo.git`) into a
//! [`RepoReference`]. Parsing is pure: no network or filesystem access.

pub mod host;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TargitError};

pub use host::{
    ArchiveType, ArchiveUrls, Host, SUPPORTED_ARCHIVE_TYPES, SUPPORTED_HOSTS, archive_urls,
    canonical_url,
};

/// Ref used when a locator carries no `#ref` suffix
pub const DEFAULT_REF: &str = "master";

/// Ref retried once when [`DEFAULT_REF`] cannot be resolved
pub const FALLBACK_REF: &str = "main";

// Alternatives are tried left to right: https URL, scp-style ssh, `host:` prefix, bare.
static LOCATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https://([^/]+)/|git@([^/]+):|([^/]+):)?([^/\s]+)/([^/\s#]+)(?:#(.+))?")
        .expect("locator pattern compiles")
});

/// A fully normalized reference to one repository at one ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReference {
    host: Host,
    user: String,
    repo: String,
    git_ref: String,
    canonical_url: String,
    archives: ArchiveUrls,
}

impl RepoReference {
    /// Build a reference, stripping a trailing `.git` from `repo` and
    /// defaulting an empty ref to [`DEFAULT_REF`].
    pub fn new(host: Host, user: &str, repo: &str, git_ref: &str) -> Self {
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        let git_ref = if git_ref.is_empty() { DEFAULT_REF } else { git_ref };

        Self {
            host,
            user: user.to_string(),
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
            canonical_url: canonical_url(host, user, repo),
            archives: archive_urls(host, user, repo, git_ref),
        }
    }

    /// Same repository, different ref
    pub fn with_ref(&self, git_ref: &str) -> Self {
        Self::new(self.host, &self.user, &self.repo, git_ref)
    }

    pub fn host(&self) -> Host {
        self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    pub fn archive_urls(&self) -> &ArchiveUrls {
        &self.archives
    }

    pub fn archive_url(&self, archive_type: ArchiveType) -> &str {
        self.archives.get(archive_type)
    }
}

impl std::fmt::Display for RepoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}#{}", self.host, self.user, self.repo, self.git_ref)
    }
}

/// Parse a locator string, using `default_host` when the input names none.
///
/// A host prefix that is not one of the supported services also resolves to
/// `default_host`.
pub fn parse(input: &str, default_host: Host) -> Result<RepoReference> {
    let caps = LOCATOR.captures(input).ok_or_else(|| TargitError::Parse {
        input: input.to_string(),
    })?;

    let host_segment = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
    let host = match host_segment {
        Some(segment) => Host::from_locator_segment(segment.as_str()).unwrap_or_else(|| {
            log::debug!(
                "Unrecognised host '{}' in {}, using {}",
                segment.as_str(),
                input,
                default_host
            );
            default_host
        }),
        None => default_host,
    };

    // Groups 4 and 5 are mandatory in the pattern.
    let (Some(user), Some(repo)) = (caps.get(4), caps.get(5)) else {
        return Err(TargitError::Parse {
            input: input.to_string(),
        });
    };
    // User and repo become cache directories, so they must name a real path segment.
    let bare_repo = repo.as_str().strip_suffix(".git").unwrap_or(repo.as_str());
    if is_dot_segment(user.as_str()) || bare_repo.is_empty() || is_dot_segment(bare_repo) {
        return Err(TargitError::Parse {
            input: input.to_string(),
        });
    }
    let git_ref = caps.get(6).map_or(DEFAULT_REF, |m| m.as_str());

    Ok(RepoReference::new(host, user.as_str(), repo.as_str(), git_ref))
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_parts(r: &RepoReference, host: Host, user: &str, repo: &str, git_ref: &str) {
        assert_eq!(r.host(), host);
        assert_eq!(r.user(), user);
        assert_eq!(r.repo(), repo);
        assert_eq!(r.git_ref(), git_ref);
    }

    #[test]
    fn empty_input_fails() {
        let err = parse("", Host::GitHub).unwrap_err();
        assert_eq!(err.code(), "E_PARSE_FAIL");
        assert_eq!(err.to_string(), "Could not parse ");
    }

    #[test]
    fn missing_separator_fails() {
        assert!(matches!(
            parse("justarepo", Host::GitHub),
            Err(TargitError::Parse { ref input }) if input == "justarepo"
        ));
    }

    #[test]
    fn dot_segments_are_rejected() {
        for input in ["u/..", "../..", "./r", "../r#main", "u/.", "u/..git", "u/.git", "gitlab:u/.."] {
            assert!(
                matches!(parse(input, Host::GitHub), Err(TargitError::Parse { input: ref i }) if i == input),
                "{input} should not parse"
            );
        }
        assert_eq!(parse("u/.dotfiles", Host::GitHub).unwrap().repo(), ".dotfiles");
        assert_eq!(parse("u/r..s", Host::GitHub).unwrap().repo(), "r..s");
    }

    #[test]
    fn host_prefix_forms_are_equivalent() {
        let forms = [
            "https://www.github.com/u/r#b",
            "https://github.com/u/r#b",
            "github:u/r#b",
            "git@github.com:u/r.git#b",
        ];
        let parsed: Vec<_> = forms
            .iter()
            .map(|f| parse(f, Host::GitLab).unwrap())
            .collect();
        for r in &parsed {
            assert_parts(r, Host::GitHub, "u", "r", "b");
        }
        assert!(parsed.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn https_urls_for_each_host() {
        let cases = [
            ("https://www.bitbucket.org/ewanharris/targit", Host::Bitbucket, "master"),
            ("https://bitbucket.org/ewanharris/targit#abranch", Host::Bitbucket, "abranch"),
            ("https://github.com/ewanharris/targit", Host::GitHub, "master"),
            ("https://www.gitlab.com/ewanharris/targit#abranch", Host::GitLab, "abranch"),
        ];
        for (input, host, git_ref) in cases {
            let r = parse(input, Host::GitHub).unwrap();
            assert_parts(&r, host, "ewanharris", "targit", git_ref);
        }
    }

    #[test]
    fn canonical_urls() {
        let bb = parse("bitbucket:ewanharris/targit", Host::GitHub).unwrap();
        assert_eq!(bb.canonical_url(), "https://bitbucket.org/ewanharris/targit");
        let gl = parse("gitlab:ewanharris/targit", Host::GitHub).unwrap();
        assert_eq!(gl.canonical_url(), "https://gitlab.com/ewanharris/targit");
    }

    #[test]
    fn bare_user_repo_uses_default_host() {
        let r = parse("ewanharris/targit", Host::Bitbucket).unwrap();
        assert_parts(&r, Host::Bitbucket, "ewanharris", "targit", "master");

        let r = parse("ewanharris/targit#abranch", Host::GitLab).unwrap();
        assert_parts(&r, Host::GitLab, "ewanharris", "targit", "abranch");
        assert_eq!(
            r.archive_url(ArchiveType::TarGz),
            "https://gitlab.com/ewanharris/targit/repository/archive.tar.gz?ref=abranch"
        );
    }

    #[test]
    fn ssh_locators_strip_git_suffix() {
        for (input, host) in [
            ("git@bitbucket.org:ewanharris/targit.git", Host::Bitbucket),
            ("git@github.com:ewanharris/targit.git", Host::GitHub),
            ("git@gitlab.com:ewanharris/targit.git", Host::GitLab),
        ] {
            let r = parse(input, Host::GitHub).unwrap();
            assert_parts(&r, host, "ewanharris", "targit", "master");
        }
    }

    #[test]
    fn unknown_host_prefix_falls_back_to_default() {
        let r = parse("example:u/r#v1", Host::GitLab).unwrap();
        assert_parts(&r, Host::GitLab, "u", "r", "v1");
    }

    #[test]
    fn with_ref_recomputes_archive_urls() {
        let r = parse("u/r", Host::GitHub).unwrap();
        let main = r.with_ref(FALLBACK_REF);
        assert_eq!(main.git_ref(), "main");
        assert_eq!(main.archive_urls().zip, "https://github.com/u/r/archive/main.zip");
        assert_eq!(main.to_string(), "github:u/r#main");
    }
}
