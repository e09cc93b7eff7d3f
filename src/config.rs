use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargitError};
use crate::fetch::{FetchOptions, default_cache_dir};
use crate::locator::{ArchiveType, Host};

/// Environment variables consulted for a GitHub token, in order
pub const TOKEN_ENV_VARS: [&str; 2] = ["GH_TOKEN", "GITHUB_TOKEN"];

/// User configuration, as read from `targit.toml`.
///
/// Values stay as strings here so that an invalid host or archive type is
/// reported through the same errors the library uses, not as a TOML error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub archive_type: String,
    pub default_host: String,
    pub cache_dir: Option<PathBuf>,
    pub force: bool,
    /// Check the repository exists before downloading
    pub probe: bool,
    pub inactivity_timeout_secs: u64,
    pub github_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_type: ArchiveType::default().to_string(),
            default_host: Host::default().to_string(),
            cache_dir: None,
            force: false,
            probe: true,
            inactivity_timeout_secs: 300,
            github_token: None,
        }
    }
}

/// `{config_dir}/targit/targit.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("targit").join("targit.toml"))
}

impl Config {
    /// Load configuration from `path`, or from [`default_config_path`] when
    /// `path` is `None`.
    ///
    /// An explicit path must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(TargitError::io(&path, e)),
        };

        log::debug!("Using config from: {}", path.display());
        Self::from_toml(&contents)
            .map_err(|e| TargitError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| TargitError::Config(e.to_string()))
    }

    /// Fill `github_token` from the environment when the file left it unset
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.github_token.is_some() {
            return;
        }
        self.github_token = TOKEN_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|token| !token.is_empty());
    }

    /// Validate and convert into options for the fetch pipeline
    pub fn options(&self) -> Result<FetchOptions> {
        let default_host: Host = self.default_host.parse()?;
        let archive_type: ArchiveType = self.archive_type.parse()?;

        Ok(FetchOptions {
            archive_type,
            cache_dir: self.cache_dir.clone().unwrap_or_else(default_cache_dir),
            default_host,
            force: self.force,
            probe: self.probe,
            github_token: self.github_token.clone(),
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_secs.max(1)),
            on_data: None,
        })
    }
}
