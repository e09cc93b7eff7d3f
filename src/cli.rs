//! CLI argument parsing for targit

use clap::Parser;
use std::path::PathBuf;

use targit::config::Config;

/// Command-line arguments for targit
#[derive(Parser, Debug, Clone)]
#[command(name = "targit")]
#[command(version, about = "Download a hosted git repository at a ref and extract it")]
pub struct Args {
    /// Repository locator, e.g. `user/repo`, `gitlab:user/repo#v1.0.0`,
    /// `https://github.com/user/repo` or `git@bitbucket.org:user/repo.git`
    pub repo: String,

    /// Directory to extract into (must be missing or empty); defaults to the repo name
    pub location: Option<PathBuf>,

    /// Host used when the locator does not name one (bitbucket, github, gitlab)
    #[arg(long, value_name = "HOST")]
    pub service_name: Option<String>,

    /// Archive format to download (tar.gz or zip)
    #[arg(long, value_name = "TYPE")]
    pub archive_type: Option<String>,

    /// Cache root (default ~/.targit)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Re-download even when the archive is cached
    #[arg(long)]
    pub force: bool,

    /// Only populate the cache and print the archive path
    #[arg(long)]
    pub download_only: bool,

    /// Skip the repository existence check before downloading
    #[arg(long)]
    pub no_probe: bool,

    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log resolution and download details
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Overlay command-line values on a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.service_name {
            config.default_host = host.clone();
        }
        if let Some(archive_type) = &self.archive_type {
            config.archive_type = archive_type.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if self.force {
            config.force = true;
        }
        if self.no_probe {
            config.probe = false;
        }
    }
}
