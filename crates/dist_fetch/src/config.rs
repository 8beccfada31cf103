//! Configuration of where and how release files are downloaded.
use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    ConfigError, FetchError, Fetcher, HttpFetcher, MultiFetcher,
    consts::{DEFAULT_GATEWAY, SOURCE_HTTPS, SOURCE_IPFS},
    get_dist_path_env,
};

/// Download settings, usually read from the `[download]`-like section of a
/// TOML file.
///
/// ```toml
/// download-sources = ["https://dweb.link", "HTTPS"]
/// dist-path = "/ipfs/bafy..."
/// user-agent = "my-updater/1.0"
/// fetch-limit = 1048576
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloadConfig {
    /// Ordered sources to download from. `HTTPS` is the default public
    /// gateway, `IPFS` a local node, anything else a gateway url.
    pub download_sources: Vec<String>,

    /// The distribution path. `IPFS_DIST_PATH` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Maximum size of a single download in bytes, `0` for no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_limit: Option<u64>,
}

impl DownloadConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml_edit::de::from_str(toml).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads the configuration stored at `path`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading download configuration from {}", path.display());
        let content = fs_err::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The configured sources, or just `HTTPS` when none are configured.
    pub fn download_sources(&self) -> Vec<&str> {
        if self.download_sources.is_empty() {
            vec![SOURCE_HTTPS]
        } else {
            self.download_sources.iter().map(String::as_str).collect()
        }
    }

    /// Builds a fetcher trying every usable download source in order.
    ///
    /// Sources that resolve to the same gateway are only used once.
    pub fn build_fetcher(&self) -> Result<Box<dyn Fetcher>, FetchError> {
        let dist_path = get_dist_path_env(self.dist_path.as_deref().unwrap_or_default());

        let mut seen = HashSet::new();
        let mut fetchers: Vec<Box<dyn Fetcher>> = Vec::new();
        for source in self.download_sources() {
            let gateway = match source.trim() {
                "" => {
                    return Err(FetchError::InvalidGateway {
                        gateway: source.to_string(),
                        reason: "empty download source".to_string(),
                    });
                }
                s if s.eq_ignore_ascii_case(SOURCE_HTTPS) => DEFAULT_GATEWAY.to_string(),
                s if s.eq_ignore_ascii_case(SOURCE_IPFS) => {
                    warn!("download source '{s}' needs a local IPFS node and is skipped");
                    continue;
                }
                s if s.contains("://") => s.to_string(),
                s => format!("https://{s}"),
            };

            let fetcher = self.http_fetcher(&gateway, &dist_path)?;
            if !seen.insert(fetcher.gateway().to_string()) {
                debug!("skipping duplicate download source '{source}'");
                continue;
            }
            fetchers.push(Box::new(fetcher));
        }

        match fetchers.len() {
            0 => Err(FetchError::NoFetchers),
            1 => Ok(fetchers.remove(0)),
            _ => Ok(Box::new(MultiFetcher::new(fetchers)?)),
        }
    }

    fn http_fetcher(&self, gateway: &str, dist_path: &str) -> Result<HttpFetcher, FetchError> {
        let mut fetcher = HttpFetcher::new()
            .with_gateway(gateway)?
            .with_dist_path(dist_path)?;
        if let Some(user_agent) = &self.user_agent {
            fetcher = fetcher.with_user_agent(user_agent);
        }
        if let Some(limit) = self.fetch_limit {
            fetcher = fetcher.with_fetch_limit(limit);
        }
        Ok(fetcher)
    }
}
