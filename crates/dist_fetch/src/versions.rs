use std::{collections::BTreeSet, fmt, str::FromStr};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::{
    FetchError, Fetcher,
    consts::{DIST_VERSIONS, VERSION_PREFIX},
};

/// A published version tag such as `v0.4.23` or `v2.0.0-rc1`.
///
/// Ordering follows semantic version precedence, so a pre-release sorts
/// before the release it precedes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DistVersion(semver::Version);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseDistVersionError {
    #[error("version tag '{0}' does not start with '{VERSION_PREFIX}'")]
    MissingPrefix(String),

    #[error("invalid version tag '{tag}': {reason}")]
    Invalid { tag: String, reason: String },
}

impl DistVersion {
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }
}

impl FromStr for DistVersion {
    type Err = ParseDistVersionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let Some(version) = tag.strip_prefix(VERSION_PREFIX) else {
            return Err(ParseDistVersionError::MissingPrefix(tag.to_string()));
        };
        semver::Version::parse(version)
            .map(Self)
            .map_err(|err| ParseDistVersionError::Invalid {
                tag: tag.to_string(),
                reason: err.to_string(),
            })
    }
}

impl fmt::Display for DistVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{VERSION_PREFIX}{}", self.0)
    }
}

/// Accepts every version.
pub fn all_versions(_: &DistVersion) -> bool {
    true
}

/// Accepts only versions without a pre-release label.
pub fn stable_versions(version: &DistVersion) -> bool {
    !version.is_prerelease()
}

/// Parses a version manifest, dropping lines that are not version tags.
fn parse_manifest(
    manifest: &str,
    include: impl Fn(&DistVersion) -> bool,
) -> Vec<DistVersion> {
    let versions: BTreeSet<DistVersion> = manifest
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.parse::<DistVersion>() {
            Ok(version) => Some(version),
            Err(err) => {
                trace!("skipping manifest entry: {err}");
                None
            }
        })
        .filter(|version| include(version))
        .collect();
    versions.into_iter().collect()
}

/// Fetches the version manifest of `package` and returns the versions
/// accepted by `include`, ascending and without duplicates.
///
/// Callers pick the latest version as the last element. An empty manifest
/// yields an empty list.
#[instrument(skip(fetcher, cancel, include))]
pub async fn dist_versions(
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
    package: &str,
    include: impl Fn(&DistVersion) -> bool,
) -> Result<Vec<DistVersion>, FetchError> {
    let path = format!("{}/{DIST_VERSIONS}", package.trim_end_matches('/'));
    let body = fetcher.fetch(cancel, &path).await?;
    let manifest = body.bytes().await?;
    Ok(parse_manifest(&String::from_utf8_lossy(&manifest), include))
}

/// Returns the highest published version of `package`, ignoring pre-releases
/// when `stable_only` is set.
pub async fn latest_dist_version(
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
    package: &str,
    stable_only: bool,
) -> Result<DistVersion, FetchError> {
    let include = if stable_only {
        stable_versions
    } else {
        all_versions
    };
    dist_versions(fetcher, cancel, package, include)
        .await?
        .pop()
        .ok_or_else(|| FetchError::NoVersionFound {
            package: package.to_string(),
        })
}
