//! Utilities to resolve, download and unpack release binaries published on a
//! distribution gateway.
//!
//! A distribution is a tree of the form
//!
//! ```text
//! <dist path>/<package>/versions
//! <dist path>/<package>/<version>/<package>_<version>_<os>-<arch>.<tar.gz|zip>
//! ```
//!
//! reachable through one or more gateways. [`HttpFetcher`] talks to a single
//! gateway, [`MultiFetcher`] falls back across several, [`dist_versions`] reads
//! the version manifest of a package and [`FetchBinary`] turns a package and
//! version into an executable inside a local directory.

pub mod archive;
pub mod config;
pub mod consts;
mod dist_path;
mod error;
pub mod fetcher;
mod fetch_binary;
mod platform;
pub mod progress;
mod versions;

pub use archive::{ArchiveFormat, ArchiveReader};
pub use config::DownloadConfig;
pub use dist_path::get_dist_path_env;
pub use error::{ConfigError, ExtractError, FetchError};
pub use fetch_binary::{FetchBinary, fetch_binary};
pub use fetcher::{FetchBody, Fetcher, HttpFetcher, MultiFetcher};
pub use platform::Platform;
pub use progress::{NoProgressHandler, ProgressHandler};
pub use versions::{
    DistVersion, ParseDistVersionError, all_versions, dist_versions, latest_dist_version,
    stable_versions,
};
