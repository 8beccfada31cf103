use crate::consts::{ENV_IPFS_DIST_PATH, IPNS_IPFS_DIST};

/// Returns the distribution path to use.
///
/// The `IPFS_DIST_PATH` environment variable wins when it is set and not
/// empty, then `dist_path` when it is not empty, and otherwise
/// [`IPNS_IPFS_DIST`].
pub fn get_dist_path_env(dist_path: &str) -> String {
    if let Some(dist) = std::env::var(ENV_IPFS_DIST_PATH)
        .ok()
        .filter(|v| !v.is_empty())
    {
        return dist;
    }
    if dist_path.is_empty() {
        IPNS_IPFS_DIST.to_string()
    } else {
        dist_path.to_string()
    }
}
