/// Gateway used when no other source is configured.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io";

/// Content-addressed publication point used when neither the environment nor
/// the caller provide a distribution path.
pub const IPNS_IPFS_DIST: &str = "/ipns/dist.ipfs.io";

/// Environment variable that overrides the distribution path.
pub const ENV_IPFS_DIST_PATH: &str = "IPFS_DIST_PATH";

/// Name of the version manifest published next to each package.
pub const DIST_VERSIONS: &str = "versions";

/// Package holding the repository migrations.
pub const DIST_FS_REPO_MIGRATIONS: &str = "fs-repo-migrations";

/// Prefix every published version tag carries.
pub const VERSION_PREFIX: char = 'v';

/// Upper bound on the number of bytes read from a single fetch.
pub const DEFAULT_FETCH_LIMIT: u64 = 512 * 1024 * 1024;

/// Source keyword selecting the default HTTPS gateway.
pub const SOURCE_HTTPS: &str = "HTTPS";

/// Source keyword selecting a local IPFS node.
pub const SOURCE_IPFS: &str = "IPFS";

/// Packages whose archive contains a binary with a different name.
pub const BINARY_ALIASES: &[(&str, &str)] = &[("go-ipfs", "ipfs")];
