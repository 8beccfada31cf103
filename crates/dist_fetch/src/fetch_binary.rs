use std::{
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    ArchiveReader, FetchError, Fetcher, Platform,
    consts::BINARY_ALIASES,
    progress::{NoProgressHandler, ProgressHandler},
};

const STAGING_PREFIX: &str = "dist-fetch-";

/// Downloads the release archive of a package version and places the binary
/// it contains into a local directory.
///
/// The archive `<package>/<version>/<base>_<version>_<os>-<arch>.<ext>` is
/// fetched relative to the distribution path of the fetcher, staged in a
/// private temporary directory and the binary is moved into place without
/// ever replacing an existing file.
pub struct FetchBinary {
    package: String,
    version: String,
    binary_name: Option<String>,
    platform: Platform,
    progress: Arc<dyn ProgressHandler>,
}

impl std::fmt::Debug for FetchBinary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchBinary")
            .field("package", &self.package)
            .field("version", &self.version)
            .field("binary_name", &self.binary_name)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl FetchBinary {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            binary_name: None,
            platform: Platform::current(),
            progress: Arc::new(NoProgressHandler),
        }
    }

    /// Look for `name` in the archive instead of the name derived from the
    /// package.
    #[must_use]
    pub fn with_binary_name(mut self, name: impl Into<String>) -> Self {
        self.binary_name = Some(name.into());
        self
    }

    /// Fetch the release built for `platform` instead of the current one.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the [`ProgressHandler`] used while downloading the archive.
    #[must_use]
    pub fn with_progress_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = handler;
        self
    }

    /// The last segment of the package path, e.g. `go-ipfs` for
    /// `tools/go-ipfs`.
    fn package_base(&self) -> &str {
        let package = self.package.trim_end_matches('/');
        package.rsplit('/').next().unwrap_or(package)
    }

    /// The file name of the release archive.
    pub fn archive_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.package_base(),
            self.version,
            self.platform.tag(),
            self.platform.archive_format().extension()
        )
    }

    /// The location of the release archive relative to the distribution path.
    pub fn archive_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.package.trim_matches('/'),
            self.version,
            self.archive_name()
        )
    }

    /// The file name of the binary inside the archive and on disk.
    pub fn binary_name(&self) -> String {
        let name = match &self.binary_name {
            Some(name) => name.as_str(),
            None => {
                let base = self.package_base();
                BINARY_ALIASES
                    .iter()
                    .find(|(package, _)| *package == base)
                    .map_or(base, |(_, binary)| *binary)
            }
        };
        self.platform.exe_name(name)
    }

    /// Fetches the archive and places the binary in `dest_dir`, returning the
    /// absolute path of the new file.
    ///
    /// `dest_dir` must be an existing directory that does not yet contain a
    /// file with the binary's name.
    #[instrument(skip(self, fetcher, cancel), fields(package = %self.package, version = %self.version))]
    pub async fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        cancel: &CancellationToken,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let binary_name = self.binary_name();
        let target = check_destination(dest_dir, &binary_name)?;

        let archive_path = self.archive_path();
        let mut body = fetcher.fetch(cancel, &archive_path).await?;

        let staging = create_staging_dir()?;
        let staged_archive = staging.path().join(self.archive_name());

        let progress_bar = self.progress_bar(body.content_length().unwrap_or(0));
        let mut file = fs_err::tokio::File::create(&staged_archive).await?;
        let downloaded = body
            .copy_to(&mut file, |len| progress_bar.inc(len))
            .await
            .inspect_err(|_| progress_bar.abandon());
        drop(file);
        let downloaded = downloaded?;
        progress_bar.finish_and_clear();
        debug!("downloaded {downloaded} bytes from {}", body.url());

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let staged_binary = staging.path().join("bin").join(&binary_name);
        let placed = tokio::task::spawn_blocking(move || -> Result<PathBuf, FetchError> {
            unpack_binary(&staged_archive, &binary_name, &staged_binary)?;
            let target = check_destination(
                target.parent().unwrap_or(Path::new(".")),
                &binary_name,
            )?;
            place_binary(&staged_binary, &target)?;
            Ok(target)
        })
        .await??;

        // Cleanup failures are not fatal once the binary is placed.
        if let Err(err) = staging.close() {
            debug!("failed to remove staging directory: {err}");
        }

        Ok(placed)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total).with_style(self.progress.default_bytes_style());
        bar.set_prefix(format!("Downloading {}", self.package_base()));
        self.progress.add_progress_bar(bar)
    }
}

/// Fetches `package` at `version` and places its binary into `dest_dir`.
///
/// `binary_name` overrides the file name looked up in the archive.
pub async fn fetch_binary(
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
    package: &str,
    version: &str,
    binary_name: Option<&str>,
    dest_dir: &Path,
) -> Result<PathBuf, FetchError> {
    let mut request = FetchBinary::new(package, version);
    if let Some(name) = binary_name {
        request = request.with_binary_name(name);
    }
    request.fetch(fetcher, cancel, dest_dir).await
}

/// Creates the private directory an archive is staged in, below the platform
/// temp directory (`TMPDIR` on unix).
fn create_staging_dir() -> Result<tempfile::TempDir, FetchError> {
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir()
        .map_err(|err| staging_error(err, std::env::temp_dir()))
}

fn staging_error(err: std::io::Error, temp_root: PathBuf) -> FetchError {
    match err.kind() {
        ErrorKind::PermissionDenied => FetchError::Permission {
            path: temp_root,
            source: Arc::new(err),
        },
        _ => FetchError::from(err),
    }
}

/// Returns the absolute path the binary would be placed at, failing when the
/// destination is not a directory or the path is already taken.
fn check_destination(dest_dir: &Path, binary_name: &str) -> Result<PathBuf, FetchError> {
    let metadata = fs_err::metadata(dest_dir)?;
    if !metadata.is_dir() {
        return Err(FetchError::AlreadyExists {
            path: dest_dir.to_path_buf(),
        });
    }

    let target = dunce::canonicalize(dest_dir)?.join(binary_name);
    match fs_err::symlink_metadata(&target) {
        Ok(_) => Err(FetchError::AlreadyExists { path: target }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(target),
        Err(err) => Err(err.into()),
    }
}

/// Extracts the entry named `binary_name` from the staged archive into
/// `staged_binary` and marks it executable.
fn unpack_binary(
    staged_archive: &Path,
    binary_name: &str,
    staged_binary: &Path,
) -> Result<(), FetchError> {
    let reader = ArchiveReader::open(staged_archive)?;
    if let Some(parent) = staged_binary.parent() {
        fs_err::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(fs_err::File::create(staged_binary)?);
    let entry = reader.extract_file_named(binary_name, &mut writer)?;
    writer.flush()?;
    drop(writer);
    debug!("extracted {entry} from {}", reader.path().display());

    make_executable(staged_binary)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs_err::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Moves the staged binary to `target` without replacing an existing file.
///
/// A hard link is tried first. When the staging directory lives on another
/// filesystem the binary is copied into a file created with `create_new`.
fn place_binary(staged: &Path, target: &Path) -> Result<(), FetchError> {
    let already_exists = || FetchError::AlreadyExists {
        path: target.to_path_buf(),
    };

    match fs_err::hard_link(staged, target) {
        Ok(()) => return Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Err(already_exists()),
        Err(err) => debug!("hard link failed, copying instead: {err}"),
    }

    let dest = match fs_err::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Err(already_exists()),
        Err(err) => return Err(err.into()),
    };

    let copied = copy_into(staged, dest).and_then(|()| make_executable(target));
    if let Err(err) = copied {
        if let Err(remove_err) = fs_err::remove_file(target) {
            debug!("failed to remove partial binary: {remove_err}");
        }
        return Err(err.into());
    }
    Ok(())
}

fn copy_into(source: &Path, dest: fs_err::File) -> std::io::Result<()> {
    let mut source = fs_err::File::open(source)?;
    let mut dest = BufWriter::new(dest);
    std::io::copy(&mut source, &mut dest)?;
    dest.flush()?;
    dest.get_ref().sync_all()
}

#[cfg(test)]
mod tests {
    use flate2::{Compression, write::GzEncoder};
    use rstest::rstest;

    use super::*;
    use crate::{FetchBody, consts::DIST_FS_REPO_MIGRATIONS};

    /// Serves a single in-memory archive for any path.
    #[derive(Debug)]
    struct ArchiveFetcher {
        archive: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl Fetcher for ArchiveFetcher {
        async fn fetch(
            &self,
            cancel: &CancellationToken,
            path: &str,
        ) -> Result<FetchBody, FetchError> {
            Ok(FetchBody::from_bytes(path, self.archive.clone(), cancel))
        }

        fn dist_path(&self) -> &str {
            "/memory"
        }

        fn set_dist_path(&mut self, _: &str) -> Result<(), FetchError> {
            Ok(())
        }
    }

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn linux() -> Platform {
        Platform::new("linux", "amd64")
    }

    #[rstest]
    #[case("go-ipfs", "go-ipfs/v0.3.5/go-ipfs_v0.3.5_linux-amd64.tar.gz", "ipfs")]
    #[case(
        DIST_FS_REPO_MIGRATIONS,
        "fs-repo-migrations/v0.3.5/fs-repo-migrations_v0.3.5_linux-amd64.tar.gz",
        "fs-repo-migrations"
    )]
    #[case(
        "tools/ipfs-update/",
        "tools/ipfs-update/v0.3.5/ipfs-update_v0.3.5_linux-amd64.tar.gz",
        "ipfs-update"
    )]
    fn names_for_linux(#[case] package: &str, #[case] archive: &str, #[case] binary: &str) {
        let request = FetchBinary::new(package, "v0.3.5").with_platform(linux());
        assert_eq!(request.archive_path(), archive);
        assert_eq!(request.binary_name(), binary);
    }

    #[test]
    fn names_for_windows() {
        let request = FetchBinary::new("go-ipfs", "v0.4.0")
            .with_platform(Platform::new("windows", "386"))
            .with_binary_name("custom");
        assert_eq!(request.archive_name(), "go-ipfs_v0.4.0_windows-386.zip");
        assert_eq!(request.binary_name(), "custom.exe");
    }

    #[test]
    fn destination_checks() {
        let tempdir = tempfile::tempdir().unwrap();
        let target = check_destination(tempdir.path(), "ipfs").unwrap();
        assert!(target.is_absolute());
        assert_eq!(target.file_name().unwrap(), "ipfs");

        fs_err::write(&target, b"taken").unwrap();
        assert!(matches!(
            check_destination(tempdir.path(), "ipfs"),
            Err(FetchError::AlreadyExists { path }) if path == target
        ));
        assert!(matches!(
            check_destination(&target, "ipfs"),
            Err(FetchError::AlreadyExists { .. })
        ));
        assert!(matches!(
            check_destination(&tempdir.path().join("missing"), "ipfs"),
            Err(FetchError::Io(_))
        ));
    }

    #[test]
    fn unwritable_temp_root_is_a_permission_error() {
        let root = PathBuf::from("/read-only/tmp");
        let err = staging_error(ErrorKind::PermissionDenied.into(), root.clone());
        assert!(
            matches!(err, FetchError::Permission { ref path, ref source }
                if path == &root && source.kind() == ErrorKind::PermissionDenied),
            "{err:?}"
        );
        assert_eq!(
            err.to_string(),
            "permission denied creating staging directory in /read-only/tmp"
        );

        let err = staging_error(ErrorKind::NotFound.into(), root);
        assert!(matches!(err, FetchError::Io(ref e) if e.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn staging_dir_lives_below_the_temp_root() {
        let staging = create_staging_dir().unwrap();
        let name = staging.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(STAGING_PREFIX), "{name}");
        assert_eq!(staging.path().parent(), Some(std::env::temp_dir().as_path()));
    }

    #[test]
    fn placement_never_clobbers() {
        let tempdir = tempfile::tempdir().unwrap();
        let staged = tempdir.path().join("staged");
        let target = tempdir.path().join("ipfs");
        fs_err::write(&staged, b"new").unwrap();
        fs_err::write(&target, b"old").unwrap();

        assert!(matches!(
            place_binary(&staged, &target),
            Err(FetchError::AlreadyExists { .. })
        ));
        assert_eq!(fs_err::read(&target).unwrap(), b"old");
    }

    #[tokio::test]
    async fn places_binary_from_memory_archive() {
        let fetcher = ArchiveFetcher {
            archive: tar_gz(&[("go-ipfs/ipfs", b"FAKE DATA")]),
        };
        let tempdir = tempfile::tempdir().unwrap();
        let request = FetchBinary::new("go-ipfs", "v0.3.5").with_platform(linux());

        let path = request
            .fetch(&fetcher, &CancellationToken::new(), tempdir.path())
            .await
            .unwrap();
        assert_eq!(path, dunce::canonicalize(tempdir.path()).unwrap().join("ipfs"));
        assert_eq!(fs_err::read(&path).unwrap(), b"FAKE DATA");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs_err::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn cancelled_fetch_places_nothing() {
        let fetcher = ArchiveFetcher {
            archive: tar_gz(&[("go-ipfs/ipfs", b"FAKE DATA")]),
        };
        let tempdir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = FetchBinary::new("go-ipfs", "v0.3.5")
            .with_platform(linux())
            .fetch(&fetcher, &cancel, tempdir.path())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!tempdir.path().join("ipfs").exists());
    }
}
