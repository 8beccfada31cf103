//! Runs in its own test binary because these tests change `TMPDIR` for the
//! process.
#![cfg(unix)]

mod common;

use std::{os::unix::fs::PermissionsExt, path::Path};

use common::TestGateway;
use dist_fetch::{FetchError, HttpFetcher, fetch_binary};
use tokio_util::sync::CancellationToken;

/// Runs `test` on a fresh runtime with `TMPDIR` pointing at `tmpdir`.
fn with_tmpdir<T>(tmpdir: &Path, test: impl AsyncFnOnce() -> T) -> T {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    temp_env::with_var("TMPDIR", Some(tmpdir), || runtime.block_on(test()))
}

#[test]
fn staging_is_removed_on_every_exit_path() {
    let tmp_root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let (placed, wrong_binary, too_large) = with_tmpdir(tmp_root.path(), async || {
        let gateway = TestGateway::spawn().await;
        let fetcher = HttpFetcher::new().with_gateway(gateway.url()).unwrap();
        let limited = fetcher.clone().with_fetch_limit(3);
        let cancel = CancellationToken::new();

        let placed =
            fetch_binary(&fetcher, &cancel, "go-ipfs", "v0.3.5", None, out.path()).await;
        let wrong_binary = fetch_binary(
            &fetcher,
            &cancel,
            "go-ipfs",
            "v0.3.5",
            Some("not-such-bin"),
            out.path(),
        )
        .await;
        let too_large = fetch_binary(
            &limited,
            &cancel,
            "fs-repo-migrations",
            "v0.3.5",
            None,
            out.path(),
        )
        .await;
        (placed, wrong_binary, too_large)
    });

    assert!(placed.is_ok(), "{placed:?}");
    assert!(
        matches!(wrong_binary, Err(FetchError::NoBinaryInArchive)),
        "{wrong_binary:?}"
    );
    assert!(
        matches!(too_large, Err(FetchError::SizeLimitExceeded { limit: 3, .. })),
        "{too_large:?}"
    );

    let leftovers: Vec<_> = fs_err::read_dir(tmp_root.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
    assert_eq!(fs_err::read_dir(out.path()).unwrap().count(), 1);
}

#[test]
fn unwritable_staging_root_is_a_permission_error() {
    let out = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let read_only = root.path().join("read-only");
    fs_err::create_dir(&read_only).unwrap();
    fs_err::set_permissions(&read_only, std::fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users can write anyway. The error mapping itself is covered
    // by the unit tests of the fetch pipeline.
    let marker = read_only.join("marker");
    if fs_err::write(&marker, b"").is_ok() {
        eprintln!("skipping: {} is writable", read_only.display());
        return;
    }

    let result = with_tmpdir(&read_only, async || {
        let gateway = TestGateway::spawn().await;
        let fetcher = HttpFetcher::new().with_gateway(gateway.url()).unwrap();
        fetch_binary(
            &fetcher,
            &CancellationToken::new(),
            "go-ipfs",
            "v0.3.5",
            None,
            out.path(),
        )
        .await
    });

    fs_err::set_permissions(&read_only, std::fs::Permissions::from_mode(0o755)).unwrap();

    let err = result.unwrap_err();
    assert!(
        matches!(err, FetchError::Permission { ref path, .. } if path == &read_only),
        "{err:?}"
    );
    assert_eq!(fs_err::read_dir(out.path()).unwrap().count(), 0);
}
