use std::io::Write;

use clap::Parser;
use dist_fetch::{DistVersion, Fetcher, all_versions, dist_versions, latest_dist_version, stable_versions};
use miette::{Context, IntoDiagnostic};
use tokio_util::sync::CancellationToken;

/// List the published versions of a package, oldest first.
#[derive(Parser, Debug)]
pub struct Args {
    /// The package, relative to the distribution path (e.g. `go-ipfs`).
    pub package: String,

    /// Skip pre-release versions.
    #[clap(long)]
    pub stable_only: bool,

    /// Only print the most recent version.
    #[clap(long)]
    pub latest: bool,
}

pub async fn execute(
    args: Args,
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
) -> miette::Result<()> {
    let versions = list_versions(&args, fetcher, cancel).await?;

    let mut stdout = std::io::stdout().lock();
    for version in versions {
        writeln!(stdout, "{version}").into_diagnostic()?;
    }
    Ok(())
}

/// The versions selected by `args`, oldest first. With `--latest` this is a
/// single version.
pub async fn list_versions(
    args: &Args,
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
) -> miette::Result<Vec<DistVersion>> {
    if args.latest {
        let latest = latest_dist_version(fetcher, cancel, &args.package, args.stable_only)
            .await
            .into_diagnostic()?;
        return Ok(vec![latest]);
    }

    let include = if args.stable_only {
        stable_versions
    } else {
        all_versions
    };
    dist_versions(fetcher, cancel, &args.package, include)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to list versions of {}", args.package))
}
