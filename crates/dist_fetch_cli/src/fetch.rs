use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use dist_fetch::{FetchBinary, Fetcher, latest_dist_version};
use miette::{Context, IntoDiagnostic};
use tokio_util::sync::CancellationToken;

use crate::progress::TerminalProgressHandler;

const LATEST: &str = "latest";

/// Download a release of a package and place its binary in a directory.
///
/// Existing files are never overwritten.
#[derive(Parser, Debug)]
pub struct Args {
    /// The package, relative to the distribution path (e.g. `go-ipfs`).
    pub package: String,

    /// The version to fetch, `latest` for the newest stable release.
    #[clap(long, default_value = LATEST)]
    pub version: String,

    /// Name of the binary inside the archive, defaults to the package name.
    #[clap(long = "bin")]
    pub binary_name: Option<String>,

    /// Directory to place the binary in, defaults to the current directory.
    #[clap(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn execute(
    args: Args,
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
) -> miette::Result<()> {
    let (version, path) = fetch(&args, fetcher, cancel).await?;

    eprintln!(
        "{}Fetched {} {} to {}",
        console::style(console::Emoji("✔ ", "")).green(),
        console::style(&args.package).bold(),
        version,
        path.display()
    );
    Ok(())
}

/// Resolves the requested version and places the binary, returning the
/// version that was fetched and the path of the binary.
pub async fn fetch(
    args: &Args,
    fetcher: &dyn Fetcher,
    cancel: &CancellationToken,
) -> miette::Result<(String, PathBuf)> {
    let version = if args.version == LATEST {
        let latest = latest_dist_version(fetcher, cancel, &args.package, true)
            .await
            .into_diagnostic()?;
        tracing::info!("latest version of {} is {latest}", args.package);
        latest.to_string()
    } else {
        args.version.clone()
    };

    let output = match &args.output {
        Some(output) => output.clone(),
        None => std::env::current_dir().into_diagnostic()?,
    };

    let mut request = FetchBinary::new(&args.package, &version)
        .with_progress_handler(Arc::new(TerminalProgressHandler));
    if let Some(name) = &args.binary_name {
        request = request.with_binary_name(name);
    }

    let path = request
        .fetch(fetcher, cancel, &output)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to fetch {} {version}", args.package))?;
    Ok((version, path))
}
