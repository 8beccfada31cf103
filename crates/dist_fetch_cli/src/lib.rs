//! # dist-fetch
//!
//! Command line interface over [`dist_fetch`].
//!
//! - The [`Command`] enum defines the available subcommands.
//! - [`execute_command`] builds the fetcher from the global options and runs
//!   the selected command.
#![deny(clippy::dbg_macro, clippy::unwrap_used)]

use std::{env, io::IsTerminal, path::PathBuf};

use clap::Parser;
use dist_fetch::{DownloadConfig, Fetcher};
use indicatif::ProgressDrawTarget;
use miette::{Context, IntoDiagnostic};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

pub mod fetch;
pub mod progress;
pub mod versions;

use progress::global_multi_progress;

const GLOBAL_OPTIONS: &str = "Global Options";

#[derive(Parser, Debug)]
#[command(
    name = "dist-fetch",
    version,
    about = "List and fetch release binaries published on a distribution gateway"
)]
#[clap(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    command: Command,

    #[clap(flatten)]
    global_options: GlobalOptions,
}

#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Increase logging verbosity (-v for warnings, -vv for info, -vvv for debug, -vvvv for trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true, help_heading = GLOBAL_OPTIONS)]
    verbose: u8,

    /// Decrease logging verbosity (quiet mode)
    #[clap(short, long, action = clap::ArgAction::Count, global = true, help_heading = GLOBAL_OPTIONS)]
    quiet: u8,

    /// Whether the log needs to be colored.
    #[clap(long, default_value = "auto", global = true, env = "DIST_FETCH_COLOR", help_heading = GLOBAL_OPTIONS)]
    color: ColorOutput,

    /// Hide all progress bars, always turned on if stderr is not a terminal.
    #[clap(long, default_value = "false", global = true, env = "DIST_FETCH_NO_PROGRESS", help_heading = GLOBAL_OPTIONS)]
    no_progress: bool,

    /// Gateway to download from, tried in the given order. `HTTPS` selects the
    /// default public gateway.
    #[clap(long = "gateway", global = true, env = "DIST_FETCH_GATEWAYS", value_delimiter = ',', help_heading = GLOBAL_OPTIONS)]
    gateways: Vec<String>,

    /// The distribution path, `IPFS_DIST_PATH` takes precedence.
    #[clap(long, global = true, help_heading = GLOBAL_OPTIONS)]
    dist_path: Option<String>,

    /// Read download settings from this TOML file.
    #[clap(long, global = true, env = "DIST_FETCH_CONFIG", help_heading = GLOBAL_OPTIONS)]
    config: Option<PathBuf>,
}

impl Args {
    /// Whether to show progress bars or not, based on the terminal and the user's preference.
    fn no_progress(&self) -> bool {
        if !std::io::stderr().is_terminal() {
            true
        } else {
            self.global_options.no_progress
        }
    }

    /// Determine the log level filter based on verbose and quiet counts.
    fn log_level_filter(&self) -> LevelFilter {
        match (self.global_options.quiet, self.global_options.verbose) {
            (q, _) if q > 0 => LevelFilter::OFF,
            (_, 0) => LevelFilter::ERROR,
            (_, 1) => LevelFilter::WARN,
            (_, 2) => LevelFilter::INFO,
            (_, 3) => LevelFilter::DEBUG,
            (_, _) => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
pub enum Command {
    /// List the published versions of a package.
    #[clap(visible_alias = "ls")]
    Versions(versions::Args),
    /// Download a release of a package and place its binary in a directory.
    Fetch(fetch::Args),
}

/// Option `Auto` enables color output only if the logging is done to a terminal
/// and `NO_COLOR` environment variable is not set.
#[derive(clap::ValueEnum, Debug, Clone, Default)]
pub enum ColorOutput {
    Always,
    Never,

    #[default]
    Auto,
}

pub async fn execute() -> miette::Result<()> {
    let args = Args::parse();
    let no_progress = args.no_progress();

    set_console_colors(&args);
    let use_colors = console::colors_enabled_stderr();
    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::default()
                .color(use_colors)
                .build(),
        )
    }))?;

    if no_progress {
        global_multi_progress().set_draw_target(ProgressDrawTarget::hidden());
    }

    setup_logging(&args, use_colors)?;

    // Ctrl-C cancels whatever download is in flight.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("received interrupt, cancelling");
            on_interrupt.cancel();
        }
    });

    execute_command(args.command, &args.global_options, &cancel).await
}

/// Maps command enum variants to their actual function handlers.
pub async fn execute_command(
    command: Command,
    global_options: &GlobalOptions,
    cancel: &CancellationToken,
) -> miette::Result<()> {
    let fetcher = build_fetcher(global_options)?;
    match command {
        Command::Versions(cmd) => versions::execute(cmd, fetcher.as_ref(), cancel).await,
        Command::Fetch(cmd) => fetch::execute(cmd, fetcher.as_ref(), cancel).await,
    }
}

/// Resolves the download configuration from the config file and the command
/// line, command line flags taking precedence.
fn download_config(global_options: &GlobalOptions) -> miette::Result<DownloadConfig> {
    let mut config = match &global_options.config {
        Some(path) => DownloadConfig::from_path(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to load '{}'", path.display()))?,
        None => DownloadConfig::default(),
    };

    if !global_options.gateways.is_empty() {
        config.download_sources = global_options.gateways.clone();
    }
    if let Some(dist_path) = &global_options.dist_path {
        config.dist_path = Some(dist_path.clone());
    }
    if config.user_agent.is_none() {
        config.user_agent = Some(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));
    }
    Ok(config)
}

fn build_fetcher(global_options: &GlobalOptions) -> miette::Result<Box<dyn Fetcher>> {
    download_config(global_options)?
        .build_fetcher()
        .into_diagnostic()
        .wrap_err("failed to configure the download sources")
}

fn setup_logging(args: &Args, use_colors: bool) -> miette::Result<()> {
    use progress::IndicatifWriter;
    use tracing_subscriber::{
        EnvFilter, filter::LevelFilter, prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    let (level_filter, crate_level) = match args.log_level_filter() {
        LevelFilter::OFF => (LevelFilter::OFF, LevelFilter::OFF),
        LevelFilter::ERROR => (LevelFilter::ERROR, LevelFilter::WARN),
        LevelFilter::WARN => (LevelFilter::WARN, LevelFilter::INFO),
        LevelFilter::INFO => (LevelFilter::INFO, LevelFilter::DEBUG),
        LevelFilter::DEBUG => (LevelFilter::DEBUG, LevelFilter::TRACE),
        LevelFilter::TRACE => (LevelFilter::TRACE, LevelFilter::TRACE),
    };
    let directives = log_directives(
        crate_level,
        args.global_options.verbose > 0 || args.global_options.quiet > 0,
        &env::var("RUST_LOG").unwrap_or_default(),
    );

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .parse(&directives)
        .into_diagnostic()?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(use_colors)
        .with_target(crate_level >= LevelFilter::INFO)
        .with_writer(IndicatifWriter::new(global_multi_progress()))
        .without_time();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
    Ok(())
}

/// The filter directives for our own crates. `RUST_LOG` is appended, and thus
/// overrides them, unless verbosity was given on the command line.
fn log_directives(crate_level: LevelFilter, cli_verbosity_set: bool, rust_log: &str) -> String {
    let directives = format!("dist_fetch={crate_level},dist_fetch_cli={crate_level}");
    if cli_verbosity_set || rust_log.is_empty() {
        directives
    } else {
        format!("{directives},{rust_log}")
    }
}

fn set_console_colors(args: &Args) {
    // FORCE_COLOR and NO_COLOR take precedence over the flag.
    let color = match env::var("FORCE_COLOR") {
        Ok(_) => &ColorOutput::Always,
        Err(_) => match env::var("NO_COLOR") {
            Ok(_) => &ColorOutput::Never,
            Err(_) => &args.global_options.color,
        },
    };

    match color {
        ColorOutput::Always => {
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        }
        ColorOutput::Never => {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        ColorOutput::Auto => {}
    };
}
