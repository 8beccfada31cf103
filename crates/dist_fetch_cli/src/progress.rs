use std::{fmt::Write, io, sync::LazyLock};

use dist_fetch::ProgressHandler;
use indicatif::{
    HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle,
};
use tracing_subscriber::fmt::MakeWriter;

/// Returns the [`MultiProgress`] every bar of the process is drawn on.
///
/// Log output goes through [`IndicatifWriter`] so it does not tear bars
/// that are currently drawn.
pub fn global_multi_progress() -> MultiProgress {
    static GLOBAL_MP: LazyLock<MultiProgress> = LazyLock::new(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        mp
    });
    GLOBAL_MP.clone()
}

/// Draws download progress on the global [`MultiProgress`].
#[derive(Debug, Clone, Default)]
pub struct TerminalProgressHandler;

impl ProgressHandler for TerminalProgressHandler {
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar {
        global_multi_progress().add(bar)
    }

    fn default_bytes_style(&self) -> ProgressStyle {
        bytes_style()
    }
}

fn bytes_style() -> ProgressStyle {
    let template = "  {spinner:.dim} {prefix:20!} [{elapsed_precise}] [{bar:20!.bright.yellow/dim.white}] {bytes:>8} @ {smoothed_bytes_per_sec:8}";
    match ProgressStyle::default_bar().template(template) {
        Ok(style) => style.progress_chars("━━╾─").with_key(
            "smoothed_bytes_per_sec",
            |s: &ProgressState, w: &mut dyn Write| {
                let _ = match (s.pos(), s.elapsed().as_millis()) {
                    (pos, elapsed_ms) if elapsed_ms > 0 => write!(
                        w,
                        "{}/s",
                        HumanBytes((pos as f64 * 1000_f64 / elapsed_ms as f64) as u64)
                    ),
                    _ => write!(w, "-"),
                };
            },
        ),
        Err(_) => dist_fetch::progress::default_bytes_style(),
    }
}

/// A tracing writer that suspends the progress bars while a line is written.
#[derive(Clone)]
pub struct IndicatifWriter {
    progress_bars: MultiProgress,
}

impl IndicatifWriter {
    pub fn new(pb: MultiProgress) -> Self {
        Self { progress_bars: pb }
    }
}

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress_bars
            .suspend(|| io::Write::write(&mut io::stderr(), buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.progress_bars
            .suspend(|| io::Write::flush(&mut io::stderr()))
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
