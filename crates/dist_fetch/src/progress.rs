use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Abstraction over progress reporting so callers can hook downloads into
/// their own UI.
pub trait ProgressHandler: Send + Sync {
    /// Adds a progress bar to the underlying renderer, returning the wrapped bar.
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar;

    /// Returns the style used for byte based progress.
    fn default_bytes_style(&self) -> ProgressStyle {
        default_bytes_style()
    }
}

/// A progress handler that never draws anything.
#[derive(Debug, Clone, Default)]
pub struct NoProgressHandler;

impl ProgressHandler for NoProgressHandler {
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar {
        bar.set_draw_target(ProgressDrawTarget::hidden());
        bar
    }
}

/// The bytes style shared by all handlers that don't override it.
pub fn default_bytes_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<18} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes}",
    )
    .map(|style| style.progress_chars("━ "))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_progress_handler_hides_bars() {
        let bar = NoProgressHandler.add_progress_bar(ProgressBar::new(10));
        assert!(bar.is_hidden());
        bar.inc(10);
        assert_eq!(bar.position(), 10);
    }
}
