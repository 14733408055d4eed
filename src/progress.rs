//! Terminal spinner for crawl and download phases.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn should_use_spinner(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn spinner_enabled(quiet: bool) -> bool {
    should_use_spinner(std::io::stderr().is_terminal(), quiet, is_dumb_terminal())
}

/// Running spinner; `finish` stops it and waits for the render task.
pub(crate) struct Spinner {
    handle: Option<tokio::task::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl Spinner {
    pub(crate) async fn finish(self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }
}

/// Spawns a spinner whose message is re-rendered every tick.
/// When `enabled` is false nothing is drawn.
pub(crate) fn spawn_spinner<F>(enabled: bool, render: F) -> Spinner
where
    F: Fn() -> String + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(!enabled));
    if !enabled {
        return Spinner { handle: None, stop };
    }

    let task_stop = Arc::clone(&stop);
    let handle = tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !task_stop.load(Ordering::SeqCst) {
            spinner.set_message(render());
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    });
    Spinner {
        handle: Some(handle),
        stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_use_spinner_requires_terminal() {
        assert!(should_use_spinner(true, false, false));
        assert!(!should_use_spinner(false, false, false));
        assert!(!should_use_spinner(true, true, false));
        assert!(!should_use_spinner(true, false, true));
    }

    #[tokio::test]
    async fn test_disabled_spinner_finishes_immediately() {
        let spinner = spawn_spinner(false, String::new);
        assert!(spinner.handle.is_none());
        spinner.finish().await;
    }
}
