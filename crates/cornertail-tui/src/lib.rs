//! Corner overlay that tails a command's output.

pub mod effects;
pub mod events;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;
pub mod window;

use std::io::{IsTerminal, stdout};

use anyhow::Result;
use cornertail_core::config::OverlayConfig;
pub use runtime::OverlayRuntime;
use tracing::info;
pub use window::{OverlayWindow, TerminalOverlay};

/// Shows the overlay until the user (or a signal) quits, then stops the
/// command.
///
/// Returns the lines that were on display when the overlay closed.
///
/// The event loop blocks the calling task while it polls the terminal, so
/// this must run on a multi-thread tokio runtime: the command's output
/// readers make progress on the worker threads. On a `current_thread`
/// runtime they would never run.
///
/// # Errors
/// Returns an error if stdout is not a terminal or the terminal fails.
pub async fn run_overlay(config: &OverlayConfig, command_line: &str) -> Result<Vec<String>> {
    // The overlay draws on the controlling terminal
    if !stdout().is_terminal() {
        anyhow::bail!("cornertail requires a terminal on stdout.");
    }

    info!(corner = %config.corner, command = command_line, "overlay starting");

    let window = TerminalOverlay::new()?;
    let mut runtime = OverlayRuntime::new(window, config);
    runtime.start(command_line)?;

    let result = runtime.run();
    let snapshot = runtime.shutdown().await;
    drop(runtime);
    result?;

    info!(lines = snapshot.len(), "overlay closed");
    Ok(snapshot)
}
