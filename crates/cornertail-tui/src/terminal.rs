//! Raw-mode setup and teardown for the overlay.
//!
//! The overlay paints over whatever is already on screen, so it never
//! enters the alternate screen. Teardown runs from three places: the
//! window's Drop, the restore hook used by a forced exit on a second
//! signal, and the panic hook.

use std::io::{self, Stdout};
use std::panic;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::{Terminal, TerminalOptions, Viewport};

pub type OverlayTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Switches to raw mode so keys reach the overlay unbuffered, and hides
/// the cursor.
///
/// # Errors
/// Returns an error if raw mode cannot be enabled.
pub fn setup_terminal() -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    execute!(io::stdout(), Hide).context("Failed to hide cursor")?;
    Ok(())
}

/// Terminal whose viewport covers only `area`; cells outside it are never
/// written.
///
/// # Errors
/// Returns an error if the backend cannot be initialised.
pub fn fixed_terminal(area: Rect) -> Result<OverlayTerminal> {
    let options = TerminalOptions {
        viewport: Viewport::Fixed(area),
    };
    Terminal::with_options(CrosstermBackend::new(io::stdout()), options)
        .context("Failed to create terminal")
}

/// Mouse capture on means clicks land on the overlay instead of passing
/// through to the terminal.
///
/// # Errors
/// Returns an error if the escape sequence cannot be written.
pub fn set_mouse_capture(enabled: bool) -> Result<()> {
    let mut out = io::stdout();
    if enabled {
        execute!(out, EnableMouseCapture).context("Failed to enable mouse capture")
    } else {
        execute!(out, DisableMouseCapture).context("Failed to disable mouse capture")
    }
}

/// Releases the mouse, shows the cursor and leaves raw mode. Safe to call
/// repeatedly.
///
/// # Errors
/// Returns an error if the cursor or raw mode cannot be restored.
pub fn restore_terminal() -> Result<()> {
    let _ = execute!(io::stdout(), DisableMouseCapture);
    execute!(io::stdout(), Show).context("Failed to show cursor")?;
    disable_raw_mode().context("Failed to disable raw mode")
}

/// Chains a terminal restore in front of the existing panic hook, so the
/// panic message prints on a sane terminal. Install before `setup_terminal()`.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}
