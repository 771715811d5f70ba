//! The overlay "window": a borderless rectangle drawn over the terminal.
//!
//! The runtime only talks to [`OverlayWindow`], so tests drive it with a
//! scripted window while the binary uses [`TerminalOverlay`].

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use cornertail_core::interrupt;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event};
use crossterm::queue;
use crossterm::style::Print;
use ratatui::Frame;
use ratatui::layout::{Rect, Size};
use tracing::debug;

use crate::terminal::{self, OverlayTerminal};

/// Display surface the overlay renders into.
pub trait OverlayWindow {
    fn show(&mut self) -> Result<()>;

    /// Removes the overlay from the screen.
    fn hide(&mut self) -> Result<()>;

    /// Moves/resizes the overlay to `area` (screen coordinates).
    fn resize(&mut self, area: Rect) -> Result<()>;

    /// When enabled, mouse input goes to whatever is underneath.
    fn set_click_through(&mut self, enabled: bool) -> Result<()>;

    fn screen_size(&self) -> Result<Size>;

    /// Draws one frame into the current area.
    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> Result<()>;

    /// Waits up to `timeout` for the next input event.
    fn poll_input(&mut self, timeout: Duration) -> Result<Option<Event>>;
}

/// Overlay drawn directly on the controlling terminal.
///
/// Uses a ratatui terminal with a fixed viewport covering just the overlay
/// rectangle. The viewport is rebuilt on every resize; the previous area is
/// blanked first since nothing else redraws it.
pub struct TerminalOverlay {
    terminal: Option<OverlayTerminal>,
    area: Rect,
    shown: bool,
}

impl TerminalOverlay {
    /// Takes over the terminal (raw mode, hidden cursor).
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be set up.
    pub fn new() -> Result<Self> {
        terminal::install_panic_hook();
        interrupt::set_restore_hook(|| {
            let _ = terminal::restore_terminal();
        });
        terminal::setup_terminal().context("Failed to setup terminal")?;

        Ok(Self {
            terminal: None,
            area: Rect::default(),
            shown: false,
        })
    }

    fn rebuild(&mut self) -> Result<()> {
        self.terminal = if self.shown && !self.area.is_empty() {
            Some(terminal::fixed_terminal(self.area)?)
        } else {
            None
        };
        Ok(())
    }

    /// Blanks the cells the overlay currently covers.
    fn erase(&self) -> Result<()> {
        if self.area.is_empty() {
            return Ok(());
        }
        let mut out = io::stdout();
        let blank = " ".repeat(self.area.width as usize);
        for row in self.area.top()..self.area.bottom() {
            queue!(out, MoveTo(self.area.x, row), Print(&blank))?;
        }
        out.flush()?;
        Ok(())
    }
}

impl OverlayWindow for TerminalOverlay {
    fn show(&mut self) -> Result<()> {
        if !self.shown {
            self.shown = true;
            self.rebuild()?;
        }
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        if self.shown {
            self.erase()?;
            self.shown = false;
            self.terminal = None;
        }
        Ok(())
    }

    fn resize(&mut self, area: Rect) -> Result<()> {
        if area == self.area && (self.terminal.is_some() || !self.shown) {
            return Ok(());
        }
        debug!(?area, "overlay resized");
        if self.shown {
            self.erase()?;
        }
        self.area = area;
        self.rebuild()
    }

    fn set_click_through(&mut self, enabled: bool) -> Result<()> {
        terminal::set_mouse_capture(!enabled)
    }

    fn screen_size(&self) -> Result<Size> {
        let (width, height) =
            crossterm::terminal::size().context("Failed to read terminal size")?;
        Ok(Size::new(width, height))
    }

    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> Result<()> {
        if let Some(terminal) = self.terminal.as_mut() {
            terminal
                .draw(|frame| render(frame))
                .context("Failed to draw overlay")?;
        }
        Ok(())
    }

    fn poll_input(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if event::poll(timeout)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }
}

impl Drop for TerminalOverlay {
    fn drop(&mut self) {
        let _ = self.hide();
        let _ = terminal::restore_terminal();
    }
}
