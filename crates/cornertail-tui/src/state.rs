//! Application state owned by the event loop.

use cornertail_core::config::{Corner, OverlayConfig};
use cornertail_core::pipeline::OutputBuffer;
use cornertail_core::supervisor::ProcessState;
use ratatui::layout::Size;

/// Everything the reducer mutates and the renderer reads.
#[derive(Debug)]
pub struct AppState {
    /// Wrapped tail of the command's output.
    pub buffer: OutputBuffer,
    /// Lifecycle of the command as observed through events.
    pub process: ProcessState,
    pub corner: Corner,
    /// Content visible (`true`) or collapsed to the tray tab.
    pub visible: bool,
    /// Mouse passes through to the terminal (not captured).
    pub click_through: bool,
    /// Last known screen size.
    pub screen: Size,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            buffer: OutputBuffer::new(config.wrap),
            process: ProcessState::NotStarted,
            corner: config.corner,
            visible: true,
            click_through: true,
            screen: Size::new(0, 0),
            should_quit: false,
        }
    }

    /// Short status label for the tray tab.
    pub fn status_label(&self) -> String {
        match &self.process {
            ProcessState::NotStarted => "starting".to_string(),
            ProcessState::Running { .. } => "running".to_string(),
            ProcessState::Finished { code } => format!("exit {code}"),
            ProcessState::Terminated => "stopped".to_string(),
            ProcessState::Failed { .. } => "failed".to_string(),
        }
    }
}
