//! Pure view/render functions for the overlay.
//!
//! Functions here:
//! - Take `&AppState` by immutable reference
//! - Compute where the overlay sits, or draw into a ratatui Frame
//! - Never mutate state or return effects

use cornertail_core::config::Corner;
use cornertail_core::supervisor::ERROR_TAG;
use ratatui::Frame;
use ratatui::layout::{Rect, Size};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Clear, Padding, Paragraph};

use crate::state::AppState;

/// Columns of padding on each side of the text.
pub const PADDING: u16 = 1;

/// Label of the collapsed (tray) tab.
pub const TRAY_TITLE: &str = "▸ cornertail";

const OVERLAY_STYLE: Style = Style::new().fg(Color::White).bg(Color::Black);
const ERROR_STYLE: Style = Style::new().fg(Color::LightRed).bg(Color::Black);
const TRAY_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Gray);

/// Fixed width: wrap width plus padding.
pub fn overlay_width(app: &AppState) -> u16 {
    u16::try_from(app.buffer.config().char_limit)
        .unwrap_or(u16::MAX)
        .saturating_add(PADDING * 2)
}

/// One row per buffered line, at least one. Saturates at `u16::MAX`.
pub fn overlay_height(app: &AppState) -> u16 {
    u16::try_from(app.buffer.len().max(1)).unwrap_or(u16::MAX)
}

pub fn tray_text(app: &AppState) -> String {
    format!("{TRAY_TITLE} · {}", app.status_label())
}

/// Pins a `width` x `height` box to `corner`, clamped to the screen.
pub fn place(corner: Corner, screen: Size, width: u16, height: u16) -> Rect {
    let width = width.min(screen.width);
    let height = height.min(screen.height);
    let x = if corner.is_left() {
        0
    } else {
        screen.width - width
    };
    let y = if corner.is_top() {
        0
    } else {
        screen.height - height
    };
    Rect::new(x, y, width, height)
}

/// Screen area the overlay occupies for the current state.
pub fn current_area(app: &AppState) -> Rect {
    if app.visible {
        place(
            app.corner,
            app.screen,
            overlay_width(app),
            overlay_height(app),
        )
    } else {
        let width = tray_text(app).chars().count() as u16 + PADDING * 2;
        place(app.corner, app.screen, width, 1)
    }
}

/// Renders the overlay into the frame's viewport.
pub fn render(app: &AppState, frame: &mut Frame) {
    let area = frame.area();
    frame.render_widget(Clear, area);

    if app.visible {
        render_output(app, frame, area);
    } else {
        render_tray(app, frame, area);
    }
}

fn render_output(app: &AppState, frame: &mut Frame, area: Rect) {
    let error_prefix = format!("[{ERROR_TAG}] ");
    let lines: Vec<Line<'static>> = app
        .buffer
        .lines()
        .map(|line| {
            if line.starts_with(&error_prefix) {
                Line::styled(line.to_string(), ERROR_STYLE)
            } else {
                Line::raw(line.to_string())
            }
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .style(OVERLAY_STYLE)
        .block(Block::default().padding(Padding::horizontal(PADDING)));
    frame.render_widget(paragraph, area);
}

fn render_tray(app: &AppState, frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(Line::raw(tray_text(app)))
        .style(TRAY_STYLE)
        .block(Block::default().padding(Padding::horizontal(PADDING)));
    frame.render_widget(paragraph, area);
}
