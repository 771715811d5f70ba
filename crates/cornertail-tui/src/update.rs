//! Overlay reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.

use cornertail_core::supervisor::{
    ERROR_TAG, ProcessEvent, ProcessState, exit_notice, launch_failure_line,
};
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::{Position, Size};
use tracing::debug;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::render;
use crate::state::AppState;

/// Takes the current state and an event, mutates state, and returns effects
/// for the runtime to execute.
pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => vec![],
        UiEvent::Frame { width, height } => {
            app.screen = Size::new(width, height);
            vec![]
        }
        UiEvent::Terminal(term_event) => handle_terminal_event(app, term_event),
        UiEvent::ProcessStarted { pid } => {
            app.process = ProcessState::Running { pid };
            vec![]
        }
        UiEvent::Process(ProcessEvent::Output { stream, text }) => {
            app.buffer.ingest(&text, stream.tag());
            vec![]
        }
        UiEvent::Process(ProcessEvent::Exited { code }) => {
            app.buffer.ingest(&exit_notice(code), None);
            if app.process.is_running() {
                app.process = ProcessState::Finished { code };
            }
            vec![]
        }
        UiEvent::LaunchFailed { error } => {
            app.buffer
                .ingest(&launch_failure_line(&error), Some(ERROR_TAG));
            app.process = ProcessState::Failed { error };
            vec![]
        }
    }
}

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::Mouse(mouse) => handle_mouse(app, mouse),
        Event::Resize(width, height) => {
            app.screen = Size::new(width, height);
            vec![]
        }
        _ => vec![],
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.kind != KeyEventKind::Press {
        return vec![];
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => quit(app),
        KeyCode::Char('q') | KeyCode::Esc => quit(app),
        KeyCode::Char('h' | ' ') => {
            toggle_visibility(app);
            vec![]
        }
        KeyCode::Char('c') => {
            app.click_through = !app.click_through;
            debug!(click_through = app.click_through, "click-through toggled");
            vec![UiEffect::SetClickThrough(app.click_through)]
        }
        _ => vec![],
    }
}

/// Clicks only arrive while the mouse is captured (click-through off).
fn handle_mouse(app: &mut AppState, mouse: MouseEvent) -> Vec<UiEffect> {
    if app.click_through || mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return vec![];
    }
    if render::current_area(app).contains(Position::new(mouse.column, mouse.row)) {
        toggle_visibility(app);
    }
    vec![]
}

fn toggle_visibility(app: &mut AppState) {
    app.visible = !app.visible;
    debug!(visible = app.visible, "visibility toggled");
}

fn quit(app: &mut AppState) -> Vec<UiEffect> {
    app.should_quit = true;
    vec![UiEffect::Quit]
}
