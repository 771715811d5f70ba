//! Overlay runtime - owns the window, state, and process supervisor.
//!
//! The runtime is responsible for:
//! - Running the event loop
//! - Collecting events (process output, window input, refresh ticks)
//! - Dispatching events to the reducer
//! - Executing effects returned by the reducer
//! - Placing the window and rendering frames

use std::time::{Duration, Instant};

use anyhow::Result;
use cornertail_core::config::OverlayConfig;
use cornertail_core::interrupt;
use cornertail_core::supervisor::{ProcessState, ProcessSupervisor};
use ratatui::layout::Rect;
use tracing::{debug, warn};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::window::OverlayWindow;
use crate::{render, update};

pub struct OverlayRuntime<W: OverlayWindow> {
    window: W,
    /// Application state.
    pub state: AppState,
    supervisor: ProcessSupervisor,
    refresh_interval: Duration,
    /// Last time a Tick event was emitted.
    last_tick: Instant,
    /// Area last applied to the window.
    area: Rect,
    dirty: bool,
}

impl<W: OverlayWindow> OverlayRuntime<W> {
    pub fn new(window: W, config: &OverlayConfig) -> Self {
        // Reset interrupt flag in case it was set from a previous run
        interrupt::reset();

        let supervisor =
            ProcessSupervisor::new(config.shell.clone()).with_grace(config.terminate_grace);

        Self {
            window,
            state: AppState::new(config),
            supervisor,
            refresh_interval: config.refresh_interval,
            last_tick: Instant::now(),
            area: Rect::default(),
            // Start dirty to ensure initial render
            dirty: true,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    /// Launches the command. A launch failure is not an error here: it is
    /// shown in the overlay and the supervisor stays inert.
    ///
    /// # Errors
    /// Returns an error if the command was already started.
    pub fn start(&mut self, command_line: &str) -> Result<()> {
        match self.supervisor.start(command_line) {
            Ok(()) => {
                let pid = match self.supervisor.state() {
                    ProcessState::Running { pid } => *pid,
                    _ => None,
                };
                self.dispatch_event(UiEvent::ProcessStarted { pid })?;
            }
            Err(err) if matches!(self.supervisor.state(), ProcessState::Failed { .. }) => {
                self.dispatch_event(UiEvent::LaunchFailed {
                    error: format!("{err:#}"),
                })?;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Runs the event loop until a quit is requested.
    ///
    /// # Errors
    /// Returns an error if the window fails.
    pub fn run(&mut self) -> Result<()> {
        self.window.set_click_through(self.state.click_through)?;
        self.window.show()?;

        while !self.state.should_quit {
            self.step()?;
        }
        Ok(())
    }

    /// One loop iteration: collect, reduce, execute effects, maybe draw.
    ///
    /// # Errors
    /// Returns an error if the window fails.
    pub fn step(&mut self) -> Result<()> {
        if interrupt::is_quit_requested() {
            debug!("quit requested by signal");
            self.state.should_quit = true;
            return Ok(());
        }

        let mut events = self.collect_events()?;

        // Frame first so placement uses the current screen size
        let size = self.window.screen_size()?;
        events.insert(
            0,
            UiEvent::Frame {
                width: size.width,
                height: size.height,
            },
        );

        for event in events {
            // Only Tick triggers render - this caps redraws at the refresh cadence
            if matches!(&event, UiEvent::Tick) {
                self.dirty = true;
            }
            let effects = update::update(&mut self.state, event);
            self.execute_effects(effects)?;
        }

        if self.dirty && !self.state.should_quit {
            self.draw()?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Hides the window and stops the command.
    ///
    /// Returns the final buffer contents.
    pub async fn shutdown(&mut self) -> Vec<String> {
        if let Err(err) = self.window.hide() {
            warn!(error = %format!("{err:#}"), "failed to hide overlay");
        }
        self.supervisor.terminate().await;
        self.state.process = self.supervisor.state().clone();
        self.state.buffer.snapshot()
    }

    // ========================================================================
    // Event Collection
    // ========================================================================

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        self.collect_process_events(&mut events);

        // - If we already have events to process, do non-blocking poll
        // - Otherwise, block until next tick is due
        let time_until_tick = self
            .refresh_interval
            .saturating_sub(self.last_tick.elapsed());
        let poll_duration = if events.is_empty() {
            time_until_tick
        } else {
            Duration::ZERO
        };

        if let Some(event) = self.window.poll_input(poll_duration)? {
            events.push(UiEvent::Terminal(event));
            while let Some(event) = self.window.poll_input(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event));
            }
        }

        if self.last_tick.elapsed() >= self.refresh_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    fn collect_process_events(&mut self, events: &mut Vec<UiEvent>) {
        while let Some(event) = self.supervisor.try_next_event() {
            events.push(UiEvent::Process(event));
        }
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    fn dispatch_event(&mut self, event: UiEvent) -> Result<()> {
        let effects = update::update(&mut self.state, event);
        self.execute_effects(effects)
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) -> Result<()> {
        for effect in effects {
            self.execute_effect(effect)?;
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: UiEffect) -> Result<()> {
        match effect {
            UiEffect::Quit => {
                self.state.should_quit = true;
            }
            UiEffect::SetClickThrough(enabled) => {
                self.window.set_click_through(enabled)?;
            }
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let area = render::current_area(&self.state);
        if area != self.area {
            self.window.resize(area)?;
            self.area = area;
        }

        let state = &self.state;
        self.window.draw(&mut |frame| render::render(state, frame))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use cornertail_core::pipeline::WrapConfig;
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Frame;
    use ratatui::layout::Size;

    use super::*;

    /// Scripted window: hands out queued input, records what it was told.
    #[derive(Default)]
    struct FakeWindow {
        input: VecDeque<Event>,
        shown: bool,
        click_through: Option<bool>,
        area: Rect,
        draws: usize,
    }

    impl FakeWindow {
        fn with_keys(keys: &[KeyCode]) -> Self {
            Self {
                input: keys
                    .iter()
                    .map(|code| Event::Key(KeyEvent::new(*code, KeyModifiers::NONE)))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl OverlayWindow for FakeWindow {
        fn show(&mut self) -> Result<()> {
            self.shown = true;
            Ok(())
        }

        fn hide(&mut self) -> Result<()> {
            self.shown = false;
            Ok(())
        }

        fn resize(&mut self, area: Rect) -> Result<()> {
            self.area = area;
            Ok(())
        }

        fn set_click_through(&mut self, enabled: bool) -> Result<()> {
            self.click_through = Some(enabled);
            Ok(())
        }

        fn screen_size(&self) -> Result<Size> {
            Ok(Size::new(80, 24))
        }

        fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> Result<()> {
            let mut terminal = ratatui::Terminal::new(ratatui::backend::TestBackend::new(
                self.area.width,
                self.area.height,
            ))?;
            terminal.draw(|frame| render(frame))?;
            self.draws += 1;
            Ok(())
        }

        fn poll_input(&mut self, timeout: Duration) -> Result<Option<Event>> {
            if let Some(event) = self.input.pop_front() {
                return Ok(Some(event));
            }
            std::thread::sleep(timeout.min(Duration::from_millis(10)));
            Ok(None)
        }
    }

    fn config(shell: &str) -> OverlayConfig {
        OverlayConfig {
            shell: shell.to_string(),
            // Wide enough that the exit notice fits on one line.
            wrap: WrapConfig::new(40, 20),
            refresh_interval: Duration::from_millis(20),
            terminate_grace: Duration::from_millis(500),
            ..OverlayConfig::default()
        }
    }

    /// Steps until `done` holds (or fails after a generous deadline).
    fn step_until(
        runtime: &mut OverlayRuntime<FakeWindow>,
        done: impl Fn(&OverlayRuntime<FakeWindow>) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(runtime) {
            assert!(Instant::now() < deadline, "timed out waiting for runtime");
            runtime.step().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_command_to_completion() {
        let mut runtime = OverlayRuntime::new(FakeWindow::default(), &config("sh"));
        runtime.start("echo hello").unwrap();
        assert!(runtime.state.process.is_running());

        step_until(&mut runtime, |rt| {
            matches!(rt.state.process, ProcessState::Finished { .. }) && rt.window().draws > 0
        });

        let lines = runtime.state.buffer.snapshot();
        assert_eq!(lines[0], "hello");
        assert_eq!(
            lines.last().map(String::as_str),
            Some("[Process finished: exit code 0]")
        );
        assert!(!runtime.state.should_quit);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_window_pinned_to_corner() {
        let mut runtime = OverlayRuntime::new(FakeWindow::default(), &config("sh"));
        runtime.start("printf 'a\\nb\\nc'").unwrap();

        step_until(&mut runtime, |rt| {
            matches!(rt.state.process, ProcessState::Finished { .. })
                && rt.window().area.height == 5
        });

        // 40 chars + padding, top-right of an 80x24 screen.
        assert_eq!(runtime.window().area, Rect::new(38, 0, 42, 5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quit_key_stops_loop_and_shutdown_terminates() {
        let window = FakeWindow::with_keys(&[KeyCode::Char('q')]);
        let mut runtime = OverlayRuntime::new(window, &config("sh"));
        runtime.start("sleep 30").unwrap();

        runtime.run().unwrap();
        assert!(runtime.state.should_quit);
        assert!(runtime.window().shown);
        assert_eq!(runtime.window().click_through, Some(true));

        let started = Instant::now();
        runtime.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(runtime.state.process, ProcessState::Terminated);
        assert!(!runtime.window().shown);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_click_through_key_reaches_window() {
        let window = FakeWindow::with_keys(&[KeyCode::Char('c'), KeyCode::Char('q')]);
        let mut runtime = OverlayRuntime::new(window, &config("sh"));
        runtime.start("true").unwrap();

        runtime.run().unwrap();
        assert!(!runtime.state.click_through);
        assert_eq!(runtime.window().click_through, Some(false));
        runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_launch_failure_is_displayed() {
        let mut runtime = OverlayRuntime::new(
            FakeWindow::default(),
            &config("/nonexistent/cornertail-shell"),
        );
        runtime.start("echo hi").unwrap();

        assert!(matches!(runtime.state.process, ProcessState::Failed { .. }));
        let lines = runtime.state.buffer.snapshot();
        assert!(lines[0].starts_with("[ERROR] "));

        // Nothing to terminate; state stays failed.
        let snapshot = runtime.shutdown().await;
        assert_eq!(snapshot, lines);
        assert!(matches!(runtime.state.process, ProcessState::Failed { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hidden_overlay_shrinks_to_tray() {
        let window = FakeWindow::with_keys(&[KeyCode::Char('h')]);
        let mut runtime = OverlayRuntime::new(window, &config("sh"));
        runtime.start("true").unwrap();

        step_until(&mut runtime, |rt| {
            !rt.state.visible && rt.window().area.height == 1 && rt.window().draws > 0
        });
        assert!(runtime.window().area.width < 42);
        runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_twice_is_an_error() {
        let mut runtime = OverlayRuntime::new(FakeWindow::default(), &config("sh"));
        runtime.start("true").unwrap();
        assert!(runtime.start("true").is_err());
        runtime.shutdown().await;
    }
}
