//! UI event types.
//!
//! Everything the reducer reacts to: refresh ticks, terminal input, frame
//! size, and process lifecycle events from the supervisor.

use cornertail_core::supervisor::ProcessEvent;
use crossterm::event::Event;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Refresh tick; the runtime redraws after ticks.
    Tick,
    /// Current screen size, emitted at the start of every loop iteration.
    Frame { width: u16, height: u16 },
    /// Raw terminal input (keys, resize).
    Terminal(Event),
    /// The command was launched.
    ProcessStarted { pid: Option<u32> },
    /// Output or exit from the running command.
    Process(ProcessEvent),
    /// The command could not be launched.
    LaunchFailed { error: String },
}
