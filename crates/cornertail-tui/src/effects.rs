//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! The reducer never touches the window or the child process directly.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    /// Stop the event loop; shutdown terminates the child.
    Quit,
    /// Capture or release the mouse (click-through off/on).
    SetClickThrough(bool),
}
