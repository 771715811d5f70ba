//! Signal handling for shutting the overlay down.
//!
//! SIGINT, SIGTERM and SIGHUP (via `ctrlc`'s `termination` feature) all set a
//! quit flag that the event loop polls. While the overlay owns the terminal in
//! raw mode, Ctrl+C arrives as a key event instead; this covers signals sent
//! from outside (`kill`, closing the terminal).

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

static QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);
static RESTORE_HOOK: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

/// Installs the signal handler.
///
/// # Errors
/// Returns an error if a handler was already registered for this process.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger).context("Failed to install signal handler")
}

/// Requests a quit, force-exiting on the second request.
pub fn trigger() {
    if QUIT_REQUESTED.swap(true, Ordering::SeqCst) {
        // process::exit() bypasses Drop, so restore the terminal here.
        if let Some(hook) = RESTORE_HOOK.get() {
            hook();
        }
        std::process::exit(130);
    }
}

pub fn is_quit_requested() -> bool {
    QUIT_REQUESTED.load(Ordering::SeqCst)
}

pub fn reset() {
    QUIT_REQUESTED.store(false, Ordering::SeqCst);
}

/// Registers a hook run before the forced exit on a second signal.
pub fn set_restore_hook<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let _ = RESTORE_HOOK.set(Box::new(hook));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_sets_flag() {
        reset();
        assert!(!is_quit_requested());
        trigger();
        assert!(is_quit_requested());
        reset();
        assert!(!is_quit_requested());
    }
}
