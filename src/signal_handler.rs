use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use anyhow::{Context as _, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::debug;

// The handler cannot hold a reference to the controller, so the mode and
// the prompt bytes live in process-wide statics. All transitions go
// through `SignalController`.
static FOREGROUND: AtomicBool = AtomicBool::new(false);
static PROMPT_BYTES: OnceLock<Vec<u8>> = OnceLock::new();

extern "C" fn handle_sigint(_: i32) {
    // only async-signal-safe calls in here
    unsafe {
        let newline = b"\n";
        let _ = libc::write(libc::STDOUT_FILENO, newline.as_ptr().cast(), newline.len());
        if !FOREGROUND.load(Ordering::SeqCst) {
            if let Some(prompt) = PROMPT_BYTES.get() {
                let _ = libc::write(libc::STDOUT_FILENO, prompt.as_ptr().cast(), prompt.len());
            }
        }
    }
}

/// Two-state SIGINT arbiter.
///
/// Idle: the handler redisplays the prompt and the interpreter keeps
/// running. Foreground-active: the handler only emits a newline; the
/// foreground children die on their default disposition (exec resets
/// SIGINT to default) while the interpreter and background jobs survive.
#[derive(Debug, Default)]
pub struct SignalController;

impl SignalController {
    pub fn new() -> Self {
        SignalController
    }

    /// Install the SIGINT handler and register the prompt bytes it
    /// writes when idle. Call once at startup.
    pub fn install(&self, prompt: &[u8]) -> Result<()> {
        let _ = PROMPT_BYTES.set(prompt.to_vec());
        let action = SigAction::new(
            SigHandler::Handler(handle_sigint),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        unsafe {
            sigaction(Signal::SIGINT, &action).context("failed to install SIGINT handler")?;
        }
        debug!("SIGINT handler installed");
        Ok(())
    }

    /// Enter the foreground-active state for as long as the returned
    /// guard lives. Dropping the guard restores the idle state, on
    /// every exit path.
    pub fn foreground(&self) -> ForegroundGuard {
        FOREGROUND.store(true, Ordering::SeqCst);
        debug!("signal mode: foreground-active");
        ForegroundGuard { _private: () }
    }
}

pub struct ForegroundGuard {
    _private: (),
}

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        FOREGROUND.store(false, Ordering::SeqCst);
        debug!("signal mode: idle");
    }
}

#[cfg(test)]
pub(crate) fn foreground_active() -> bool {
    FOREGROUND.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::kill;
    use nix::unistd::getpid;

    // one test: the mode lives in a process-wide atomic, so parallel
    // tests poking it would race each other
    #[test]
    fn guard_brackets_foreground_state_and_handler_swallows_sigint() {
        let controller = SignalController::new();
        controller.install(b"").unwrap();
        assert!(!foreground_active());
        {
            let _guard = controller.foreground();
            assert!(foreground_active());
            kill(getpid(), Signal::SIGINT).unwrap();
            // still alive: the handler swallowed the signal
        }
        assert!(!foreground_active());
    }
}
