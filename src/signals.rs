//! Signal handling for the interpreter.
//!
//! `SIGTSTP` flips the interpreter between normal and foreground-only mode.
//! `SIGINT` is caught so that it never terminates the interpreter itself,
//! while children get the default action back when they exec.
use std::io;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use libc::c_int;
use log::debug;

use crate::sys::{self, SignalNumber, cerr};

// Both end with the prompt, since the interrupted read resumes without printing it.
const ENTER_FOREGROUND_ONLY: &[u8] = b"\nEntering foreground-only mode (& is now ignored)\n: ";
const EXIT_FOREGROUND_ONLY: &[u8] = b"\nExiting foreground-only mode\n: ";

static BACKGROUND_ALLOWED: AtomicBool = AtomicBool::new(true);
static MODE_SWITCHES: AtomicUsize = AtomicUsize::new(0);

/// Whether the `&` marker is honoured when a command is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundPolicy {
    Allowed,
    ForegroundOnly,
}

impl BackgroundPolicy {
    pub fn allows_background(self) -> bool {
        self == BackgroundPolicy::Allowed
    }

    fn from_flag(allowed: bool) -> Self {
        if allowed {
            BackgroundPolicy::Allowed
        } else {
            BackgroundPolicy::ForegroundOnly
        }
    }
}

/// Flip `flag` and return the advisory to print for the new mode.
fn switch_mode(flag: &AtomicBool, switches: &AtomicUsize) -> &'static [u8] {
    let was_allowed = flag.fetch_xor(true, Ordering::SeqCst);
    switches.fetch_add(1, Ordering::SeqCst);
    if was_allowed {
        ENTER_FOREGROUND_ONLY
    } else {
        EXIT_FOREGROUND_ONLY
    }
}

extern "C" fn on_mode_switch(_signal: c_int) {
    let message = switch_mode(&BACKGROUND_ALLOWED, &MODE_SWITCHES);
    sys::write_raw(libc::STDOUT_FILENO, message);
}

extern "C" fn on_interrupt(_signal: c_int) {}

/// Read side of the foreground-only toggle, owned by the control loop.
pub struct ModeGate {
    flag: &'static AtomicBool,
    switches: &'static AtomicUsize,
    seen: usize,
}

impl ModeGate {
    /// Gate backed by the process-wide flag the `SIGTSTP` handler flips.
    pub fn process() -> Self {
        Self::with_flag(&BACKGROUND_ALLOWED, &MODE_SWITCHES)
    }

    fn with_flag(flag: &'static AtomicBool, switches: &'static AtomicUsize) -> Self {
        Self {
            flag,
            switches,
            seen: switches.load(Ordering::SeqCst),
        }
    }

    /// Current policy, read at dispatch time.
    pub fn policy(&self) -> BackgroundPolicy {
        BackgroundPolicy::from_flag(self.flag.load(Ordering::SeqCst))
    }

    /// Returns the current policy if the mode was switched since the last call.
    pub fn poll_switch(&mut self) -> Option<BackgroundPolicy> {
        let switches = self.switches.load(Ordering::SeqCst);
        if switches == self.seen {
            return None;
        }
        debug!("mode switched {} time(s) since last prompt", switches - self.seen);
        self.seen = switches;
        Some(self.policy())
    }
}

/// The possible behaviors for a [`SignalHandler`].
pub enum SignalHandlerBehavior {
    /// Execute the default action for the signal.
    Default,
    /// Ignore the arrival of the signal.
    Ignore,
    /// Run the given async-signal-safe function.
    Handler(extern "C" fn(c_int)),
}

struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    fn new(behavior: SignalHandlerBehavior) -> io::Result<Self> {
        let mut raw: libc::sigaction = unsafe { std::mem::zeroed() };
        cerr(unsafe { libc::sigfillset(&mut raw.sa_mask) })?;
        raw.sa_flags = libc::SA_RESTART;
        raw.sa_sigaction = match behavior {
            SignalHandlerBehavior::Default => libc::SIG_DFL,
            SignalHandlerBehavior::Ignore => libc::SIG_IGN,
            SignalHandlerBehavior::Handler(handler) => handler as libc::sighandler_t,
        };
        Ok(Self { raw })
    }

    fn register(&self, signal: SignalNumber) -> io::Result<Self> {
        let mut original_action = MaybeUninit::<libc::sigaction>::zeroed();

        cerr(unsafe { libc::sigaction(signal, &self.raw, original_action.as_mut_ptr()) })?;

        Ok(Self {
            raw: unsafe { original_action.assume_init() },
        })
    }
}

/// A handler for a signal.
///
/// When a value of this type is dropped, it will try to restore the action that was registered for
/// the signal prior to calling [`SignalHandler::register`].
pub struct SignalHandler {
    signal: SignalNumber,
    original_action: SignalAction,
}

impl SignalHandler {
    pub fn register(signal: SignalNumber, behavior: SignalHandlerBehavior) -> io::Result<Self> {
        let action = SignalAction::new(behavior)?;
        let original_action = action.register(signal)?;

        Ok(Self {
            signal,
            original_action,
        })
    }

    /// Keep the new action installed for the rest of the process' life.
    pub fn forget(self) {
        std::mem::forget(self)
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        if let Err(err) = self.original_action.register(self.signal) {
            log::warn!("cannot restore original action for signal {}: {err}", self.signal);
        }
    }
}

/// Install the interpreter's `SIGINT` and `SIGTSTP` handlers.
///
/// The previous actions come back when the returned handlers are dropped.
pub fn install() -> io::Result<Vec<SignalHandler>> {
    Ok(vec![
        SignalHandler::register(libc::SIGINT, SignalHandlerBehavior::Handler(on_interrupt))?,
        SignalHandler::register(libc::SIGTSTP, SignalHandlerBehavior::Handler(on_mode_switch))?,
    ])
}

/// Signal dispositions for a freshly forked child, applied before exec.
///
/// `SIGINT` kills the child normally; `SIGTSTP` is left to the interpreter.
pub fn prepare_child() -> io::Result<()> {
    SignalHandler::register(libc::SIGINT, SignalHandlerBehavior::Default)?.forget();
    SignalHandler::register(libc::SIGTSTP, SignalHandlerBehavior::Ignore)?.forget();
    Ok(())
}

/// Ignore `signal` from now on.
pub fn ignore(signal: SignalNumber) -> io::Result<()> {
    SignalHandler::register(signal, SignalHandlerBehavior::Ignore)?.forget();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_twice_restores_policy() {
        static FLAG: AtomicBool = AtomicBool::new(true);
        static SWITCHES: AtomicUsize = AtomicUsize::new(0);
        let mut gate = ModeGate::with_flag(&FLAG, &SWITCHES);

        assert_eq!(gate.policy(), BackgroundPolicy::Allowed);
        assert_eq!(gate.poll_switch(), None);

        assert_eq!(switch_mode(&FLAG, &SWITCHES), ENTER_FOREGROUND_ONLY);
        assert_eq!(gate.policy(), BackgroundPolicy::ForegroundOnly);
        assert!(!gate.policy().allows_background());
        assert_eq!(gate.poll_switch(), Some(BackgroundPolicy::ForegroundOnly));
        assert_eq!(gate.poll_switch(), None);

        assert_eq!(switch_mode(&FLAG, &SWITCHES), EXIT_FOREGROUND_ONLY);
        assert_eq!(gate.policy(), BackgroundPolicy::Allowed);
        assert_eq!(gate.poll_switch(), Some(BackgroundPolicy::Allowed));
    }

    #[test]
    fn advisory_texts() {
        assert_eq!(
            std::str::from_utf8(ENTER_FOREGROUND_ONLY).unwrap(),
            "\nEntering foreground-only mode (& is now ignored)\n: "
        );
        assert_eq!(
            std::str::from_utf8(EXIT_FOREGROUND_ONLY).unwrap(),
            "\nExiting foreground-only mode\n: "
        );
    }

    #[test]
    fn handler_is_restored_on_drop() {
        fn current(signal: SignalNumber) -> libc::sighandler_t {
            let mut action = MaybeUninit::<libc::sigaction>::zeroed();
            cerr(unsafe { libc::sigaction(signal, std::ptr::null(), action.as_mut_ptr()) })
                .unwrap();
            unsafe { action.assume_init() }.sa_sigaction
        }

        let before = current(libc::SIGUSR2);
        let handler =
            SignalHandler::register(libc::SIGUSR2, SignalHandlerBehavior::Ignore).unwrap();
        assert_eq!(current(libc::SIGUSR2), libc::SIG_IGN);

        drop(handler);
        assert_eq!(current(libc::SIGUSR2), before);
    }
}
