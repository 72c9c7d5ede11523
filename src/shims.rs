//! Injected capability bundle.
//!
//! An embedding application supplies up to three capabilities — `log`,
//! `send_can`, `set_timer` — any of which may be absent. Each is wrapped in
//! `Option` so "may be absent" is enforced by the compiler rather than left
//! to a null check at every call site.

use std::fmt;
use std::rc::Rc;

/// A timer-expiry callback, as passed to [`Shims::set_timer`].
///
/// Not exercised by the request handle state machine today (see the
/// concurrency model notes in the crate-level documentation); plumbing only,
/// reserved for a future multi-frame-send path.
pub type TimerCallback = Rc<dyn Fn()>;

/// The three capabilities the diagnostic layer needs from its host
/// application.
///
/// Cloning a `Shims` is cheap (it clones `Rc`s, not the underlying
/// closures). Every stateful entry point in [`crate::handle`] takes a
/// `&Shims` explicitly rather than a handle owning one, so an embedding
/// application is free to swap capabilities between calls.
#[derive(Clone, Default)]
pub struct Shims {
    log: Option<Rc<dyn Fn(&str)>>,
    send_can: Option<Rc<dyn Fn(u32, &[u8]) -> bool>>,
    set_timer: Option<Rc<dyn Fn(u16, TimerCallback)>>,
}

impl fmt::Debug for Shims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shims")
            .field("log", &self.log.is_some())
            .field("send_can", &self.send_can.is_some())
            .field("set_timer", &self.set_timer.is_some())
            .finish()
    }
}

impl Shims {
    /// Logs `msg` if a log capability was supplied; otherwise a no-op.
    pub(crate) fn log(&self, msg: impl AsRef<str>) {
        if let Some(log) = &self.log {
            log(msg.as_ref());
        }
    }

    /// Sends a CAN frame if a send capability was supplied; returns `false`
    /// (treated the same as a failed send) when no capability is present.
    pub(crate) fn send_can(&self, arbitration_id: u32, data: &[u8]) -> bool {
        match &self.send_can {
            Some(send) => send(arbitration_id, data),
            None => false,
        }
    }

    /// Requests a timer callback if a timer capability was supplied.
    #[allow(dead_code)] // plumbing for a future multi-frame-send path, see isotp.rs
    pub(crate) fn set_timer(&self, ms: u16, callback: TimerCallback) {
        if let Some(set_timer) = &self.set_timer {
            set_timer(ms, callback);
        }
    }
}

/// Builds a [`Shims`] bundle from the three optional capabilities.
///
/// Pass `None` for any capability the embedding application does not
/// support.
pub fn init_shims(
    log: Option<Rc<dyn Fn(&str)>>,
    send_can: Option<Rc<dyn Fn(u32, &[u8]) -> bool>>,
    set_timer: Option<Rc<dyn Fn(u16, TimerCallback)>>,
) -> Shims {
    Shims {
        log,
        send_can,
        set_timer,
    }
}
