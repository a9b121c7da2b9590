//! Manual- and auto-reset events.
//!
//! The original design signals progress between the fault handler and the
//! trimmer/writer workers via Win32-style events: `start_trim` and
//! `start_write` are auto-reset (wake exactly one extra pass, then clear
//! themselves), while `redo_fault` is manual-reset (stays signalled until
//! explicitly cleared, so every thread parked on it wakes up). `Event` wraps
//! a `Mutex<bool>` + `Condvar`, the idiomatic std substitute for
//! `CreateEvent`'s two reset disciplines.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct Event {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl Event {
    fn new() -> Self {
        Self {
            signalled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn set(&self) {
        let mut signalled = self.signalled.lock().unwrap();
        *signalled = true;
        self.condvar.notify_all();
    }

    fn reset(&self) {
        *self.signalled.lock().unwrap() = false;
    }

    fn wait_and(&self, clear_on_wake: bool) {
        let mut signalled = self.signalled.lock().unwrap();
        while !*signalled {
            signalled = self.condvar.wait(signalled).unwrap();
        }
        if clear_on_wake {
            *signalled = false;
        }
    }

    fn wait_timeout_and(&self, timeout: Duration, clear_on_wake: bool) -> bool {
        let (mut signalled, result) = self
            .condvar
            .wait_timeout_while(self.signalled.lock().unwrap(), timeout, |s| !*s)
            .unwrap();
        let was_signalled = *signalled && !result.timed_out();
        if was_signalled && clear_on_wake {
            *signalled = false;
        }
        was_signalled
    }
}

/// An event that, once signalled, wakes *every* thread waiting on it and
/// stays signalled until [`ManualResetEvent::reset`] is called explicitly.
/// Used for `redo_fault`: the writer signals it once, and all threads
/// currently retrying a fault wake up together.
pub struct ManualResetEvent(Event);

impl ManualResetEvent {
    pub fn new() -> Self {
        Self(Event::new())
    }

    pub fn set(&self) {
        self.0.set();
    }

    pub fn reset(&self) {
        self.0.reset();
    }

    pub fn wait(&self) {
        self.0.wait_and(false);
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.0.wait_timeout_and(timeout, false)
    }
}

impl Default for ManualResetEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// An event that wakes a single waiter and automatically clears itself. Used
/// for `start_trim`/`start_write`: each wake corresponds to exactly one pass
/// through the worker's loop body.
pub struct AutoResetEvent(Event);

impl AutoResetEvent {
    pub fn new() -> Self {
        Self(Event::new())
    }

    pub fn set(&self) {
        self.0.set();
    }

    pub fn wait(&self) {
        self.0.wait_and(true);
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.0.wait_timeout_and(timeout, true)
    }
}

impl Default for AutoResetEvent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn auto_reset_event_wakes_exactly_one_wait_per_set() {
        let event = Arc::new(AutoResetEvent::new());
        event.set();
        event.wait();
        assert!(!event.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn manual_reset_event_wakes_all_waiters() {
        let event = Arc::new(ManualResetEvent::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let event = Arc::clone(&event);
                thread::spawn(move || event.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        event.set();

        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
