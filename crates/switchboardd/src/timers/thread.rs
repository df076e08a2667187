//! Thread-per-timer backend.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{DeadlineTimer, TIMERS_TARGET, TimerBackend, TimerCallback};

/// Runs each timer on its own thread, parked on a condition variable until
/// the deadline passes or the timer is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTimerBackend;

impl ThreadTimerBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

type Cancellation = Arc<(Mutex<bool>, Condvar)>;

struct ThreadTimer {
    cancelled: Cancellation,
}

impl DeadlineTimer for ThreadTimer {}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        let (flag, signal) = &*self.cancelled;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }
}

impl TimerBackend for ThreadTimerBackend {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn new_timer(&self, callback: TimerCallback, delay: Duration) -> Box<dyn DeadlineTimer> {
        let cancelled: Cancellation = Arc::new((Mutex::new(false), Condvar::new()));
        let waiter = Arc::clone(&cancelled);
        thread::spawn(move || {
            let (flag, signal) = &*waiter;
            let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
            let (guard, _) = signal
                .wait_timeout_while(guard, delay, |cancelled| !*cancelled)
                .unwrap_or_else(PoisonError::into_inner);
            if *guard {
                debug!(target: TIMERS_TARGET, "timer cancelled before firing");
                return;
            }
            drop(guard);
            callback();
        });
        Box::new(ThreadTimer { cancelled })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn fires_after_delay() {
        let (sender, receiver) = mpsc::channel();
        let timer = ThreadTimerBackend::new().new_timer(
            Box::new(move || {
                drop(sender.send(()));
            }),
            Duration::from_millis(10),
        );
        receiver
            .recv_timeout(Duration::from_secs(2))
            .expect("timer should fire");
        drop(timer);
    }

    #[test]
    fn dropping_cancels_pending_timer() {
        let (sender, receiver) = mpsc::channel();
        let timer = ThreadTimerBackend::new().new_timer(
            Box::new(move || {
                drop(sender.send(()));
            }),
            Duration::from_secs(30),
        );
        drop(timer);
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(2)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }
}
