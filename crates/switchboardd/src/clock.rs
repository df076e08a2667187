//! Monotonic time source shared by the tracker and uptime reporting.

use std::time::Instant;

/// Source of monotonic timestamps.
pub trait MonotonicClock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::MonotonicClock;

    /// Clock that only moves when told to.
    pub(crate) struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut offset = self.offset.lock().expect("clock mutex poisoned");
            *offset += by;
        }
    }

    impl MonotonicClock for ManualClock {
        fn now(&self) -> Instant {
            let offset = self.offset.lock().expect("clock mutex poisoned");
            self.base + *offset
        }
    }
}
