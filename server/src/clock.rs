//! Monotonic time source and precise sleep for the engine loop.

use std::time::{Duration, Instant};

/// Final busy-wait margin for [`MonoClock::sleep_until`]. Raising it trades
/// CPU for less oversleep.
pub const SPIN_MARGIN_NS: u64 = 200_000;

/// Nanosecond clock anchored to a [`Instant`] taken at construction.
///
/// `Instant` is steady, so readings never retreat; all engine timestamps are
/// offsets from the anchor rather than wall-clock times.
#[derive(Debug, Clone)]
pub struct MonoClock {
    origin: Instant,
}

impl MonoClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the clock was created.
    pub fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    /// Sleeps until `deadline_ns` on this clock's timeline.
    ///
    /// Sleeps the bulk of the wait with the OS timer, then spins the last
    /// [`SPIN_MARGIN_NS`] to cap oversleep. Returns immediately if the
    /// deadline has already passed.
    pub fn sleep_until(&self, deadline_ns: u64) {
        loop {
            let now = self.now_ns();
            if now >= deadline_ns {
                return;
            }
            let remaining = deadline_ns - now;
            if remaining > SPIN_MARGIN_NS {
                std::thread::sleep(Duration::from_nanos(remaining - SPIN_MARGIN_NS));
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

impl Default for MonoClock {
    fn default() -> Self {
        Self::new()
    }
}
