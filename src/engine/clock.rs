//! Time sources for the polling scheduler.

use std::thread;
use std::time::{Duration, Instant};

/// Millisecond clock the scheduler waits on between wake-ups.
pub trait Clock {
    /// Milliseconds elapsed since the clock started.
    fn now_ms(&self) -> u64;

    /// Returns once `now_ms()` has reached `deadline_ms`.
    fn sleep_until(&mut self, deadline_ms: u64);
}

/// Wall-clock time; sleeps the calling thread.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep_until(&mut self, deadline_ms: u64) {
        let now = self.now_ms();
        if deadline_ms > now {
            thread::sleep(Duration::from_millis(deadline_ms - now));
        }
    }
}

/// Virtual time that jumps straight to each deadline.
#[derive(Debug, Default, Clone)]
pub struct VirtualClock {
    current_ms: u64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_by(&mut self, ms: u64) {
        self.current_ms = self.current_ms.saturating_add(ms);
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }

    fn sleep_until(&mut self, deadline_ms: u64) {
        // Time never runs backwards
        self.current_ms = self.current_ms.max(deadline_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_jumps_to_deadlines() {
        let mut clock = VirtualClock::new();
        clock.sleep_until(100);
        assert_eq!(clock.now_ms(), 100);
        clock.sleep_until(40);
        assert_eq!(clock.now_ms(), 100);
        clock.advance_by(25);
        assert_eq!(clock.now_ms(), 125);
    }

    #[test]
    fn system_clock_waits_at_least_until_deadline() {
        let mut clock = SystemClock::new();
        let deadline = clock.now_ms() + 5;
        clock.sleep_until(deadline);
        assert!(clock.now_ms() >= deadline);
    }
}
