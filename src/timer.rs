//! Cooperative timers driven by `PaintSession::tick`.
//!
//! Nothing here spawns threads. A timer is only a deadline, so re-arming or
//! cancelling leaves nothing behind that could fire late.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of "now". Injected so tests and scripts can step time by hand.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Instant::now())) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One-shot timer. Re-arming replaces the deadline; cancelling drops it.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn arm(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and report `true` if the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Trailing-edge debouncer: only the last request survives a quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    pending: Option<T>,
    timer: Timer,
    quiet: Duration,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self { pending: None, timer: Timer::default(), quiet }
    }

    pub fn request(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.timer.arm(now + self.quiet);
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if !self.timer.poll(now) {
            return None;
        }
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_moves_the_deadline() {
        let clock = ManualClock::new();
        let mut t = Timer::default();
        t.arm(clock.now() + Duration::from_millis(10));
        t.arm(clock.now() + Duration::from_millis(20));
        clock.advance(Duration::from_millis(15));
        assert!(!t.poll(clock.now()));
        clock.advance(Duration::from_millis(5));
        assert!(t.poll(clock.now()));
        assert_eq!(t.deadline(), None);
        assert!(!t.poll(clock.now()));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let clock = ManualClock::new();
        let mut t = Timer::default();
        t.arm(clock.now());
        t.cancel();
        assert!(!t.poll(clock.now() + Duration::from_secs(1)));
    }

    #[test]
    fn debounce_keeps_only_the_last_request() {
        let clock = ManualClock::new();
        let mut d = Debouncer::new(Duration::from_millis(250));
        d.request(1, clock.now());
        clock.advance(Duration::from_millis(200));
        d.request(2, clock.now());
        clock.advance(Duration::from_millis(200));
        assert_eq!(d.poll(clock.now()), None);
        clock.advance(Duration::from_millis(50));
        assert_eq!(d.poll(clock.now()), Some(2));
        assert_eq!(d.poll(clock.now()), None);
    }
}
