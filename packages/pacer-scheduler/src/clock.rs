use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic millisecond time source for [`EventLoop`](crate::EventLoop).
pub trait Clock {
    fn now(&self) -> f64;

    /// Block until `now() >= deadline`. Returns immediately if it already is.
    fn wait_until(&self, deadline: f64);
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wait_until(&self, deadline: f64) {
        let remaining = deadline - self.now();
        if remaining > 0.0 {
            let wait = Duration::try_from_secs_f64(remaining / 1000.0).unwrap_or(Duration::MAX);
            std::thread::sleep(wait);
        }
    }
}

/// Virtual time that only moves when told to. Waiting jumps straight to the deadline.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(ms: f64) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    /// Moves time to `ms`. Time never runs backwards; earlier values are ignored.
    pub fn set(&self, ms: f64) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn wait_until(&self, deadline: f64) {
        self.set(deadline);
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn wait_until(&self, deadline: f64) {
        (**self).wait_until(deadline)
    }
}
