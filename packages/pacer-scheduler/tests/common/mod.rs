#![allow(dead_code)]

use pacer_scheduler::{EventLoop, ManualClock, Scheduler, SchedulerConfig};
use std::cell::RefCell;
use std::rc::Rc;

pub type TestHost = Rc<EventLoop<Rc<ManualClock>>>;
pub type TestScheduler = Scheduler<TestHost>;

/// A scheduler on a virtual clock. Time only moves when a test advances it
/// (usually from inside a task, to simulate work) or when the event loop
/// waits for a timer.
pub struct Harness {
    pub clock: Rc<ManualClock>,
    pub host: TestHost,
    pub scheduler: Rc<TestScheduler>,
}

pub fn harness() -> Harness {
    harness_with_config(SchedulerConfig::default())
}

pub fn harness_with_config(config: SchedulerConfig) -> Harness {
    init_tracing();
    let clock = Rc::new(ManualClock::new());
    let host = Rc::new(EventLoop::new(clock.clone()));
    let scheduler = Scheduler::with_config(host.clone(), config).expect("valid config");
    Harness {
        clock,
        host,
        scheduler,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}
