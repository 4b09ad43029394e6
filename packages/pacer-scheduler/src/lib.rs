pub mod clock;
pub mod config;
pub mod event_loop;
pub mod priority;
pub mod scheduler;
pub mod task;
#[cfg(feature = "tokio")]
pub mod tokio_host;

use std::rc::Rc;

/// The two primitives the scheduler needs from whatever environment drives it.
///
/// A browser would back these with `MessageChannel` and `setTimeout`, a desktop
/// shell with its event loop. Implementations must never run a callback
/// synchronously from inside the request call.
pub trait Host {
    /// Cancellation token for an armed timeout.
    type TimerHandle;

    /// Get the current time in milliseconds (monotonic).
    fn now(&self) -> f64;

    /// Run `callback` no earlier than `delay_ms` from now.
    fn request_host_timeout(&self, delay_ms: f64, callback: Box<dyn FnOnce()>)
    -> Self::TimerHandle;

    /// Disarm a timeout that has not fired yet. Cancelling a fired timeout is a no-op.
    fn cancel_host_timeout(&self, handle: Self::TimerHandle);

    /// Request a cooperative yield: run `callback` on a fresh host turn, after
    /// whatever is already pending.
    ///
    /// Hosts without a dedicated turn queue get a zero-delay timeout, which
    /// works but usually costs more latency.
    fn request_host_callback(&self, callback: Box<dyn FnOnce()>) {
        let _ = self.request_host_timeout(0.0, callback);
    }
}

impl<H: Host + ?Sized> Host for Rc<H> {
    type TimerHandle = H::TimerHandle;

    fn now(&self) -> f64 {
        (**self).now()
    }

    fn request_host_timeout(
        &self,
        delay_ms: f64,
        callback: Box<dyn FnOnce()>,
    ) -> Self::TimerHandle {
        (**self).request_host_timeout(delay_ms, callback)
    }

    fn cancel_host_timeout(&self, handle: Self::TimerHandle) {
        (**self).cancel_host_timeout(handle)
    }

    fn request_host_callback(&self, callback: Box<dyn FnOnce()>) {
        (**self).request_host_callback(callback)
    }
}

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, PriorityTimeouts, SchedulerConfig};
pub use event_loop::{EventLoop, TimerId};
pub use priority::{ParsePriorityError, PriorityLevel};
pub use scheduler::{LoopPhase, Scheduler, SchedulerStats};
pub use task::{Callback, Continuation, TaskHandle, TaskStatus};
#[cfg(feature = "tokio")]
pub use tokio_host::TokioHost;

/// A scheduler driven by the in-process [`EventLoop`].
pub type LocalScheduler<C = MonotonicClock> = Scheduler<Rc<EventLoop<C>>>;
