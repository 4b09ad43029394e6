use crate::Host;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Host backed by a tokio `LocalSet`.
///
/// Host turns are local tasks that yield once before running, timers are local
/// tasks sleeping on tokio's timer wheel, and cancellation aborts the task.
/// Every method that schedules must be called from inside
/// `LocalSet::run_until` (or a task spawned on the set).
#[derive(Debug, Clone, Copy)]
pub struct TokioHost {
    origin: Instant,
}

impl TokioHost {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for TokioHost {
    type TimerHandle = JoinHandle<()>;

    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn request_host_timeout(&self, delay_ms: f64, callback: Box<dyn FnOnce()>) -> JoinHandle<()> {
        let delay =
            Duration::try_from_secs_f64(delay_ms.max(0.0) / 1000.0).unwrap_or(Duration::MAX);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        })
    }

    fn cancel_host_timeout(&self, handle: JoinHandle<()>) {
        handle.abort();
    }

    fn request_host_callback(&self, callback: Box<dyn FnOnce()>) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            callback();
        });
    }
}
