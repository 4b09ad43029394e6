use crate::Host;
use crate::config::{ConfigError, SchedulerConfig};
use crate::priority::PriorityLevel;
use crate::task::{
    Continuation, QueueEntry, Task, TaskHandle, TaskKey, TaskLocation, TaskStatus,
    compare_entries,
};
use pacer_heap::{Comparator, MinHeap};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Where the work loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Nothing requested. Only a ready task (admitted or promoted) wakes the loop.
    Idle,
    /// A host turn has been requested and not yet delivered.
    LoopArmed,
    /// Draining the ready queue inside a time slice.
    Flushing,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub admitted: u64,
    /// Delayed tasks moved into the ready queue.
    pub promoted: u64,
    /// Callback invocations, continuations included.
    pub executed: u64,
    pub continuations: u64,
    pub completed: u64,
    /// Cancelled tasks dropped when they reached the front of a queue.
    pub discarded: u64,
    pub slices: u64,
}

struct Inner<T> {
    tasks: SlotMap<TaskKey, Task>,
    ready_queue: MinHeap<QueueEntry>,
    delayed_queue: MinHeap<QueueEntry>,
    next_id: u64,
    phase: LoopPhase,
    timer: Option<T>,
    slice_start_time: f64,
    current_priority: PriorityLevel,
    stats: SchedulerStats,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            ready_queue: MinHeap::with_comparator(compare_entries as Comparator<QueueEntry>),
            delayed_queue: MinHeap::with_comparator(compare_entries as Comparator<QueueEntry>),
            next_id: 0,
            phase: LoopPhase::Idle,
            timer: None,
            slice_start_time: 0.0,
            current_priority: PriorityLevel::Normal,
            stats: SchedulerStats::default(),
        }
    }

    /// Moves every due task at the front of the delayed queue into the ready
    /// queue, re-keyed by expiration time. Cancelled tasks met on the way are dropped.
    fn advance_timers(&mut self, now: f64) -> u64 {
        let mut promoted = 0;
        while let Some(entry) = self.delayed_queue.peek().copied() {
            let Some(task) = self.tasks.get_mut(entry.key) else {
                self.delayed_queue.pop();
                continue;
            };
            if task.callback.is_none() {
                self.delayed_queue.pop();
                self.tasks.remove(entry.key);
                self.stats.discarded += 1;
            } else if task.start_time <= now {
                self.delayed_queue.pop();
                task.location = TaskLocation::Ready;
                self.ready_queue.push(QueueEntry {
                    sort_key: task.expiration_time,
                    id: entry.id,
                    key: entry.key,
                });
                promoted += 1;
            } else {
                break;
            }
        }
        self.stats.promoted += promoted;
        promoted
    }

    /// Pops the front of the ready queue and frees its task slot.
    fn discard_ready_front(&mut self, key: TaskKey) {
        self.ready_queue.pop();
        if let Some(task) = self.tasks.remove(key) {
            if task.cancelled {
                self.stats.discarded += 1;
            }
        }
    }
}

/// Cooperative, single-threaded priority scheduler.
///
/// Always lives behind an `Rc`: host callbacks hold a `Weak` back-reference,
/// so dropping the last `Rc` turns any still-pending turns and timers into
/// no-ops. No internal borrow is held while a task callback runs, so callbacks
/// are free to schedule, cancel, or poll [`should_yield`](Self::should_yield).
pub struct Scheduler<H: Host> {
    host: H,
    config: SchedulerConfig,
    inner: RefCell<Inner<H::TimerHandle>>,
    this: Weak<Self>,
}

impl<H: Host + 'static> Scheduler<H> {
    pub fn new(host: H) -> Rc<Self> {
        Self::build(host, SchedulerConfig::default())
    }

    pub fn with_config(host: H, config: SchedulerConfig) -> Result<Rc<Self>, ConfigError> {
        config.validate()?;
        Ok(Self::build(host, config))
    }

    fn build(host: H, config: SchedulerConfig) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            host,
            config,
            inner: RefCell::new(Inner::new()),
            this: this.clone(),
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Submit a task that is eligible to run immediately.
    pub fn schedule(
        &self,
        priority: PriorityLevel,
        callback: impl FnOnce(bool) -> Continuation + 'static,
    ) -> TaskHandle {
        self.schedule_delayed(priority, callback, 0.0)
    }

    /// Submit a task for a callback that never splits into continuations.
    pub fn schedule_fn(
        &self,
        priority: PriorityLevel,
        callback: impl FnOnce(bool) + 'static,
    ) -> TaskHandle {
        self.schedule(priority, move |did_timeout| callback(did_timeout).into())
    }

    /// Submit a task that becomes eligible `delay_ms` from now.
    /// Negative or NaN delays count as zero.
    pub fn schedule_delayed(
        &self,
        priority: PriorityLevel,
        callback: impl FnOnce(bool) -> Continuation + 'static,
        delay_ms: f64,
    ) -> TaskHandle {
        let now = self.host.now();
        let delay = if delay_ms > 0.0 { delay_ms } else { 0.0 };
        let start_time = now + delay;
        let expiration_time = start_time + self.config.timeout(priority);
        let delayed = start_time > now;

        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.stats.admitted += 1;

        let key = inner.tasks.insert(Task {
            id,
            priority,
            start_time,
            expiration_time,
            callback: Some(Box::new(callback)),
            cancelled: false,
            location: if delayed {
                TaskLocation::Delayed
            } else {
                TaskLocation::Ready
            },
        });
        let handle = TaskHandle { key, id, priority };

        if delayed {
            inner.delayed_queue.push(QueueEntry {
                sort_key: start_time,
                id,
                key,
            });
            tracing::trace!(id, %priority, start_time, "task admitted to delayed queue");

            // While flushing, the drain pass picks up due tasks itself and arms
            // the timer when it goes idle.
            let earliest = inner.delayed_queue.peek().is_some_and(|e| e.key == key);
            if earliest && inner.phase != LoopPhase::Flushing {
                let stale = inner.timer.take();
                drop(inner);
                if let Some(stale) = stale {
                    self.host.cancel_host_timeout(stale);
                }
                self.arm_timer(start_time - now);
            }
        } else {
            inner.ready_queue.push(QueueEntry {
                sort_key: expiration_time,
                id,
                key,
            });
            tracing::trace!(id, %priority, expiration_time, "task admitted to ready queue");

            if inner.phase == LoopPhase::Idle {
                inner.phase = LoopPhase::LoopArmed;
                drop(inner);
                tracing::debug!("work loop armed by admission");
                self.request_host_callback();
            }
        }

        handle
    }

    /// Cancel a task. The task keeps its queue slot until it reaches the front,
    /// where it is dropped without running. Cancelling twice, or cancelling a
    /// task that already finished, does nothing.
    ///
    /// Cancelling a task from inside its own callback also drops any
    /// continuation that callback returns.
    pub fn cancel(&self, handle: &TaskHandle) {
        let mut inner = self.inner.borrow_mut();
        if let Some(task) = inner.tasks.get_mut(handle.key) {
            task.callback = None;
            task.cancelled = true;
            tracing::trace!(id = handle.id, "task cancelled");
        }
    }

    pub fn status(&self, handle: &TaskHandle) -> TaskStatus {
        let inner = self.inner.borrow();
        match inner.tasks.get(handle.key) {
            None => TaskStatus::Finished,
            Some(task) if task.cancelled => TaskStatus::Cancelled,
            Some(task) => match task.location {
                TaskLocation::Delayed => TaskStatus::Delayed,
                TaskLocation::Ready => TaskStatus::Ready,
            },
        }
    }

    /// True once the current slice has used up its budget.
    pub fn should_yield(&self) -> bool {
        let slice_start = self.inner.borrow().slice_start_time;
        self.host.now() - slice_start >= self.config.frame_yield_ms
    }

    /// Priority of the task currently executing, or `Normal` between tasks.
    pub fn current_priority_level(&self) -> PriorityLevel {
        self.inner.borrow().current_priority
    }

    /// Run `f` synchronously with [`current_priority_level`](Self::current_priority_level)
    /// reporting `priority`. The previous level is restored afterwards, even if `f` panics.
    pub fn run_with_priority<R>(&self, priority: PriorityLevel, f: impl FnOnce() -> R) -> R {
        struct Restore<'a, T> {
            inner: &'a RefCell<Inner<T>>,
            previous: PriorityLevel,
        }

        impl<T> Drop for Restore<'_, T> {
            fn drop(&mut self) {
                self.inner.borrow_mut().current_priority = self.previous;
            }
        }

        let previous = std::mem::replace(&mut self.inner.borrow_mut().current_priority, priority);
        let _restore = Restore {
            inner: &self.inner,
            previous,
        };
        f()
    }

    pub fn phase(&self) -> LoopPhase {
        self.inner.borrow().phase
    }

    /// Entries in the ready queue, including cancelled ones not yet discarded.
    pub fn ready_len(&self) -> usize {
        self.inner.borrow().ready_queue.len()
    }

    /// Entries in the delayed queue, including cancelled ones not yet discarded.
    pub fn delayed_len(&self) -> usize {
        self.inner.borrow().delayed_queue.len()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.borrow().timer.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.borrow().stats
    }

    fn request_host_callback(&self) {
        let this = self.this.clone();
        self.host.request_host_callback(Box::new(move || {
            if let Some(scheduler) = this.upgrade() {
                scheduler.perform_work_until_deadline();
            }
        }));
    }

    fn arm_timer(&self, delay_ms: f64) {
        let this = self.this.clone();
        let handle = self.host.request_host_timeout(
            delay_ms.max(0.0),
            Box::new(move || {
                if let Some(scheduler) = this.upgrade() {
                    scheduler.handle_timeout();
                }
            }),
        );
        tracing::debug!(delay_ms, "delayed-queue timer armed");
        let previous = self.inner.borrow_mut().timer.replace(handle);
        if let Some(previous) = previous {
            self.host.cancel_host_timeout(previous);
        }
    }

    fn cancel_timer(&self) {
        let armed = self.inner.borrow_mut().timer.take();
        if let Some(handle) = armed {
            tracing::debug!("delayed-queue timer cancelled");
            self.host.cancel_host_timeout(handle);
        }
    }

    /// The armed timer fired: promote due tasks, then either wake the work loop
    /// or re-arm for the next delayed task.
    fn handle_timeout(&self) {
        let now = self.host.now();
        let mut inner = self.inner.borrow_mut();
        inner.timer = None;
        let promoted = inner.advance_timers(now);
        tracing::debug!(promoted, "delayed-queue timer fired");
        let next_start = inner.delayed_queue.peek().map(|e| e.sort_key);

        if !inner.ready_queue.is_empty() {
            if inner.phase == LoopPhase::Idle {
                inner.phase = LoopPhase::LoopArmed;
                drop(inner);
                tracing::debug!("work loop armed by promotion");
                self.request_host_callback();
            }
        } else if let Some(next_start) = next_start {
            drop(inner);
            self.arm_timer(next_start - now);
        }
    }

    /// One host turn: drain the ready queue for up to one time slice.
    fn perform_work_until_deadline(&self) {
        let now = self.host.now();
        let previous_priority = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase != LoopPhase::LoopArmed {
                return;
            }
            inner.phase = LoopPhase::Flushing;
            inner.slice_start_time = now;
            inner.stats.slices += 1;
            inner.current_priority
        };
        // Promotion happens inside the drain pass while flushing.
        self.cancel_timer();

        let mut guard = FlushGuard {
            scheduler: self,
            previous_priority,
            has_more_work: None,
        };
        guard.has_more_work = Some(self.work_loop(now));
    }

    /// Runs when a flushing pass ends, including by unwinding out of a task callback.
    fn finish_flush(&self, previous_priority: PriorityLevel, has_more_work: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.current_priority = previous_priority;

        if has_more_work {
            inner.phase = LoopPhase::LoopArmed;
            drop(inner);
            tracing::debug!("time slice over, work loop re-armed");
            self.request_host_callback();
        } else {
            inner.phase = LoopPhase::Idle;
            let next_start = inner.delayed_queue.peek().map(|e| e.sort_key);
            drop(inner);
            tracing::debug!("ready queue drained, work loop idle");
            if let Some(next_start) = next_start {
                self.arm_timer(next_start - self.host.now());
            }
        }
    }

    /// Drains the ready queue until it empties, a task yields a continuation,
    /// or the slice budget runs out ahead of a task that is not yet overdue.
    /// Returns whether work remains.
    fn work_loop(&self, slice_start: f64) -> bool {
        self.inner.borrow_mut().advance_timers(slice_start);

        loop {
            let now = self.host.now();
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;

            let Some(entry) = inner.ready_queue.peek().copied() else {
                return false;
            };
            let Some(task) = inner
                .tasks
                .get_mut(entry.key)
                .filter(|task| task.callback.is_some())
            else {
                inner.discard_ready_front(entry.key);
                continue;
            };

            let did_timeout = task.expiration_time < now;
            if !did_timeout && now - inner.slice_start_time >= self.config.frame_yield_ms {
                return true;
            }

            let Some(callback) = task.callback.take() else {
                continue;
            };
            let priority = task.priority;
            inner.current_priority = priority;
            inner.stats.executed += 1;
            drop(guard);

            tracing::trace!(id = entry.id, %priority, did_timeout, "running task");
            let continuation = callback(did_timeout);

            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            match continuation {
                Continuation::Yield(next) => {
                    inner.stats.continuations += 1;
                    match inner.tasks.get_mut(entry.key) {
                        Some(task) if !task.cancelled => task.callback = Some(next),
                        _ => tracing::trace!(id = entry.id, "continuation of cancelled task dropped"),
                    }
                    inner.advance_timers(self.host.now());
                    return true;
                }
                Continuation::Done => {
                    inner.stats.completed += 1;
                    inner.tasks.remove(entry.key);
                    // A task admitted during the callback may have taken the front;
                    // the stale entry is then skipped when it surfaces.
                    if inner.ready_queue.peek().is_some_and(|front| front.key == entry.key) {
                        inner.ready_queue.pop();
                    }
                    inner.advance_timers(self.host.now());
                }
            }
        }
    }
}

impl<H: Host> Drop for Scheduler<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.get_mut().timer.take() {
            self.host.cancel_host_timeout(handle);
        }
    }
}

/// Releases the flushing state when a pass ends. If a task callback panicked,
/// `has_more_work` is still `None`: the loop is re-armed so the next turn
/// discards the failed task and carries on, and the panic keeps unwinding.
struct FlushGuard<'a, H: Host + 'static> {
    scheduler: &'a Scheduler<H>,
    previous_priority: PriorityLevel,
    has_more_work: Option<bool>,
}

impl<H: Host + 'static> Drop for FlushGuard<'_, H> {
    fn drop(&mut self) {
        let has_more_work = self.has_more_work.unwrap_or_else(|| {
            tracing::warn!("task callback panicked; resuming work loop on the next host turn");
            true
        });
        self.scheduler
            .finish_flush(self.previous_priority, has_more_work);
    }
}
