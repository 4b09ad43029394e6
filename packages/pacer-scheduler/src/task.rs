use crate::priority::PriorityLevel;
use slotmap::new_key_type;
use std::cmp::Ordering;
use std::fmt;

new_key_type! {
    pub struct TaskKey;
}

/// A unit of work. The argument reports whether the task had already missed
/// its expiration time when this call started.
pub type Callback = Box<dyn FnOnce(bool) -> Continuation>;

/// What a callback hands back to the work loop.
pub enum Continuation {
    /// The task is finished.
    Done,
    /// The task has more work; run this next, in a later slice.
    Yield(Callback),
}

impl Continuation {
    pub fn then(next: impl FnOnce(bool) -> Continuation + 'static) -> Self {
        Continuation::Yield(Box::new(next))
    }
}

/// A callback that returns nothing has finished.
impl From<()> for Continuation {
    fn from(_: ()) -> Self {
        Continuation::Done
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Done => f.write_str("Done"),
            Continuation::Yield(_) => f.write_str("Yield(..)"),
        }
    }
}

/// Which queue currently holds a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskLocation {
    Delayed,
    Ready,
}

/// Observable state of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for its start time.
    Delayed,
    /// Eligible to run; may be mid-way through a chain of continuations.
    Ready,
    /// Cancelled, but still occupying a queue slot until it reaches the front.
    Cancelled,
    /// Ran to completion, or was cancelled and has since been discarded.
    Finished,
}

pub(crate) struct Task {
    pub id: u64,
    pub priority: PriorityLevel,
    pub start_time: f64,
    pub expiration_time: f64,
    /// `None` while the callback is executing, after completion, or after cancellation.
    pub callback: Option<Callback>,
    pub cancelled: bool,
    pub location: TaskLocation,
}

/// A task's membership in one queue. `sort_key` is the start time in the
/// delayed queue and the expiration time in the ready queue, fixed at enqueue.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueEntry {
    pub sort_key: f64,
    pub id: u64,
    pub key: TaskKey,
}

pub(crate) fn compare_entries(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    a.sort_key.total_cmp(&b.sort_key).then(a.id.cmp(&b.id))
}

/// Returned by `Scheduler::schedule`; pass it to `cancel` or `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub(crate) key: TaskKey,
    pub(crate) id: u64,
    pub(crate) priority: PriorityLevel,
}

impl TaskHandle {
    /// Admission order within the scheduler that issued this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn priority(&self) -> PriorityLevel {
        self.priority
    }
}
