//! A single-threaded host: a FIFO of turns plus a timer heap.
//!
//! Each [`tick`](EventLoop::tick) first fires every timer whose deadline has
//! passed, then runs one queued turn. Cancelling a timer drops its callback
//! from the live set; dead heap entries are popped once they reach the front,
//! and the heap is rebuilt when they outnumber the live timers.

use crate::Host;
use crate::clock::Clock;
use pacer_heap::{Comparator, MinHeap};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::VecDeque;

pub type TimerId = u64;

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    deadline: f64,
    id: TimerId,
}

fn compare_timers(a: &TimerEntry, b: &TimerEntry) -> Ordering {
    a.deadline.total_cmp(&b.deadline).then(a.id.cmp(&b.id))
}

pub struct EventLoop<C: Clock> {
    clock: C,
    turns: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    timers: RefCell<MinHeap<TimerEntry>>,
    live_timers: RefCell<FxHashMap<TimerId, Box<dyn FnOnce()>>>,
    next_timer_id: Cell<TimerId>,
}

impl<C: Clock> EventLoop<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            turns: RefCell::new(VecDeque::new()),
            timers: RefCell::new(MinHeap::with_comparator(
                compare_timers as Comparator<TimerEntry>,
            )),
            live_timers: RefCell::new(FxHashMap::default()),
            next_timer_id: Cell::new(0),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Queue `turn` behind every turn already pending.
    pub fn post(&self, turn: impl FnOnce() + 'static) {
        self.turns.borrow_mut().push_back(Box::new(turn));
    }

    pub fn set_timeout(&self, delay_ms: f64, callback: impl FnOnce() + 'static) -> TimerId {
        self.insert_timer(delay_ms, Box::new(callback))
    }

    /// Returns `false` if the timer already fired or was cancelled.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let removed = self.live_timers.borrow_mut().remove(&id).is_some();
        if removed {
            self.compact_timers();
        }
        removed
    }

    pub fn pending_turns(&self) -> usize {
        self.turns.borrow().len()
    }

    /// Armed timers, not counting cancelled ones still sitting in the heap.
    pub fn pending_timers(&self) -> usize {
        self.live_timers.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.turns.borrow().is_empty() && self.live_timers.borrow().is_empty()
    }

    /// Deadline of the earliest live timer.
    pub fn next_deadline(&self) -> Option<f64> {
        let live = self.live_timers.borrow();
        let mut timers = self.timers.borrow_mut();
        while let Some(entry) = timers.peek() {
            if live.contains_key(&entry.id) {
                return Some(entry.deadline);
            }
            timers.pop();
        }
        None
    }

    /// Fires due timers, then runs at most one queued turn.
    /// Returns whether turns or timers remain afterwards.
    pub fn tick(&self) -> bool {
        let fired = self.fire_due_timers();
        // The queue borrow ends before the turn runs so the turn can post more.
        let turn = self.turns.borrow_mut().pop_front();
        let ran = turn.map(|turn| turn()).is_some();
        tracing::trace!(fired, ran, "event loop tick");
        !self.is_idle()
    }

    /// Drives the loop until no turns and no timers remain, waiting on the
    /// clock whenever the only outstanding work is a future timer.
    pub fn run_until_idle(&self) {
        loop {
            if self.pending_turns() > 0 || self.has_due_timer() {
                self.tick();
                continue;
            }
            match self.next_deadline() {
                Some(deadline) => self.clock.wait_until(deadline),
                None => return,
            }
        }
    }

    /// Like [`run_until_idle`](Self::run_until_idle) but stops once the clock
    /// reaches `deadline`. Timers due later stay armed.
    pub fn run_until(&self, deadline: f64) {
        loop {
            if self.pending_turns() > 0 || self.has_due_timer() {
                self.tick();
                continue;
            }
            match self.next_deadline() {
                Some(next) if next <= deadline => self.clock.wait_until(next),
                _ => {
                    self.clock.wait_until(deadline);
                    if !self.has_due_timer() {
                        return;
                    }
                }
            }
        }
    }

    fn has_due_timer(&self) -> bool {
        self.next_deadline()
            .is_some_and(|deadline| deadline <= self.clock.now())
    }

    /// Pops cancelled entries off the front, and rebuilds the heap once
    /// cancelled entries make up more than half of it.
    fn compact_timers(&self) {
        let live = self.live_timers.borrow();
        let mut timers = self.timers.borrow_mut();
        while timers.peek().is_some_and(|entry| !live.contains_key(&entry.id)) {
            timers.pop();
        }
        if timers.len() > 2 * live.len() {
            let before = timers.len();
            timers.retain(|entry| live.contains_key(&entry.id));
            tracing::trace!(before, after = timers.len(), "timer heap rebuilt");
        }
    }

    fn insert_timer(&self, delay_ms: f64, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);
        let delay = if delay_ms > 0.0 { delay_ms } else { 0.0 };
        let deadline = self.clock.now() + delay;
        self.timers.borrow_mut().push(TimerEntry { deadline, id });
        self.live_timers.borrow_mut().insert(id, callback);
        id
    }

    /// Only timers armed before this call are eligible, so a callback that
    /// arms a zero-delay timer does not run it in the same tick.
    fn fire_due_timers(&self) -> usize {
        let horizon = self.next_timer_id.get();
        let mut fired = 0;
        loop {
            let now = self.clock.now();
            let callback = {
                let mut timers = self.timers.borrow_mut();
                let Some(&entry) = timers.peek() else { break };
                let mut live = self.live_timers.borrow_mut();
                if !live.contains_key(&entry.id) {
                    timers.pop();
                    continue;
                }
                if entry.deadline > now || entry.id >= horizon {
                    break;
                }
                timers.pop();
                live.remove(&entry.id)
            };
            if let Some(callback) = callback {
                callback();
                fired += 1;
            }
        }
        fired
    }
}

impl<C: Clock> Host for EventLoop<C> {
    type TimerHandle = TimerId;

    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn request_host_timeout(&self, delay_ms: f64, callback: Box<dyn FnOnce()>) -> TimerId {
        self.insert_timer(delay_ms, callback)
    }

    fn cancel_host_timeout(&self, handle: TimerId) {
        self.clear_timeout(handle);
    }

    fn request_host_callback(&self, callback: Box<dyn FnOnce()>) {
        self.turns.borrow_mut().push_back(callback);
    }
}
