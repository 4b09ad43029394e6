mod common;

use common::{harness, log};
use pacer_scheduler::{Continuation, LoopPhase, PriorityLevel, TaskHandle, TaskStatus};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_cancel_is_lazy_and_idempotent() {
    let h = harness();
    let log = log();

    {
        let log = log.clone();
        h.scheduler
            .schedule_fn(PriorityLevel::Normal, move |_| log.borrow_mut().push("a"));
    }
    let b = {
        let log = log.clone();
        h.scheduler
            .schedule_fn(PriorityLevel::Normal, move |_| log.borrow_mut().push("b"))
    };

    h.scheduler.cancel(&b);
    h.scheduler.cancel(&b);

    // The entry stays queued until it reaches the front.
    assert_eq!(h.scheduler.status(&b), TaskStatus::Cancelled);
    assert_eq!(h.scheduler.ready_len(), 2);

    h.host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["a"]);
    assert_eq!(h.scheduler.status(&b), TaskStatus::Finished);
    assert_eq!(h.scheduler.ready_len(), 0);

    let stats = h.scheduler.stats();
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.discarded, 1);

    h.scheduler.cancel(&b);
    assert_eq!(h.scheduler.stats().discarded, 1);
}

#[test]
fn test_cancel_after_completion_is_noop() {
    let h = harness();
    let handle = h.scheduler.schedule_fn(PriorityLevel::Low, |_| {});

    h.host.run_until_idle();
    assert_eq!(h.scheduler.status(&handle), TaskStatus::Finished);

    h.scheduler.cancel(&handle);
    assert_eq!(h.scheduler.status(&handle), TaskStatus::Finished);
    assert_eq!(h.scheduler.stats().discarded, 0);
}

#[test]
fn test_task_can_cancel_a_later_task() {
    let h = harness();
    let log = log();
    let victim: Rc<Cell<Option<TaskHandle>>> = Rc::new(Cell::new(None));

    {
        let scheduler = h.scheduler.clone();
        let victim = victim.clone();
        let log = log.clone();
        h.scheduler.schedule_fn(PriorityLevel::Immediate, move |_| {
            log.borrow_mut().push("canceller");
            if let Some(handle) = victim.get() {
                scheduler.cancel(&handle);
            }
        });
    }
    let handle = {
        let log = log.clone();
        h.scheduler
            .schedule_fn(PriorityLevel::Normal, move |_| log.borrow_mut().push("victim"))
    };
    victim.set(Some(handle));

    h.host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["canceller"]);
    assert_eq!(h.scheduler.status(&handle), TaskStatus::Finished);
    assert_eq!(h.scheduler.stats().discarded, 1);
}

#[test]
fn test_self_cancel_drops_returned_continuation() {
    let h = harness();
    let log = log();
    let own: Rc<Cell<Option<TaskHandle>>> = Rc::new(Cell::new(None));

    let handle = {
        let scheduler = h.scheduler.clone();
        let own = own.clone();
        let log = log.clone();
        h.scheduler.schedule(PriorityLevel::Normal, move |_| {
            log.borrow_mut().push("first");
            if let Some(handle) = own.get() {
                scheduler.cancel(&handle);
            }
            Continuation::then(move |_| {
                log.borrow_mut().push("never");
                Continuation::Done
            })
        })
    };
    own.set(Some(handle));

    h.host.tick();
    assert_eq!(h.scheduler.status(&handle), TaskStatus::Cancelled);

    h.host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["first"]);
    assert_eq!(h.scheduler.status(&handle), TaskStatus::Finished);
    assert_eq!(h.scheduler.phase(), LoopPhase::Idle);

    let stats = h.scheduler.stats();
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.continuations, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.discarded, 1);
}

#[test]
fn test_all_cancelled_queue_drains_without_running() {
    let h = harness();
    let ran = Rc::new(Cell::new(0));

    let handles: Vec<TaskHandle> = (0..10)
        .map(|_| {
            let ran = ran.clone();
            h.scheduler
                .schedule_fn(PriorityLevel::UserBlocking, move |_| ran.set(ran.get() + 1))
        })
        .collect();
    for handle in &handles {
        h.scheduler.cancel(handle);
    }

    h.host.run_until_idle();
    assert_eq!(ran.get(), 0);
    assert_eq!(h.scheduler.ready_len(), 0);
    assert_eq!(h.scheduler.stats().discarded, 10);
    assert_eq!(h.scheduler.stats().executed, 0);
    assert!(
        handles
            .iter()
            .all(|handle| h.scheduler.status(handle) == TaskStatus::Finished)
    );
}
