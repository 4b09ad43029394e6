mod common;

use common::{harness_with_config, log};
use pacer_scheduler::{
    ConfigError, EventLoop, ManualClock, PriorityLevel, PriorityTimeouts, Scheduler,
    SchedulerConfig,
};
use std::rc::Rc;

#[test]
fn test_config_from_json_fills_defaults() {
    let config: SchedulerConfig =
        serde_json::from_str(r#"{ "frame_yield_ms": 8.0, "timeouts": { "normal": 400.0 } }"#)
            .expect("valid json");

    assert_eq!(config.frame_yield_ms, 8.0);
    assert_eq!(config.timeouts.normal, 400.0);
    assert_eq!(config.timeouts.user_blocking, 250.0);
    assert_eq!(config.timeouts.low, 1000.0);
    assert_eq!(config.validate(), Ok(()));

    let empty: SchedulerConfig = serde_json::from_str("{}").expect("valid json");
    assert_eq!(empty, SchedulerConfig::default());
}

#[test]
fn test_fixed_levels_ignore_configured_timeouts() {
    let config = SchedulerConfig {
        frame_yield_ms: 5.0,
        timeouts: PriorityTimeouts {
            user_blocking: 10.0,
            normal: 20.0,
            low: 30.0,
        },
    };

    assert_eq!(config.timeout(PriorityLevel::Immediate), -1.0);
    assert_eq!(config.timeout(PriorityLevel::UserBlocking), 10.0);
    assert_eq!(config.timeout(PriorityLevel::Low), 30.0);
    assert_eq!(config.timeout(PriorityLevel::Idle), f64::MAX);
}

#[test]
fn test_validation_rejects_bad_values() {
    let zero_slice = SchedulerConfig {
        frame_yield_ms: 0.0,
        ..SchedulerConfig::default()
    };
    assert_eq!(
        zero_slice.validate().err(),
        Some(ConfigError::InvalidFrameYield(0.0))
    );

    let nan_slice = SchedulerConfig {
        frame_yield_ms: f64::NAN,
        ..SchedulerConfig::default()
    };
    assert!(matches!(
        nan_slice.validate(),
        Err(ConfigError::InvalidFrameYield(_))
    ));

    let negative = SchedulerConfig {
        timeouts: PriorityTimeouts {
            user_blocking: -1.0,
            ..PriorityTimeouts::default()
        },
        ..SchedulerConfig::default()
    };
    assert_eq!(
        negative.validate().err(),
        Some(ConfigError::InvalidTimeout {
            priority: PriorityLevel::UserBlocking,
            value: -1.0,
        })
    );

    let inverted = SchedulerConfig {
        timeouts: PriorityTimeouts {
            normal: 100.0,
            ..PriorityTimeouts::default()
        },
        ..SchedulerConfig::default()
    };
    let err = inverted.validate().err();
    assert_eq!(
        err,
        Some(ConfigError::TimeoutsOutOfOrder {
            higher: PriorityLevel::UserBlocking,
            higher_ms: 250.0,
            lower: PriorityLevel::Normal,
            lower_ms: 100.0,
        })
    );
    assert_eq!(
        err.map(|e| e.to_string()).unwrap_or_default(),
        "timeout for normal (100ms) is shorter than for more urgent user-blocking (250ms)"
    );
}

#[test]
fn test_scheduler_refuses_invalid_config() {
    let host = Rc::new(EventLoop::new(Rc::new(ManualClock::new())));
    let config = SchedulerConfig {
        frame_yield_ms: -3.0,
        ..SchedulerConfig::default()
    };

    let result = Scheduler::with_config(host, config);
    assert_eq!(result.err(), Some(ConfigError::InvalidFrameYield(-3.0)));
}

#[test]
fn test_longer_slice_runs_more_per_turn() {
    let h = harness_with_config(SchedulerConfig {
        frame_yield_ms: 8.0,
        ..SchedulerConfig::default()
    });
    let log = log();

    for i in 0..3 {
        let clock = h.clock.clone();
        let log = log.clone();
        h.scheduler.schedule_fn(PriorityLevel::Normal, move |_| {
            log.borrow_mut().push(i);
            clock.advance(3.0);
        });
    }

    h.host.tick();
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
    assert_eq!(h.scheduler.stats().slices, 1);
}

#[test]
fn test_priority_level_serde() {
    assert_eq!(
        serde_json::to_string(&PriorityLevel::UserBlocking).expect("serialize"),
        r#""user-blocking""#
    );
    assert_eq!(
        serde_json::from_str::<PriorityLevel>(r#""idle""#).expect("deserialize"),
        PriorityLevel::Idle
    );
    assert!(serde_json::from_str::<PriorityLevel>(r#""urgent""#).is_err());
}
