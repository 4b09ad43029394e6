use crate::priority::{
    IDLE_PRIORITY_TIMEOUT, IMMEDIATE_PRIORITY_TIMEOUT, LOW_PRIORITY_TIMEOUT,
    NORMAL_PRIORITY_TIMEOUT, PriorityLevel, USER_BLOCKING_PRIORITY_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of one time slice, in milliseconds.
pub const DEFAULT_FRAME_YIELD_MS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("frame_yield_ms must be a positive, finite number of milliseconds (got {0})")]
    InvalidFrameYield(f64),
    #[error("timeout for {priority} must be a non-negative number (got {value})")]
    InvalidTimeout { priority: PriorityLevel, value: f64 },
    #[error("timeout for {lower} ({lower_ms}ms) is shorter than for more urgent {higher} ({higher_ms}ms)")]
    TimeoutsOutOfOrder {
        higher: PriorityLevel,
        higher_ms: f64,
        lower: PriorityLevel,
        lower_ms: f64,
    },
}

/// Expiration timeouts for the configurable priority levels.
///
/// `Immediate` and `Idle` are fixed: one is overdue on admission, the other never expires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityTimeouts {
    pub user_blocking: f64,
    pub normal: f64,
    pub low: f64,
}

impl Default for PriorityTimeouts {
    fn default() -> Self {
        Self {
            user_blocking: USER_BLOCKING_PRIORITY_TIMEOUT,
            normal: NORMAL_PRIORITY_TIMEOUT,
            low: LOW_PRIORITY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Budget of a single flushing pass before the loop yields to the host.
    pub frame_yield_ms: f64,
    pub timeouts: PriorityTimeouts,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_yield_ms: DEFAULT_FRAME_YIELD_MS,
            timeouts: PriorityTimeouts::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn timeout(&self, priority: PriorityLevel) -> f64 {
        match priority {
            PriorityLevel::Immediate => IMMEDIATE_PRIORITY_TIMEOUT,
            PriorityLevel::UserBlocking => self.timeouts.user_blocking,
            PriorityLevel::Normal => self.timeouts.normal,
            PriorityLevel::Low => self.timeouts.low,
            PriorityLevel::Idle => IDLE_PRIORITY_TIMEOUT,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frame_yield_ms.is_finite() && self.frame_yield_ms > 0.0) {
            return Err(ConfigError::InvalidFrameYield(self.frame_yield_ms));
        }

        let levels = [
            PriorityLevel::UserBlocking,
            PriorityLevel::Normal,
            PriorityLevel::Low,
        ];
        for priority in levels {
            let value = self.timeout(priority);
            // NaN fails this comparison too.
            if !(value >= 0.0) {
                return Err(ConfigError::InvalidTimeout { priority, value });
            }
        }

        for pair in levels.windows(2) {
            let (higher, lower) = (pair[0], pair[1]);
            let (higher_ms, lower_ms) = (self.timeout(higher), self.timeout(lower));
            if lower_ms < higher_ms {
                return Err(ConfigError::TimeoutsOutOfOrder {
                    higher,
                    higher_ms,
                    lower,
                    lower_ms,
                });
            }
        }

        Ok(())
    }
}
