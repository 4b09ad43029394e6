use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Scheduling urgency, most urgent first.
///
/// The derived `Ord` follows declaration order, so `Immediate < Idle`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityLevel {
    /// Already overdue when admitted; never deferred by the time slice.
    Immediate,
    UserBlocking,
    #[default]
    Normal,
    Low,
    /// Never expires by timeout; runs once nothing else is ready.
    Idle,
}

/// Timeout for `Immediate` tasks. Negative, so the expiration time lies
/// before the start time and the task reports overdue on its first run.
pub const IMMEDIATE_PRIORITY_TIMEOUT: f64 = -1.0;
pub const USER_BLOCKING_PRIORITY_TIMEOUT: f64 = 250.0;
pub const NORMAL_PRIORITY_TIMEOUT: f64 = 500.0;
pub const LOW_PRIORITY_TIMEOUT: f64 = 1000.0;
pub const IDLE_PRIORITY_TIMEOUT: f64 = f64::MAX;

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::Immediate,
        PriorityLevel::UserBlocking,
        PriorityLevel::Normal,
        PriorityLevel::Low,
        PriorityLevel::Idle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Immediate => "immediate",
            PriorityLevel::UserBlocking => "user-blocking",
            PriorityLevel::Normal => "normal",
            PriorityLevel::Low => "low",
            PriorityLevel::Idle => "idle",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown priority level `{0}`")]
pub struct ParsePriorityError(pub String);

impl FromStr for PriorityLevel {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(PriorityLevel::Immediate),
            "user-blocking" | "user_blocking" | "userblocking" => Ok(PriorityLevel::UserBlocking),
            "normal" => Ok(PriorityLevel::Normal),
            "low" => Ok(PriorityLevel::Low),
            "idle" => Ok(PriorityLevel::Idle),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        for level in PriorityLevel::ALL {
            assert_eq!(level.to_string().parse::<PriorityLevel>(), Ok(level));
        }
        assert_eq!("User_Blocking".parse(), Ok(PriorityLevel::UserBlocking));
        assert!("urgent".parse::<PriorityLevel>().is_err());
    }

    #[test]
    fn test_ordering_is_by_urgency() {
        assert!(PriorityLevel::Immediate < PriorityLevel::UserBlocking);
        assert!(PriorityLevel::Low < PriorityLevel::Idle);
        assert_eq!(PriorityLevel::default(), PriorityLevel::Normal);
    }
}
