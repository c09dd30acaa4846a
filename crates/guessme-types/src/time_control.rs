use serde::{Deserialize, Serialize};

/// Countdown settings for timed rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    #[serde(default = "TimeControl::default_round_seconds")]
    pub round_seconds: u32,
    #[serde(default = "TimeControl::default_warning_threshold")]
    pub warning_threshold: u32,
}

impl TimeControl {
    pub const DEFAULT_WARNING_THRESHOLD: u32 = 10;

    pub fn new(round_seconds: u32) -> Self {
        Self {
            round_seconds,
            warning_threshold: Self::DEFAULT_WARNING_THRESHOLD,
        }
    }

    /// `0 < time_left <= warning_threshold`.
    pub fn is_warning(&self, time_left: u32) -> bool {
        time_left > 0 && time_left <= self.warning_threshold
    }

    fn default_round_seconds() -> u32 {
        60
    }

    fn default_warning_threshold() -> u32 {
        Self::DEFAULT_WARNING_THRESHOLD
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(Self::default_round_seconds())
    }
}
