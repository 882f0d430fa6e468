use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Continuous usage past this point bumps the display to the caution color.
pub const CAUTION_THRESHOLD_SECS: u64 = 600;
/// Continuous usage past this point means the child should take a break.
pub const LIMIT_THRESHOLD_SECS: u64 = 1800;

/// Escalating continuous-usage scale. The backend speaks plain integers
/// (0/1/2), so the enum round-trips through `u8` on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(into = "u8", try_from = "u8")]
pub enum AlertLevel {
    Ok,
    Caution,
    Limit,
}

impl Default for AlertLevel {
    fn default() -> Self {
        AlertLevel::Ok
    }
}

impl AlertLevel {
    /// Derive the level from elapsed seconds. Pure; callers must re-derive on
    /// every tick and every applied sync rather than caching the result.
    pub fn for_elapsed(elapsed_seconds: u64) -> Self {
        if elapsed_seconds > LIMIT_THRESHOLD_SECS {
            AlertLevel::Limit
        } else if elapsed_seconds > CAUTION_THRESHOLD_SECS {
            AlertLevel::Caution
        } else {
            AlertLevel::Ok
        }
    }
}

impl From<AlertLevel> for u8 {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Ok => 0,
            AlertLevel::Caution => 1,
            AlertLevel::Limit => 2,
        }
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AlertLevel::Ok),
            1 => Ok(AlertLevel::Caution),
            2 => Ok(AlertLevel::Limit),
            other => Err(anyhow!("unknown alert level {other}")),
        }
    }
}
