//! Configuration type definitions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const MIN_POLL_SLICE_MS: u64 = 1;
pub const MAX_POLL_SLICE_MS: u64 = 1000;

/// Which wait/notify implementation backs acquisitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrategyKind {
    /// Use the native strategy when the host supports it.
    #[default]
    Auto,
    Native,
    Polling,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(StrategyKind::Auto),
            "native" => Ok(StrategyKind::Native),
            "polling" | "poll" => Ok(StrategyKind::Polling),
            other => Err(format!("unknown wait strategy {other:?}")),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Auto => "auto",
            StrategyKind::Native => "native",
            StrategyKind::Polling => "polling",
        })
    }
}

/// Wait/notify configuration.
#[derive(Clone, Debug)]
pub struct Wait {
    pub strategy: StrategyKind,
    /// Upper bound on one blocking slice of the polling strategy.
    pub poll_slice_ms: u64,
}

impl Default for Wait {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            poll_slice_ms: 1,
        }
    }
}

impl Wait {
    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms.clamp(MIN_POLL_SLICE_MS, MAX_POLL_SLICE_MS))
    }
}

/// Root configuration container.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub wait: Wait,
}
