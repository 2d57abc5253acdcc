//! Timeout values and per-acquisition deadlines.

use super::error::LockError;
use std::fmt;
use std::time::{Duration, Instant};

/// How long an acquisition may contend before giving up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Timeout {
    #[default]
    Unbounded,
    After(Duration),
}

impl Timeout {
    pub fn millis(ms: u64) -> Self {
        Timeout::After(Duration::from_millis(ms))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Timeout::Unbounded)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Unbounded => write!(f, "unbounded"),
            Timeout::After(d) => f.write_str(&format_millis(*d)),
        }
    }
}

/// Render a duration in milliseconds with an `ms` suffix.
///
/// Whole milliseconds print without a fraction (`10ms`); sub-millisecond
/// precision prints as an exact decimal down to the nanosecond (`2.5ms`).
pub fn format_millis(d: Duration) -> String {
    let nanos = d.as_nanos();
    let (ms, frac) = (nanos / 1_000_000, nanos % 1_000_000);
    if frac == 0 {
        format!("{}ms", ms)
    } else {
        let frac = format!("{:06}", frac);
        format!("{}.{}ms", ms, frac.trim_end_matches('0'))
    }
}

/// Conversion into a validated [`Timeout`].
///
/// Integer and float inputs are milliseconds. `f64::INFINITY` is the
/// unbounded sentinel.
pub trait IntoTimeout {
    fn into_timeout(self) -> Result<Timeout, LockError>;
}

impl IntoTimeout for Timeout {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        Ok(self)
    }
}

impl IntoTimeout for Duration {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        Ok(Timeout::After(self))
    }
}

impl IntoTimeout for Option<Duration> {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        Ok(self.map_or(Timeout::Unbounded, Timeout::After))
    }
}

impl IntoTimeout for u32 {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        Ok(Timeout::millis(self as u64))
    }
}

impl IntoTimeout for u64 {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        Ok(Timeout::millis(self))
    }
}

impl IntoTimeout for i32 {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        (self as i64).into_timeout()
    }
}

impl IntoTimeout for i64 {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        if self < 0 {
            return Err(LockError::InvalidTimeout(format!(
                "expected a non-negative number of milliseconds, got {}",
                self
            )));
        }
        Ok(Timeout::millis(self as u64))
    }
}

impl IntoTimeout for f64 {
    fn into_timeout(self) -> Result<Timeout, LockError> {
        if self.is_nan() {
            return Err(LockError::InvalidTimeout("timeout is not a number".into()));
        }
        if self < 0.0 {
            return Err(LockError::InvalidTimeout(format!(
                "expected a non-negative number of milliseconds, got {}",
                self
            )));
        }
        if self.is_infinite() {
            return Ok(Timeout::Unbounded);
        }
        // Whole nanoseconds, so the value renders back as written.
        let nanos = (self * 1_000_000.0).round();
        if nanos >= u64::MAX as f64 {
            // Centuries away: nothing will ever reach it.
            return Ok(Timeout::Unbounded);
        }
        Ok(Timeout::After(Duration::from_nanos(nanos as u64)))
    }
}

/// Deadline derived once per acquisition attempt.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    timeout: Timeout,
    started: Instant,
    at: Option<Instant>,
}

impl Deadline {
    pub fn start(timeout: Timeout) -> Self {
        let started = Instant::now();
        let at = match timeout {
            Timeout::Unbounded => None,
            Timeout::After(d) => started.checked_add(d),
        };
        Self { timeout, started, at }
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn timed_out_error(&self) -> LockError {
        LockError::AcquisitionTimedOut {
            timeout: self.timeout.to_string(),
        }
    }
}
