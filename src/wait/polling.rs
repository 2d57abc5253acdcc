use super::{deadline_after, park, unpark_all, WaitFuture, WaitOutcome, WaitStrategy};
use crate::buffer::LockBuffer;
use crate::common::LockError;
use parking_lot_core::ParkResult;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

const DEFAULT_SLICE: Duration = Duration::from_millis(1);

/// Sliced waiting: block for at most one slice, re-check the word, repeat.
///
/// In-process releases still cut a slice short through `notify_all`;
/// releases from other processes are picked up at the next slice boundary.
#[derive(Clone, Copy, Debug)]
pub struct PollingWait {
    slice: Duration,
}

impl Default for PollingWait {
    fn default() -> Self {
        Self::new(DEFAULT_SLICE)
    }
}

enum Step {
    Done(WaitOutcome),
    Again,
}

impl PollingWait {
    pub fn new(slice: Duration) -> Self {
        Self {
            slice: slice.max(Duration::from_micros(50)),
        }
    }

    pub fn slice(&self) -> Duration {
        self.slice
    }

    fn step(&self, buffer: &LockBuffer, expected: u32, until: Option<Instant>, first: bool) -> Step {
        let changed = if first {
            WaitOutcome::Mismatch
        } else {
            WaitOutcome::Woken
        };
        if buffer.word().load(Ordering::SeqCst) != expected {
            return Step::Done(changed);
        }
        let now = Instant::now();
        if until.is_some_and(|u| now >= u) {
            return Step::Done(WaitOutcome::TimedOut);
        }
        let slice_end = now + self.slice;
        let end = until.map_or(slice_end, |u| u.min(slice_end));
        match park(buffer, expected, Some(end)) {
            ParkResult::Unparked(_) => Step::Done(WaitOutcome::Woken),
            ParkResult::Invalid => Step::Done(changed),
            ParkResult::TimedOut => Step::Again,
        }
    }
}

impl WaitStrategy for PollingWait {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn wait_blocking(
        &self,
        buffer: &LockBuffer,
        expected: u32,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, LockError> {
        let until = deadline_after(timeout);
        let mut first = true;
        loop {
            if let Step::Done(outcome) = self.step(buffer, expected, until, first) {
                return Ok(outcome);
            }
            first = false;
        }
    }

    fn wait<'a>(
        &'a self,
        buffer: &'a LockBuffer,
        expected: u32,
        timeout: Option<Duration>,
    ) -> WaitFuture<'a> {
        Box::pin(async move {
            let until = deadline_after(timeout);
            let mut first = true;
            loop {
                if let Step::Done(outcome) = self.step(buffer, expected, until, first) {
                    return Ok(outcome);
                }
                first = false;
                // Let other tasks on this worker run between slices.
                tokio::task::yield_now().await;
            }
        })
    }

    fn notify_all(&self, buffer: &LockBuffer) -> usize {
        unpark_all(buffer)
    }
}
