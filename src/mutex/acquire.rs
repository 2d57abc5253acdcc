//! Acquisition state machine, written once per execution form.
//!
//! Idle -> Attempting -> Acquired
//!                    -> Waiting -> Attempting (retry)
//!                    -> TimedOut | Interrupted
//!
//! Validation and the compare-and-swap fast path never suspend; the async
//! form only suspends inside the wait primitive.

use super::handle::LockHandle;
use crate::buffer::{LockBuffer, LOCKED, UNLOCKED};
use crate::common::{Deadline, LockError, Timeout};
use crate::metrics::{Metrics, METRICS};
use crate::wait::{WaitOutcome, WaitStrategy};
use log::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// One Unlocked -> Locked attempt.
#[inline]
pub(super) fn try_acquire(buffer: &LockBuffer) -> bool {
    buffer
        .word()
        .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
}

/// What to do after a failed attempt.
enum Next {
    Wait,
    Fail(LockError),
}

struct Attempt<'a> {
    buffer: &'a LockBuffer,
    strategy: &'a Arc<dyn WaitStrategy>,
    deadline: Deadline,
    contended: bool,
}

impl<'a> Attempt<'a> {
    fn begin(buffer: &'a LockBuffer, strategy: &'a Arc<dyn WaitStrategy>, timeout: Timeout) -> Self {
        Self {
            buffer,
            strategy,
            deadline: Deadline::start(timeout),
            contended: false,
        }
    }

    fn acquired(&self) -> LockHandle {
        Metrics::bump(&METRICS.acquisitions);
        if self.contended {
            trace!(
                "acquired {:#x} after {:?} of contention",
                self.buffer.addr(),
                self.deadline.elapsed()
            );
        }
        LockHandle::new(self.buffer.clone(), Arc::clone(self.strategy))
    }

    fn on_contention(&mut self) -> Next {
        if !self.contended {
            self.contended = true;
            Metrics::bump(&METRICS.contended);
        }
        if self.deadline.expired() {
            return Next::Fail(self.timed_out());
        }
        Metrics::bump(&METRICS.waits);
        trace!(
            "waiting on {:#x} via {} (remaining {:?})",
            self.buffer.addr(),
            self.strategy.name(),
            self.deadline.remaining()
        );
        Next::Wait
    }

    /// `None` means retry the compare-and-swap.
    fn after_wait(&self, outcome: Result<WaitOutcome, LockError>) -> Option<LockError> {
        match outcome {
            Ok(WaitOutcome::Woken) | Ok(WaitOutcome::Mismatch) => None,
            Ok(WaitOutcome::TimedOut) => Some(self.timed_out()),
            Err(e) => {
                Metrics::bump(&METRICS.interrupted);
                warn!("wait on {:#x} interrupted: {}", self.buffer.addr(), e);
                Some(e)
            }
        }
    }

    fn timed_out(&self) -> LockError {
        Metrics::bump(&METRICS.timeouts);
        debug!(
            "lock {:#x} not acquired within {}",
            self.buffer.addr(),
            self.deadline.timeout()
        );
        self.deadline.timed_out_error()
    }
}

/// Blocking form: may park the calling thread.
pub(super) fn acquire_blocking(
    buffer: &LockBuffer,
    strategy: &Arc<dyn WaitStrategy>,
    timeout: Timeout,
) -> Result<LockHandle, LockError> {
    let mut attempt = Attempt::begin(buffer, strategy, timeout);
    loop {
        if try_acquire(buffer) {
            return Ok(attempt.acquired());
        }
        if let Next::Fail(e) = attempt.on_contention() {
            return Err(e);
        }
        let outcome = strategy.wait_blocking(buffer, LOCKED, attempt.deadline.remaining());
        if let Some(e) = attempt.after_wait(outcome) {
            return Err(e);
        }
    }
}

/// Suspending form: only awaits inside the wait primitive.
pub(super) async fn acquire(
    buffer: &LockBuffer,
    strategy: &Arc<dyn WaitStrategy>,
    timeout: Timeout,
) -> Result<LockHandle, LockError> {
    let mut attempt = Attempt::begin(buffer, strategy, timeout);
    loop {
        if try_acquire(buffer) {
            return Ok(attempt.acquired());
        }
        if let Next::Fail(e) = attempt.on_contention() {
            return Err(e);
        }
        let outcome = strategy
            .wait(buffer, LOCKED, attempt.deadline.remaining())
            .await;
        if let Some(e) = attempt.after_wait(outcome) {
            return Err(e);
        }
    }
}
