use super::registry::Registration;
use super::{deadline_after, park, unpark_all, PollingWait, WaitFuture, WaitOutcome, WaitStrategy};
use crate::buffer::LockBuffer;
use crate::common::LockError;
use log::*;
use parking_lot_core::ParkResult;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Address-keyed waiting; releases wake waiters directly.
///
/// Threads park on the word's address. Tasks register a waker under the
/// same address and are bounded by a tokio timer, so the async form needs
/// the runtime's time driver. Dropping the future deregisters it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeWait;

impl WaitStrategy for NativeWait {
    fn name(&self) -> &'static str {
        "native"
    }

    fn wait_blocking(
        &self,
        buffer: &LockBuffer,
        expected: u32,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, LockError> {
        Ok(match park(buffer, expected, deadline_after(timeout)) {
            ParkResult::Unparked(_) => WaitOutcome::Woken,
            ParkResult::Invalid => WaitOutcome::Mismatch,
            ParkResult::TimedOut => WaitOutcome::TimedOut,
        })
    }

    fn wait<'a>(
        &'a self,
        buffer: &'a LockBuffer,
        expected: u32,
        timeout: Option<Duration>,
    ) -> WaitFuture<'a> {
        Box::pin(async move {
            if tokio::runtime::Handle::try_current().is_err() {
                trace!("no tokio runtime, falling back to polling wait");
                let fallback = PollingWait::default();
                return fallback.wait(buffer, expected, timeout).await;
            }

            let until = deadline_after(timeout);
            let registration = Registration::new(buffer.addr());
            let notified = registration.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if buffer.word().load(Ordering::SeqCst) != expected {
                return Ok(WaitOutcome::Mismatch);
            }
            match until {
                None => {
                    notified.await;
                    Ok(WaitOutcome::Woken)
                }
                Some(until) => match tokio::time::timeout_at(until.into(), notified).await {
                    Ok(()) => Ok(WaitOutcome::Woken),
                    Err(_) => Ok(WaitOutcome::TimedOut),
                },
            }
        })
    }

    fn notify_all(&self, buffer: &LockBuffer) -> usize {
        unpark_all(buffer)
    }
}
