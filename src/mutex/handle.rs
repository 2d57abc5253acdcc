use crate::buffer::{LockBuffer, LOCKED, UNLOCKED};
use crate::common::LockError;
use crate::metrics::{Metrics, METRICS};
use crate::wait::WaitStrategy;
use log::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Locked -> Unlocked transition followed by waking every waiter.
pub(super) fn release(buffer: &LockBuffer, strategy: &dyn WaitStrategy) -> Result<(), LockError> {
    buffer.validate()?;
    buffer
        .word()
        .compare_exchange(LOCKED, UNLOCKED, Ordering::Release, Ordering::Relaxed)
        .map_err(|_| LockError::NotLocked)?;
    Metrics::bump(&METRICS.releases);
    let woken = strategy.notify_all(buffer);
    if woken > 0 {
        METRICS.woken.fetch_add(woken as u64, Ordering::Relaxed);
        trace!("released {:#x}, woke {} waiter(s)", buffer.addr(), woken);
    }
    Ok(())
}

/// Proof of one successful acquisition.
///
/// Releasing is idempotent and also happens on drop, so the lock is freed
/// on every exit path of the scope holding the handle.
pub struct LockHandle {
    buffer: LockBuffer,
    strategy: Arc<dyn WaitStrategy>,
    released: AtomicBool,
}

impl LockHandle {
    pub(super) fn new(buffer: LockBuffer, strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            buffer,
            strategy,
            released: AtomicBool::new(false),
        }
    }

    /// Release the lock this handle was issued for. Later calls do nothing.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            Metrics::bump(&METRICS.double_releases);
            return;
        }
        if let Err(e) = release(&self.buffer, &*self.strategy) {
            // Someone unlocked the word behind our back; nothing left to do.
            Metrics::bump(&METRICS.double_releases);
            debug!("handle release on {:#x} absorbed: {}", self.buffer.addr(), e);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn buffer(&self) -> &LockBuffer {
        &self.buffer
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.is_released() {
            self.release();
        }
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("buffer", &format_args!("{:#x}", self.buffer.addr()))
            .field("released", &self.is_released())
            .finish()
    }
}
