//! The lock itself.
//!
//! A [`Mutex`] pairs a validated [`LockBuffer`] with the wait strategy used
//! while contending for it. It never mutates after construction; cloning
//! it (or rebuilding it from the same buffer) yields another view of the
//! same lock word.

mod acquire;
mod guard;
mod handle;

pub use guard::{guard, guard_blocking, Acquire};
pub use handle::LockHandle;

use crate::buffer::{LockBuffer, LOCKED};
use crate::common::{IntoTimeout, LockError, Timeout};
use crate::wait::{self, WaitStrategy};
use std::fmt;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Where a mutex's buffer comes from.
pub enum Source<'a> {
    /// Derive a new buffer labelled with this identifier.
    Name(&'a str),
    /// Wrap an existing buffer.
    Buffer(LockBuffer),
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(name: &'a str) -> Self {
        Source::Name(name)
    }
}

impl<'a> From<&'a String> for Source<'a> {
    fn from(name: &'a String) -> Self {
        Source::Name(name.as_str())
    }
}

impl From<LockBuffer> for Source<'_> {
    fn from(buffer: LockBuffer) -> Self {
        Source::Buffer(buffer)
    }
}

impl From<&LockBuffer> for Source<'_> {
    fn from(buffer: &LockBuffer) -> Self {
        Source::Buffer(buffer.clone())
    }
}

#[derive(Clone)]
pub struct Mutex {
    buffer: LockBuffer,
    strategy: Arc<dyn WaitStrategy>,
}

impl Mutex {
    /// A mutex over a fresh one-word buffer, initially unlocked.
    pub fn create() -> Self {
        let buffer = LockBuffer::create();
        let strategy = wait::for_buffer(&buffer);
        Self { buffer, strategy }
    }

    /// Wrap an existing buffer, or derive a new one from an identifier.
    pub fn from_source<'a>(source: impl Into<Source<'a>>) -> Result<Self, LockError> {
        let buffer = match source.into() {
            Source::Name(name) => LockBuffer::from_name(name)?,
            Source::Buffer(buffer) => buffer,
        };
        let strategy = wait::for_buffer(&buffer);
        Self::with_strategy(buffer, strategy)
    }

    /// Use `strategy` instead of the process-wide one.
    pub fn with_strategy(
        buffer: LockBuffer,
        strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self, LockError> {
        buffer.validate()?;
        Ok(Self { buffer, strategy })
    }

    pub fn buffer(&self) -> &LockBuffer {
        &self.buffer
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Acquire without blocking the worker thread.
    ///
    /// `timeout` accepts a [`Timeout`], a `Duration`, or milliseconds;
    /// `f64::INFINITY` and [`Timeout::Unbounded`] never time out.
    pub async fn lock(&self, timeout: impl IntoTimeout) -> Result<LockHandle, LockError> {
        self.buffer.validate()?;
        let timeout = timeout.into_timeout()?;
        acquire::acquire(&self.buffer, &self.strategy, timeout).await
    }

    /// Acquire, parking the calling thread while contended.
    pub fn lock_blocking(&self, timeout: impl IntoTimeout) -> Result<LockHandle, LockError> {
        self.buffer.validate()?;
        let timeout = timeout.into_timeout()?;
        acquire::acquire_blocking(&self.buffer, &self.strategy, timeout)
    }

    /// Single compare-and-swap; `None` if the lock is held.
    pub fn try_lock(&self) -> Option<LockHandle> {
        self.buffer.validate().ok()?;
        acquire::try_acquire(&self.buffer)
            .then(|| LockHandle::new(self.buffer.clone(), Arc::clone(&self.strategy)))
    }

    /// Release the lock regardless of who holds it.
    ///
    /// Fails with [`LockError::NotLocked`] if the word is already unlocked.
    pub fn unlock(&self) -> Result<(), LockError> {
        handle::release(&self.buffer, &*self.strategy)
    }

    pub fn is_locked(&self) -> bool {
        self.buffer.word().load(Ordering::Acquire) == LOCKED
    }
}

impl Acquire for Mutex {
    fn acquire(
        &self,
        timeout: Timeout,
    ) -> impl Future<Output = Result<LockHandle, LockError>> + Send {
        self.lock(timeout)
    }

    fn acquire_blocking(&self, timeout: Timeout) -> Result<LockHandle, LockError> {
        self.lock_blocking(timeout)
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("buffer", &self.buffer)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
