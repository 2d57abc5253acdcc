//! Run a unit of work while holding a lock.

use super::handle::LockHandle;
use crate::common::{IntoTimeout, LockError, Timeout};
use std::future::Future;

/// Anything that can hand out a [`LockHandle`].
pub trait Acquire {
    fn acquire(
        &self,
        timeout: Timeout,
    ) -> impl Future<Output = Result<LockHandle, LockError>> + Send;

    fn acquire_blocking(&self, timeout: Timeout) -> Result<LockHandle, LockError>;
}

/// Acquire `mutex`, await `work`, release, then return the work's result.
///
/// The lock is released before the result (or error) is handed back, and
/// also if `work` panics or the returned future is dropped mid-way.
pub async fn guard<M, F, Fut, T, E>(mutex: &M, timeout: impl IntoTimeout, work: F) -> Result<T, E>
where
    M: Acquire + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let timeout = timeout.into_timeout()?;
    let handle = mutex.acquire(timeout).await?;
    let result = work().await;
    handle.release();
    result
}

/// Blocking counterpart of [`guard`].
pub fn guard_blocking<M, F, T, E>(mutex: &M, timeout: impl IntoTimeout, work: F) -> Result<T, E>
where
    M: Acquire + ?Sized,
    F: FnOnce() -> Result<T, E>,
    E: From<LockError>,
{
    let timeout = timeout.into_timeout()?;
    let handle = mutex.acquire_blocking(timeout)?;
    let result = work();
    handle.release();
    result
}
