//! Wait/notify primitive over a lock word.
//!
//! A [`WaitStrategy`] suspends a participant until the word stops holding
//! an expected value, or a timeout elapses. Two strategies exist:
//! - [`NativeWait`] parks on the word's address and is woken directly by
//!   `notify_all`; the async form registers the task under the same address
//!   and holds no thread while suspended.
//! - [`PollingWait`] re-checks the word in short blocking slices, yielding
//!   to the scheduler between slices in the async form. It is the only
//!   strategy that notices releases made by other processes.
//!
//! The process-wide strategy is chosen once from [`Config::from_env`].

mod native;
mod polling;
mod registry;

pub use native::NativeWait;
pub use polling::PollingWait;

use crate::buffer::{LockBuffer, Sharing};
use crate::common::LockError;
use crate::config::{Config, StrategyKind, Wait};
use log::*;
use once_cell::sync::Lazy;
use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The word changed while we were waiting.
    Woken,
    /// The word no longer held the expected value when the wait began.
    Mismatch,
    TimedOut,
}

pub type WaitFuture<'a> =
    Pin<Box<dyn Future<Output = Result<WaitOutcome, LockError>> + Send + 'a>>;

/// Interchangeable wait/notify implementation injected into a mutex.
pub trait WaitStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Block the calling thread while the word equals `expected`.
    ///
    /// `timeout` of `None` waits without bound.
    fn wait_blocking(
        &self,
        buffer: &LockBuffer,
        expected: u32,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, LockError>;

    /// Suspend the calling task while the word equals `expected`.
    fn wait<'a>(
        &'a self,
        buffer: &'a LockBuffer,
        expected: u32,
        timeout: Option<Duration>,
    ) -> WaitFuture<'a>;

    /// Wake every participant waiting on the word. Returns how many were woken.
    fn notify_all(&self, buffer: &LockBuffer) -> usize;
}

/// Park the current thread on the word's address until unparked or `until`.
///
/// The word is re-checked under the parking lot's bucket lock, so a release
/// that lands between the caller's check and the park yields `Invalid`
/// rather than a lost wakeup.
pub(crate) fn park(buffer: &LockBuffer, expected: u32, until: Option<Instant>) -> ParkResult {
    let word = buffer.word();
    // SAFETY: the callbacks neither panic nor touch the parking lot.
    unsafe {
        parking_lot_core::park(
            buffer.addr(),
            || word.load(Ordering::SeqCst) == expected,
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            until,
        )
    }
}

/// Wake parked threads and registered tasks alike, whichever strategy
/// they wait with.
pub(crate) fn unpark_all(buffer: &LockBuffer) -> usize {
    // SAFETY: no parking lot callbacks are active on this thread.
    let threads = unsafe { parking_lot_core::unpark_all(buffer.addr(), DEFAULT_UNPARK_TOKEN) };
    threads + registry::wake(buffer.addr())
}

pub(crate) fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

/// Build the strategy named by `cfg`.
pub fn select(cfg: &Wait) -> Arc<dyn WaitStrategy> {
    match cfg.strategy {
        StrategyKind::Auto | StrategyKind::Native => Arc::new(NativeWait),
        StrategyKind::Polling => Arc::new(PollingWait::new(cfg.poll_slice())),
    }
}

static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

static GLOBAL: Lazy<Arc<dyn WaitStrategy>> = Lazy::new(|| {
    let strategy = select(&CONFIG.wait);
    debug!(
        "wait strategy: {} (configured {}, poll slice {:?})",
        strategy.name(),
        CONFIG.wait.strategy,
        CONFIG.wait.poll_slice()
    );
    strategy
});

static CROSS_PROCESS: Lazy<Arc<dyn WaitStrategy>> =
    Lazy::new(|| Arc::new(PollingWait::new(CONFIG.wait.poll_slice())));

/// The process-wide strategy, selected on first use.
pub fn global() -> Arc<dyn WaitStrategy> {
    Arc::clone(&GLOBAL)
}

/// The strategy a buffer should use by default.
///
/// Memory shared with other processes never sees their notifications, so
/// it always polls.
pub fn for_buffer(buffer: &LockBuffer) -> Arc<dyn WaitStrategy> {
    match buffer.sharing() {
        Sharing::Process => Arc::clone(&CROSS_PROCESS),
        Sharing::Thread | Sharing::Private => global(),
    }
}
