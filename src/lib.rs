#![deny(clippy::all)]
#![warn(unused_crate_dependencies)]

//! A mutual-exclusion lock living in one shared 32-bit word.
//!
//! The same lock word can be contended from blocking threads
//! ([`Mutex::lock_blocking`]) and from async tasks ([`Mutex::lock`]).
//! Waiters sleep on a wait/notify primitive and every release wakes all of
//! them; there is no fairness and no re-entrancy.

pub mod buffer;
pub mod common;
pub mod config;
pub mod metrics;
pub mod mutex;
pub mod wait;

pub use buffer::{ForeignRegion, LockBuffer, Region, SharedWords, Sharing};
pub use common::{ErrorKind, IntoTimeout, LockError, Timeout};
pub use mutex::{guard, guard_blocking, Acquire, LockHandle, Mutex, Source};
pub use wait::{NativeWait, PollingWait, WaitOutcome, WaitStrategy};
