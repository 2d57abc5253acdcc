//! Common types shared across the crate.
//!
//! - Error types for unified error handling
//! - Timeout parsing and deadline tracking

pub mod error;
pub mod time;

pub use error::{ErrorKind, LockError};
pub use time::{format_millis, Deadline, IntoTimeout, Timeout};
