//! Configuration module for wordlock.
//!
//! This module provides the configuration types and parsing logic:
//! - `Config` - Root configuration container
//! - `Wait` - Wait/notify strategy selection and polling granularity

mod parser;
mod types;

pub use parser::{load_config, parse_config};
pub use types::*;
