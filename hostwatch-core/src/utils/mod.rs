//! Utility modules shared by the library and the daemon.

pub mod errors;
pub mod logger;

pub use errors::{Result, WatchError};
