//! Hostwatch core library
//!
//! Liveness monitoring, remote snapshots and hot patches for a single
//! remote host. Chat delivery is abstracted behind [`notify::Notifier`].

pub mod monitor;
pub mod notify;
pub mod patch;
pub mod probe;
pub mod remote;
pub mod snapshot;
pub mod utils;

// Re-export commonly used types
pub use monitor::{MonitorEngine, StatusChecker};
pub use notify::{InteractionHandle, Notifier};
pub use utils::errors::{Result, WatchError};
