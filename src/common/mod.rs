//! Shared infrastructure: the `Result`/`Error` alias, shared-mutability
//! primitives, and configuration.

pub mod config;
pub mod error;

pub use error::Error;
pub use parking_lot::{Mutex, MutexGuard};
use std::result::Result as StdResult;
pub use std::sync::Arc;

pub type Result<T> = StdResult<T, Error>;

/// Unix seconds "now". Centralized so unlock-time comparisons have one
/// call site.
pub fn now_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}
