//! Error kinds (spec §7) and the fatal-path policy.
//!
//! Most of §7's kinds are fatal by policy: an OpenSHMEM program that hits
//! them has no meaningful recovery, so the library logs and aborts the
//! process rather than unwind through caller code that isn't expecting it.
//! `Result` still threads through the call stack so the abort point is a
//! single, testable spot (`abort_or_return`) instead of scattered
//! `process::abort()` calls, and so allocation failure (§7 kind 3, which is
//! *not* fatal for `malloc`-shaped APIs) can return normally.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, OshmemError>;

#[derive(Debug, Error)]
pub enum OshmemError {
    /// Null where a symmetric address is required; PE out of range;
    /// non-symmetric buffer; overlapping source/destination; zero stride;
    /// insufficient buffer size. §7 kind 1 — fatal.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any API call before `Engine::init`. §7 kind 2 — fatal.
    #[error("library not initialized")]
    Uninitialized,

    /// Allocator returned null for a nonzero request. §7 kind 3 — surfaced
    /// to the caller, not fatal, for the public `malloc`-shaped APIs.
    #[error("allocation failed for {requested} bytes")]
    AllocationFailed { requested: usize },

    /// Unknown algorithm name in configuration at init. §7 kind 4 — fatal.
    #[error("unknown algorithm {name:?} for family {family}")]
    RegistrationMiss { family: &'static str, name: String },

    /// Transport failure or dropped progress. §7 kind 5 — fatal, no retry.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl OshmemError {
    pub(crate) fn is_fatal(&self) -> bool {
        !matches!(self, OshmemError::AllocationFailed { .. })
    }
}

/// Apply §7's fatal-path policy: log at `error` and abort the process for
/// fatal kinds, otherwise return the error to the caller.
///
/// In `#[cfg(test)]` builds we never call `process::abort()` — tests assert
/// on the returned `Err` instead, since aborting the test harness would make
/// the fatal path untestable.
pub(crate) fn fatal<T>(err: OshmemError) -> Result<T> {
    if err.is_fatal() {
        tracing::error!(error = %err, "fatal oshmem error");
        #[cfg(not(test))]
        {
            std::process::abort();
        }
    }
    Err(err)
}
