//! Remote directory creation and retried uploads.
//!
//! These are the two per-file steps of a mirror run. The orchestrator in
//! [`crate::run`] sequences them over the local tree.

mod directories;
mod upload;

pub use directories::{DirectoryOutcome, ensure_directories};
pub use upload::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryNotice, RetryPolicy, UploadOutcome,
    upload_with_retry,
};

#[cfg(test)]
mod tests;
