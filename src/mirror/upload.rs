//! Single-file uploads with a bounded number of attempts.

use std::io::{Read, Seek};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::session::{SessionError, TransferSession};

/// Total attempts made for one file before it is counted as failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between two attempts on the same file.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How often and how patiently a failed store is retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. A zero attempt count is raised to one.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        let attempts = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts: attempts,
            delay,
        }
    }

    /// Overrides the pause between attempts.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the total number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Final result of uploading one file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UploadOutcome {
    /// One of the attempts stored the file.
    Uploaded {
        /// Attempts used, including the successful one.
        attempts: u32,
        /// Bytes reported by the session.
        bytes: u64,
    },
    /// Every attempt failed, or the file could not be opened.
    Failed {
        /// Attempts made; zero when the local file could not be opened.
        attempts: u32,
        /// Error from the last attempt.
        error: SessionError,
    },
}

impl UploadOutcome {
    /// Returns `true` when the file reached the server.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }

    /// Returns the number of attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Uploaded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Returns the number of attempts beyond the first.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.attempts().saturating_sub(1)
    }
}

/// Details of a failed attempt that is about to be retried.
#[derive(Clone, Copy, Debug)]
pub struct RetryNotice<'a> {
    /// Attempt that just failed, starting at one.
    pub attempt: u32,
    /// Total attempts allowed by the policy.
    pub max_attempts: u32,
    /// Why the attempt failed.
    pub error: &'a SessionError,
}

/// Stores `reader` at `remote_path`, retrying failed attempts according to
/// `policy`.
///
/// The reader is rewound before every attempt so a partially sent file is
/// resent from the start. `on_retry` runs after each failed attempt that
/// will be followed by another one. Only the error of the final attempt is
/// kept in the outcome.
pub fn upload_with_retry<S, R, F>(
    session: &mut S,
    reader: &mut R,
    remote_path: &str,
    policy: &RetryPolicy,
    mut on_retry: F,
) -> UploadOutcome
where
    S: TransferSession + ?Sized,
    R: Read + Seek,
    F: FnMut(&RetryNotice<'_>),
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match store_once(session, reader, remote_path) {
            Ok(bytes) => {
                return UploadOutcome::Uploaded {
                    attempts: attempt,
                    bytes,
                };
            }
            Err(err) => err,
        };

        if attempt >= policy.max_attempts() {
            warn!(remote_path, attempts = attempt, error = %error, "upload failed");
            return UploadOutcome::Failed {
                attempts: attempt,
                error,
            };
        }

        warn!(
            remote_path,
            attempt,
            max_attempts = policy.max_attempts(),
            error = %error,
            "upload attempt failed; retrying"
        );
        on_retry(&RetryNotice {
            attempt,
            max_attempts: policy.max_attempts(),
            error: &error,
        });
        if !policy.delay().is_zero() {
            thread::sleep(policy.delay());
        }
    }
}

fn store_once<S, R>(session: &mut S, reader: &mut R, remote_path: &str) -> Result<u64, SessionError>
where
    S: TransferSession + ?Sized,
    R: Read + Seek,
{
    reader.rewind().map_err(|err| SessionError::LocalRead {
        message: err.to_string(),
    })?;
    session.store(remote_path, reader)
}
