//! Core library for the `ftp-mirror` uploader.
//!
//! The crate walks a local directory tree and mirrors every regular file to
//! a directory on an FTP server. Remote directories are created on demand,
//! each file gets a bounded number of attempts, and the run reports how many
//! files made it across. The protocol client sits behind
//! [`session::TransferSession`] so the mirroring logic can be exercised
//! against [`test_support::MemoryServer`].

pub mod config;
pub mod ftp;
pub mod mirror;
pub mod paths;
pub mod run;
pub mod session;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;
pub mod walk;

pub use config::{ConfigError, MirrorConfig};
pub use ftp::{FtpConnector, FtpSession};
pub use mirror::{
    DirectoryOutcome, RetryPolicy, UploadOutcome, ensure_directories, upload_with_retry,
};
pub use paths::{PathError, RelativePath, RemoteRoot, remote_join};
pub use run::{RunError, RunOrchestrator, RunStage, RunSummary};
pub use session::{Endpoint, SessionConnector, SessionError, TransferSession};
pub use walk::{LocalFile, LocalTree, WalkError};
