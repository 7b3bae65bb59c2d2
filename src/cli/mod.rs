//! Command-line interface definitions for the `ftp-mirror` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser};

/// Top-level CLI for the `ftp-mirror` binary.
///
/// Connection settings and credentials come from `ftp-mirror.toml` and
/// `FTP_MIRROR_*` environment variables. The flags only override the two
/// roots and the log verbosity.
#[derive(Debug, Parser)]
#[command(
    name = "ftp-mirror",
    version,
    about = "Mirror a local directory tree to an FTP server"
)]
pub(crate) struct Cli {
    /// Local directory to upload (overrides `local_root`).
    #[arg(long, value_name = "PATH")]
    pub(crate) local_root: Option<String>,
    /// Remote directory receiving the tree (overrides `remote_root`).
    ///
    /// Relative values start from the login directory, absolute values from
    /// the server root. Missing directories are created.
    #[arg(long, value_name = "PATH")]
    pub(crate) remote_root: Option<String>,
    /// Increase log detail on stderr; repeat for debug output.
    ///
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}
