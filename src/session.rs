//! Transfer session abstraction over the remote endpoint.
//!
//! The mirroring logic only talks to [`TransferSession`], which keeps the
//! protocol client swappable and lets tests drive the run with an in-memory
//! server.

use std::fmt::Display;
use std::io::Read;
use std::time::Duration;

use thiserror::Error;

/// Where and how to reach the remote endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    /// Host name or IP address of the server.
    pub host: String,
    /// Control connection port.
    pub port: u16,
    /// Bound on connecting and on individual socket reads and writes.
    pub timeout: Duration,
    /// Whether data connections use passive mode.
    pub passive: bool,
}

impl Endpoint {
    /// Renders `host:port` for connection and log messages.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors surfaced by a transfer session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the control connection cannot be established.
    #[error("failed to reach {address}: {message}")]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Resolver, socket or greeting error.
        message: String,
    },
    /// Raised when the server rejects or aborts a command.
    #[error("{operation} failed: {message}")]
    Command {
        /// Command that failed, for example `STOR /www/index.html`.
        operation: String,
        /// Server reply or transport error.
        message: String,
    },
    /// Raised when the local side of a transfer cannot be read.
    #[error("failed to read local file: {message}")]
    LocalRead {
        /// Operating system error string.
        message: String,
    },
}

impl SessionError {
    /// Builds a [`SessionError::Command`] from any displayable failure.
    pub fn command(operation: impl Into<String>, err: impl Display) -> Self {
        Self::Command {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

/// A connected handle to the remote endpoint.
///
/// Paths may be absolute or relative to the server-side working directory.
pub trait TransferSession {
    /// Logs in and switches the session to binary transfers.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Command`] when the server rejects the
    /// credentials.
    fn authenticate(&mut self, user: &str, secret: &str) -> Result<(), SessionError>;

    /// Changes the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Command`] when the directory does not exist or
    /// cannot be entered.
    fn change_directory(&mut self, path: &str) -> Result<(), SessionError>;

    /// Creates a single directory.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Command`] when the directory exists already or
    /// cannot be created.
    fn make_directory(&mut self, path: &str) -> Result<(), SessionError>;

    /// Returns the absolute working directory.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Command`] when the server refuses to report it.
    fn current_directory(&mut self) -> Result<String, SessionError>;

    /// Stores the bytes of `reader` at `remote_path`, replacing any existing
    /// file, and returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the transfer fails at either end.
    fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, SessionError>;

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Command`] when the server does not acknowledge
    /// the goodbye.
    fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens unauthenticated sessions.
pub trait SessionConnector {
    /// Session type produced by this connector.
    type Session: TransferSession;

    /// Connects to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connect`] when the endpoint cannot be reached
    /// within its timeout.
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Session, SessionError>;
}
