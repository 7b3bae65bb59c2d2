//! Orchestrates one mirror run end to end.
//!
//! The run opens the local tree, connects and logs in, enters (creating if
//! needed) the remote root, uploads every file and closes the session.
//! Failures before the upload loop abort the run. Failures of individual
//! files are counted and the loop carries on. Once a session exists it is
//! closed on every exit path.

use std::fmt::{self, Display};
use std::io::Write;

use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::config::{ConfigError, MirrorConfig};
use crate::mirror::{
    DirectoryOutcome, RetryPolicy, UploadOutcome, ensure_directories, upload_with_retry,
};
use crate::paths::{RemoteRoot, remote_join};
use crate::session::{SessionConnector, SessionError, TransferSession};
use crate::walk::{LocalFile, LocalTree, WalkError};

/// Stages of a run, in the order they are entered.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum RunStage {
    /// Opening the local root, before any network activity.
    Preparing,
    /// Establishing the control connection.
    Connecting,
    /// Logging in.
    Authenticating,
    /// Entering or creating the remote root.
    Navigating,
    /// Mirroring files.
    Uploading,
    /// Ending the session.
    Closing,
    /// Reporting the summary.
    Done,
}

impl Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preparing => "preparing",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Navigating => "navigating",
            Self::Uploading => "uploading",
            Self::Closing => "closing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Raised when the local root cannot be opened. No connection is made.
    #[error(transparent)]
    MissingSource(#[from] WalkError),
    /// Raised when the server cannot be reached.
    #[error(transparent)]
    Connection(SessionError),
    /// Raised when the server rejects the credentials.
    #[error("login rejected: {message}")]
    Authentication {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
    /// Raised when the remote root cannot be entered or created.
    #[error("remote root {root} is unusable: {message}")]
    RemoteRoot {
        /// Remote root as configured.
        root: String,
        /// Human-readable description of the failure.
        message: String,
    },
}

impl RunError {
    /// Returns the stage the run was in when it aborted.
    #[must_use]
    pub const fn stage(&self) -> RunStage {
        match self {
            Self::MissingSource(_) => RunStage::Preparing,
            Self::Connection(_) => RunStage::Connecting,
            Self::Authentication { .. } => RunStage::Authenticating,
            Self::RemoteRoot { .. } => RunStage::Navigating,
        }
    }
}

/// Counters reported at the end of a completed run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Files stored on the server.
    pub files_uploaded: usize,
    /// Files that could not be read or stored.
    pub files_failed: usize,
    /// Attempts beyond the first, summed over every file.
    pub retries: u32,
    /// Remote directories that could not be created.
    pub directories_denied: usize,
    /// Whether the session acknowledged the close.
    pub closed_cleanly: bool,
}

impl RunSummary {
    /// Returns `true` when every file was uploaded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.files_failed == 0
    }
}

/// Executes the mirror run using the provided connector.
#[derive(Debug)]
pub struct RunOrchestrator<C> {
    connector: C,
    config: MirrorConfig,
    remote_root: RemoteRoot,
    retry: RetryPolicy,
}

impl<C: SessionConnector> RunOrchestrator<C> {
    /// Creates a new orchestrator from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn new(config: MirrorConfig, connector: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let remote_root = config.parsed_remote_root()?;
        Ok(Self {
            connector,
            config,
            remote_root,
            retry: RetryPolicy::default(),
        })
    }

    /// Overrides the retry policy.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Returns the configuration the orchestrator was built with.
    #[must_use]
    pub const fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Runs the mirror and returns the per-file tally.
    ///
    /// One progress line per file is written to `progress`, plus a line for
    /// each retry and each directory that could not be created. A run whose
    /// files all failed still returns `Ok`; check
    /// [`RunSummary::is_success`].
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the local root is unusable, the server
    /// cannot be reached, the login is rejected or the remote root cannot be
    /// entered.
    pub fn execute<W: Write>(&self, progress: &mut W) -> Result<RunSummary, RunError> {
        let local_root = self.config.local_root_path();
        info!(stage = %RunStage::Preparing, local_root = %local_root, "opening local tree");
        let tree = LocalTree::open(&local_root)?;

        let endpoint = self.config.endpoint();
        info!(stage = %RunStage::Connecting, address = %endpoint.address(), "connecting");
        let mut session = self
            .connector
            .connect(&endpoint)
            .map_err(RunError::Connection)?;
        writeln!(progress, "connected to {}", endpoint.address()).ok();

        let username = self.config.username.trim();
        info!(stage = %RunStage::Authenticating, username, "logging in");
        if let Err(err) = session.authenticate(username, &self.config.password) {
            let message = close_with_note(&mut session, &err);
            return Err(RunError::Authentication {
                message,
                source: err,
            });
        }

        info!(stage = %RunStage::Navigating, remote_root = %self.remote_root, "entering remote root");
        let baseline = match self.navigate(&mut session) {
            Ok(baseline) => baseline,
            Err(reason) => {
                let message = close_with_note(&mut session, &reason);
                return Err(RunError::RemoteRoot {
                    root: self.remote_root.to_string(),
                    message,
                });
            }
        };
        writeln!(progress, "mirroring {} to {baseline}", tree.root()).ok();

        info!(stage = %RunStage::Uploading, baseline = %baseline, "uploading files");
        let mut summary = TreeUpload {
            session: &mut session,
            tree: &tree,
            baseline: &baseline,
            retry: &self.retry,
            progress,
            summary: RunSummary::default(),
        }
        .run();

        info!(stage = %RunStage::Closing, "closing session");
        summary.closed_cleanly = match session.close() {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to close session");
                false
            }
        };

        info!(
            stage = %RunStage::Done,
            files_uploaded = summary.files_uploaded,
            files_failed = summary.files_failed,
            "run finished"
        );
        Ok(summary)
    }

    /// Enters the remote root, creating it when absent, and returns its
    /// absolute path as reported by the server.
    fn navigate<S: TransferSession>(&self, session: &mut S) -> Result<String, String> {
        let login_directory = session.current_directory().map_err(|err| err.to_string())?;
        info!(login_directory = %login_directory, "logged in");

        let start = if self.remote_root.is_absolute() {
            String::from("/")
        } else {
            login_directory
        };
        let target = match self.remote_root.path() {
            Some(path) => {
                if let DirectoryOutcome::Denied { directory, reason } =
                    ensure_directories(session, &start, path)
                {
                    return Err(format!("cannot create {directory}: {reason}"));
                }
                remote_join(&start, path)
            }
            None => start,
        };

        session
            .change_directory(&target)
            .map_err(|err| err.to_string())?;
        session.current_directory().map_err(|err| err.to_string())
    }
}

/// Upload loop state for one pass over the local tree.
struct TreeUpload<'run, S, W> {
    session: &'run mut S,
    tree: &'run LocalTree,
    baseline: &'run str,
    retry: &'run RetryPolicy,
    progress: &'run mut W,
    summary: RunSummary,
}

impl<S: TransferSession, W: Write> TreeUpload<'_, S, W> {
    fn run(mut self) -> RunSummary {
        let tree = self.tree;
        for item in tree.files() {
            match item {
                Ok(file) => self.upload_file(&file),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable local entry");
                    writeln!(self.progress, "[failed] {err}").ok();
                    self.summary.files_failed += 1;
                }
            }
        }
        self.summary
    }

    fn upload_file(&mut self, file: &LocalFile) {
        let _span = info_span!("file", path = %file.relative_path).entered();

        if let Some(parent) = file.relative_path.parent()
            && let DirectoryOutcome::Denied { directory, reason } =
                ensure_directories(&mut *self.session, self.baseline, &parent)
        {
            warn!(directory = %directory, reason = %reason, "cannot create remote directory; uploading anyway");
            writeln!(self.progress, "[warn] cannot create {directory}: {reason}").ok();
            self.summary.directories_denied += 1;
        }

        let remote_path = remote_join(self.baseline, &file.relative_path);
        let outcome = match self.tree.open_file(file) {
            Ok(mut reader) => {
                let progress = &mut *self.progress;
                let relative = &file.relative_path;
                upload_with_retry(
                    &mut *self.session,
                    &mut reader,
                    &remote_path,
                    self.retry,
                    |notice| {
                        writeln!(
                            progress,
                            "[retry {}/{}] {relative}: {}",
                            notice.attempt, notice.max_attempts, notice.error
                        )
                        .ok();
                    },
                )
            }
            Err(err) => UploadOutcome::Failed {
                attempts: 0,
                error: SessionError::LocalRead {
                    message: err.to_string(),
                },
            },
        };

        self.record(file, &outcome);
    }

    fn record(&mut self, file: &LocalFile, outcome: &UploadOutcome) {
        self.summary.retries += outcome.retries();
        match outcome {
            UploadOutcome::Uploaded { attempts, bytes } => {
                info!(bytes, attempts, "uploaded");
                self.summary.files_uploaded += 1;
                writeln!(self.progress, "[ok] {}", file.relative_path).ok();
            }
            UploadOutcome::Failed { attempts, error } => {
                self.summary.files_failed += 1;
                writeln!(
                    self.progress,
                    "[failed] {} after {attempts} attempt(s): {error}",
                    file.relative_path
                )
                .ok();
            }
        }
    }
}

fn close_with_note<S: TransferSession, E: Display>(session: &mut S, err: &E) -> String {
    let close_error = session.close().err();
    append_close_note(err.to_string(), close_error.as_ref())
}

fn append_close_note<E: Display>(message: String, close_error: Option<&E>) -> String {
    if let Some(close) = close_error {
        format!("{message} (close also failed: {close})")
    } else {
        message
    }
}
