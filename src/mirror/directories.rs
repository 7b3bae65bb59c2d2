//! Idempotent creation of remote directory chains.

use tracing::{debug, warn};

use crate::paths::{RelativePath, remote_join};
use crate::session::TransferSession;

/// Result of ensuring a remote directory chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DirectoryOutcome {
    /// At least one segment of the chain was created.
    Created,
    /// Every segment existed before the call.
    AlreadyExists,
    /// A segment could not be entered or created.
    Denied {
        /// Remote directory that failed.
        directory: String,
        /// Server reply explaining the failure.
        reason: String,
    },
}

impl DirectoryOutcome {
    /// Returns `true` when files can be stored below the chain.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// Makes sure `baseline/relative` exists, creating missing segments one at a
/// time from `baseline` downwards.
///
/// Each segment is probed by changing into it. A segment that cannot be
/// entered is created and then entered. When creation fails but the segment
/// can be entered afterwards, another client (or an earlier partial run)
/// created it first and the segment counts as existing. Any other failure
/// stops the descent and is reported as [`DirectoryOutcome::Denied`].
///
/// The working directory is back at `baseline` when this returns.
pub fn ensure_directories<S>(
    session: &mut S,
    baseline: &str,
    relative: &RelativePath,
) -> DirectoryOutcome
where
    S: TransferSession + ?Sized,
{
    if let Err(err) = session.change_directory(baseline) {
        return DirectoryOutcome::Denied {
            directory: baseline.to_owned(),
            reason: err.to_string(),
        };
    }

    let outcome = descend(session, baseline, relative);

    if let Err(err) = session.change_directory(baseline) {
        warn!(baseline, error = %err, "failed to return to the remote root");
    }
    outcome
}

fn descend<S>(session: &mut S, baseline: &str, relative: &RelativePath) -> DirectoryOutcome
where
    S: TransferSession + ?Sized,
{
    let mut created = false;

    for prefix in relative.prefixes() {
        let segment = prefix.file_name();
        if session.change_directory(segment).is_ok() {
            continue;
        }

        let directory = remote_join(baseline, &prefix);
        match session.make_directory(segment) {
            Ok(()) => {
                debug!(directory = %directory, "created remote directory");
                created = true;
            }
            Err(err) => {
                if session.change_directory(segment).is_ok() {
                    debug!(directory = %directory, "remote directory appeared concurrently");
                    continue;
                }
                return DirectoryOutcome::Denied {
                    directory,
                    reason: err.to_string(),
                };
            }
        }

        if let Err(err) = session.change_directory(segment) {
            return DirectoryOutcome::Denied {
                directory,
                reason: err.to_string(),
            };
        }
    }

    if created {
        DirectoryOutcome::Created
    } else {
        DirectoryOutcome::AlreadyExists
    }
}
