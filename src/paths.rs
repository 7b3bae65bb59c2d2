//! Canonical path handling shared by the local walker and the remote side.
//!
//! Local relative paths and remote paths are both expressed with `/`
//! separators regardless of the host platform. Every join between a remote
//! directory and a relative path goes through [`remote_join`] so the remote
//! layout never depends on where the tool runs.

use std::fmt;

use thiserror::Error;

/// Errors raised while normalising a path.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PathError {
    /// Raised when the path has no usable segments.
    #[error("path is empty")]
    Empty,
    /// Raised when a segment would climb out of its root.
    #[error("path {path} must not contain `..` segments")]
    ParentSegment {
        /// Path as supplied by the caller.
        path: String,
    },
    /// Raised when a path that must be relative starts at the root.
    #[error("path {path} must be relative")]
    Absolute {
        /// Path as supplied by the caller.
        path: String,
    },
}

/// A `/`-separated path relative to a local or remote root.
///
/// The value never contains empty, `.` or `..` segments and never starts or
/// ends with a separator.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RelativePath(String);

impl RelativePath {
    /// Parses `raw`, accepting either `/` or `\` as the separator.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Absolute`] for rooted input,
    /// [`PathError::ParentSegment`] when a `..` segment is present, and
    /// [`PathError::Empty`] when nothing remains after normalisation.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') {
            return Err(PathError::Absolute {
                path: raw.to_owned(),
            });
        }

        let segments = split_segments(&unified, raw)?;
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(segments.join("/")))
    }

    /// Builds a single-segment path from a directory entry name.
    pub(crate) fn from_segment(name: &str) -> Self {
        Self(name.to_owned())
    }

    /// Appends a directory entry name to this path.
    #[must_use]
    pub(crate) fn child(&self, name: &str) -> Self {
        Self(format!("{}/{name}", self.0))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the individual segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Yields every leading sub-path: `a`, `a/b`, `a/b/c` for `a/b/c`.
    pub fn prefixes(&self) -> impl Iterator<Item = Self> + '_ {
        let mut walked = String::new();
        self.segments().map(move |segment| {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(segment);
            Self(walked.clone())
        })
    }

    /// Returns the directory containing this path, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_owned()))
    }

    /// Returns the final segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The configured remote root after normalisation.
///
/// An absolute root (`/srv/www`) is resolved from the server's `/`; a
/// relative one (`www`) from the directory the server places the user in
/// after login. `.` and `/` are both valid and carry no segments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteRoot {
    absolute: bool,
    path: Option<RelativePath>,
}

impl RemoteRoot {
    /// Parses and normalises a remote root.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Empty`] for blank input and
    /// [`PathError::ParentSegment`] when a `..` segment is present.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let unified = raw.trim().replace('\\', "/");
        if unified.is_empty() {
            return Err(PathError::Empty);
        }

        let absolute = unified.starts_with('/');
        let segments = split_segments(&unified, raw)?;
        let path = if segments.is_empty() {
            None
        } else {
            Some(RelativePath(segments.join("/")))
        };
        Ok(Self { absolute, path })
    }

    /// Returns `true` when the root is resolved from the server's `/`.
    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Returns the segments below the starting directory, if any.
    #[must_use]
    pub const fn path(&self) -> Option<&RelativePath> {
        self.path.as_ref()
    }
}

impl fmt::Display for RemoteRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.absolute, &self.path) {
            (true, Some(path)) => write!(f, "/{path}"),
            (true, None) => f.write_str("/"),
            (false, Some(path)) => write!(f, "{path}"),
            (false, None) => f.write_str("."),
        }
    }
}

/// Joins a remote directory and a relative path with exactly one separator.
///
/// # Examples
///
/// ```
/// # use ftp_mirror::paths::{RelativePath, remote_join};
/// let file = RelativePath::parse("assets\\app.js").expect("valid path");
/// assert_eq!(remote_join("/www/", &file), "/www/assets/app.js");
/// assert_eq!(remote_join("/", &file), "/assets/app.js");
/// ```
#[must_use]
pub fn remote_join(base: &str, relative: &RelativePath) -> String {
    let trimmed = base.trim_end_matches('/');
    if !trimmed.is_empty() {
        return format!("{trimmed}/{relative}");
    }
    if base.starts_with('/') {
        format!("/{relative}")
    } else {
        relative.to_string()
    }
}

fn split_segments<'a>(unified: &'a str, raw: &str) -> Result<Vec<&'a str>, PathError> {
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(PathError::ParentSegment {
                    path: raw.to_owned(),
                });
            }
            other => segments.push(other),
        }
    }
    Ok(segments)
}
