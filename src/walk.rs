//! Deterministic enumeration of the regular files under a local root.
//!
//! The walk is lazy: a directory is listed only when the iterator reaches it.
//! Entries are sorted by name and visited depth first, so the sequence is
//! stable across runs. Symbolic links and special files are skipped rather
//! than followed, which keeps link cycles out of the walk.

use std::io;
use std::vec;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::{Dir, DirEntry, File};
use thiserror::Error;
use tracing::debug;

use crate::paths::RelativePath;

/// A regular file found under the local root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalFile {
    /// Location of the file on the local filesystem.
    pub absolute_path: Utf8PathBuf,
    /// Location relative to the local root, `/`-separated.
    pub relative_path: RelativePath,
}

/// Errors raised while walking the local tree.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WalkError {
    /// Raised when the local root cannot be opened as a directory.
    #[error("local root {path} is not a readable directory: {message}")]
    Root {
        /// Configured local root.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a directory below the root cannot be listed.
    #[error("failed to read directory {path}: {message}")]
    Read {
        /// Directory that could not be listed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised for a single directory entry that cannot be inspected, for
    /// example a name that is not valid UTF-8. Its siblings are still walked.
    #[error("skipped unreadable entry in {directory}: {message}")]
    Entry {
        /// Directory holding the entry.
        directory: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// An opened local root.
#[derive(Debug)]
pub struct LocalTree {
    root: Utf8PathBuf,
    dir: Dir,
}

impl LocalTree {
    /// Opens `root` for enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::Root`] when `root` is missing or not a directory.
    pub fn open(root: &Utf8Path) -> Result<Self, WalkError> {
        let dir =
            Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| WalkError::Root {
                path: root.to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Returns the root this tree was opened from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Starts a fresh walk over the tree. Each call restarts from the root.
    #[must_use]
    pub const fn files(&self) -> LocalFiles<'_> {
        LocalFiles {
            tree: self,
            started: false,
            stack: Vec::new(),
        }
    }

    /// Opens an enumerated file for reading.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file has disappeared or
    /// cannot be read.
    pub fn open_file(&self, file: &LocalFile) -> io::Result<std::fs::File> {
        self.dir
            .open(file.relative_path.as_str())
            .map(File::into_std)
    }
}

/// Lazy iterator over the regular files of a [`LocalTree`].
#[derive(Debug)]
pub struct LocalFiles<'tree> {
    tree: &'tree LocalTree,
    started: bool,
    stack: Vec<Frame>,
}

#[derive(Debug)]
struct Frame {
    dir: Dir,
    prefix: Option<RelativePath>,
    entries: vec::IntoIter<Entry>,
    failures: vec::IntoIter<String>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    kind: EntryKind,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EntryKind {
    File,
    Directory,
    Other,
}

impl Iterator for LocalFiles<'_> {
    type Item = Result<LocalFile, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            let opened = self
                .tree
                .dir
                .try_clone()
                .and_then(|dir| read_frame(dir, None));
            match opened {
                Ok(frame) => self.stack.push(frame),
                Err(err) => {
                    return Some(Err(WalkError::Read {
                        path: self.tree.root.clone(),
                        message: err.to_string(),
                    }));
                }
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            if let Some(message) = frame.failures.next() {
                let directory = frame.prefix.as_ref().map_or_else(
                    || self.tree.root.clone(),
                    |prefix| self.tree.root.join(prefix.as_str()),
                );
                return Some(Err(WalkError::Entry { directory, message }));
            }
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };

            let relative = frame.prefix.as_ref().map_or_else(
                || RelativePath::from_segment(&entry.name),
                |prefix| prefix.child(&entry.name),
            );

            match entry.kind {
                EntryKind::File => {
                    return Some(Ok(LocalFile {
                        absolute_path: self.tree.root.join(relative.as_str()),
                        relative_path: relative,
                    }));
                }
                EntryKind::Directory => {
                    let opened = frame
                        .dir
                        .open_dir(&entry.name)
                        .and_then(|dir| read_frame(dir, Some(relative.clone())));
                    match opened {
                        Ok(child) => self.stack.push(child),
                        Err(err) => {
                            return Some(Err(WalkError::Read {
                                path: self.tree.root.join(relative.as_str()),
                                message: err.to_string(),
                            }));
                        }
                    }
                }
                EntryKind::Other => {
                    debug!(path = %relative, "skipping symlink or special file");
                }
            }
        }
    }
}

fn read_frame(dir: Dir, prefix: Option<RelativePath>) -> io::Result<Frame> {
    let mut entries = Vec::new();
    let mut failures = Vec::new();
    for item in dir.entries()? {
        let dir_entry = match item {
            Ok(dir_entry) => dir_entry,
            Err(err) => {
                failures.push(err.to_string());
                break;
            }
        };
        match classify(&dir_entry) {
            Ok(entry) => entries.push(entry),
            Err(err) => failures.push(err.to_string()),
        }
    }
    entries.sort_by(|left, right| left.name.cmp(&right.name));

    Ok(Frame {
        dir,
        prefix,
        entries: entries.into_iter(),
        failures: failures.into_iter(),
    })
}

fn classify(dir_entry: &DirEntry) -> io::Result<Entry> {
    let name = dir_entry.file_name()?;
    let file_type = dir_entry.file_type()?;
    let kind = if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Other
    };
    Ok(Entry { name, kind })
}
