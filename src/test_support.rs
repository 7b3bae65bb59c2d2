//! Test support utilities shared across unit and integration tests.
//!
//! [`MemoryServer`] is an in-memory stand-in for an FTP server. It keeps a
//! directory tree and file contents, records every operation it receives and
//! can be scripted to refuse connections, reject logins, deny directory
//! creation or fail stores a set number of times.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::rc::Rc;

use crate::session::{Endpoint, SessionConnector, SessionError, TransferSession};

/// One operation received by a [`MemoryServer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// A connection attempt.
    Connect {
        /// Address that was dialled.
        address: String,
    },
    /// A login attempt.
    Authenticate {
        /// User name supplied by the client.
        user: String,
    },
    /// A working directory change, resolved to an absolute path.
    ChangeDirectory {
        /// Absolute target directory.
        path: String,
    },
    /// A directory creation request, resolved to an absolute path.
    MakeDirectory {
        /// Absolute directory to create.
        path: String,
    },
    /// A working directory query.
    CurrentDirectory,
    /// A store request, resolved to an absolute path.
    Store {
        /// Absolute file path.
        path: String,
    },
    /// A session close.
    Close,
}

#[derive(Debug)]
struct ServerState {
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    home: String,
    credentials: Option<(String, String)>,
    refuse_connections: bool,
    denied_directories: BTreeSet<String>,
    store_failures: HashMap<String, u32>,
    fail_close: bool,
    open_sessions: usize,
    operations: Vec<Operation>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            directories: BTreeSet::from([String::from("/")]),
            files: BTreeMap::new(),
            home: String::from("/"),
            credentials: None,
            refuse_connections: false,
            denied_directories: BTreeSet::new(),
            store_failures: HashMap::new(),
            fail_close: false,
            open_sessions: 0,
            operations: Vec::new(),
        }
    }
}

impl ServerState {
    fn add_directory_chain(&mut self, path: &str) {
        let mut current = String::new();
        for segment in resolve("/", path).split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            self.directories.insert(current.clone());
        }
    }
}

/// In-memory FTP server double.
#[derive(Clone, Debug, Default)]
pub struct MemoryServer {
    state: Rc<RefCell<ServerState>>,
}

impl MemoryServer {
    /// Creates an empty server whose login directory is `/`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory sessions start in after connecting, creating it.
    #[must_use]
    pub fn with_home(self, home: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.add_directory_chain(home);
            state.home = resolve("/", home);
        }
        self
    }

    /// Only accepts `user` with `password`; any credentials pass otherwise.
    #[must_use]
    pub fn with_credentials(self, user: &str, password: &str) -> Self {
        self.state.borrow_mut().credentials = Some((user.to_owned(), password.to_owned()));
        self
    }

    /// Makes every subsequent connection attempt fail.
    pub fn refuse_connections(&self) {
        self.state.borrow_mut().refuse_connections = true;
    }

    /// Creates `path` and any missing parents.
    pub fn add_directory(&self, path: &str) {
        self.state.borrow_mut().add_directory_chain(path);
    }

    /// Rejects creation of the absolute directory `path`.
    pub fn deny_directory(&self, path: &str) {
        self.state
            .borrow_mut()
            .denied_directories
            .insert(resolve("/", path));
    }

    /// Fails the next `times` stores to the absolute file `path`.
    pub fn fail_store(&self, path: &str, times: u32) {
        self.state
            .borrow_mut()
            .store_failures
            .insert(resolve("/", path), times);
    }

    /// Makes session close report an error.
    pub fn fail_close(&self) {
        self.state.borrow_mut().fail_close = true;
    }

    /// Returns a connector that opens sessions on this server.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Returns every stored file keyed by absolute path.
    #[must_use]
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.state.borrow().files.clone()
    }

    /// Returns the contents stored at the absolute path `path`.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.borrow().files.get(path).cloned()
    }

    /// Returns every directory, including `/`.
    #[must_use]
    pub fn directories(&self) -> BTreeSet<String> {
        self.state.borrow().directories.clone()
    }

    /// Returns a snapshot of the operations received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.state.borrow().operations.clone()
    }

    /// Counts store requests for the absolute path `path`.
    #[must_use]
    pub fn store_attempts(&self, path: &str) -> usize {
        self.state
            .borrow()
            .operations
            .iter()
            .filter(|op| matches!(op, Operation::Store { path: stored } if stored == path))
            .count()
    }

    /// Returns the number of sessions connected and not yet closed.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.state.borrow().open_sessions
    }

    fn record(&self, operation: Operation) {
        self.state.borrow_mut().operations.push(operation);
    }
}

/// Connector handing out [`MemorySession`]s.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    server: MemoryServer,
}

impl SessionConnector for MemoryConnector {
    type Session = MemorySession;

    fn connect(&self, endpoint: &Endpoint) -> Result<MemorySession, SessionError> {
        let address = endpoint.address();
        self.server.record(Operation::Connect {
            address: address.clone(),
        });

        let mut state = self.server.state.borrow_mut();
        if state.refuse_connections {
            return Err(SessionError::Connect {
                address,
                message: String::from("Connection refused (os error 111)"),
            });
        }
        state.open_sessions += 1;

        Ok(MemorySession {
            server: self.server.clone(),
            cwd: state.home.clone(),
            authenticated: false,
            closed: false,
        })
    }
}

/// A session on a [`MemoryServer`].
#[derive(Debug)]
pub struct MemorySession {
    server: MemoryServer,
    cwd: String,
    authenticated: bool,
    closed: bool,
}

impl MemorySession {
    fn require_login(&self, operation: &str) -> Result<(), SessionError> {
        if self.authenticated && !self.closed {
            Ok(())
        } else {
            Err(SessionError::command(operation, "530 Please login with USER and PASS."))
        }
    }
}

impl TransferSession for MemorySession {
    fn authenticate(&mut self, user: &str, secret: &str) -> Result<(), SessionError> {
        self.server.record(Operation::Authenticate {
            user: user.to_owned(),
        });
        let state = self.server.state.borrow();
        if let Some((expected_user, expected_secret)) = &state.credentials
            && (expected_user != user || expected_secret != secret)
        {
            return Err(SessionError::command(
                format!("USER {user}"),
                "530 Login incorrect.",
            ));
        }
        self.authenticated = true;
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> Result<(), SessionError> {
        let target = resolve(&self.cwd, path);
        self.server.record(Operation::ChangeDirectory {
            path: target.clone(),
        });
        let operation = format!("CWD {path}");
        self.require_login(&operation)?;

        if self.server.state.borrow().directories.contains(&target) {
            self.cwd = target;
            Ok(())
        } else {
            Err(SessionError::command(
                operation,
                "550 Failed to change directory.",
            ))
        }
    }

    fn make_directory(&mut self, path: &str) -> Result<(), SessionError> {
        let target = resolve(&self.cwd, path);
        self.server.record(Operation::MakeDirectory {
            path: target.clone(),
        });
        let operation = format!("MKD {path}");
        self.require_login(&operation)?;

        let mut state = self.server.state.borrow_mut();
        if state.denied_directories.contains(&target) {
            return Err(SessionError::command(operation, "550 Permission denied."));
        }
        if state.directories.contains(&target) || state.files.contains_key(&target) {
            return Err(SessionError::command(operation, "550 File exists."));
        }
        if !state.directories.contains(&parent_of(&target)) {
            return Err(SessionError::command(
                operation,
                "550 No such file or directory.",
            ));
        }
        state.directories.insert(target);
        Ok(())
    }

    fn current_directory(&mut self) -> Result<String, SessionError> {
        self.server.record(Operation::CurrentDirectory);
        self.require_login("PWD")?;
        Ok(self.cwd.clone())
    }

    fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, SessionError> {
        let target = resolve(&self.cwd, remote_path);
        self.server.record(Operation::Store {
            path: target.clone(),
        });
        let operation = format!("STOR {remote_path}");
        self.require_login(&operation)?;

        let mut contents = Vec::new();
        reader
            .read_to_end(&mut contents)
            .map_err(|err| SessionError::LocalRead {
                message: err.to_string(),
            })?;

        let mut state = self.server.state.borrow_mut();
        if let Some(remaining) = state.store_failures.get_mut(&target)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(SessionError::command(
                operation,
                "426 Connection closed; transfer aborted.",
            ));
        }
        if !state.directories.contains(&parent_of(&target)) {
            return Err(SessionError::command(operation, "553 Could not create file."));
        }

        let bytes = u64::try_from(contents.len()).unwrap_or(u64::MAX);
        state.files.insert(target, contents);
        Ok(bytes)
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.server.record(Operation::Close);
        let mut state = self.server.state.borrow_mut();
        if !self.closed {
            self.closed = true;
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
        if state.fail_close {
            return Err(SessionError::command("QUIT", "421 Timeout."));
        }
        Ok(())
    }
}

/// Resolves `path` against `cwd` the way a Unix-like FTP server would.
fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("{cwd}/{path}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => String::from("/"),
        Some((parent, _)) => parent.to_owned(),
    }
}
