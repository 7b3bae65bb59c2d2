//! FTP transfer sessions backed by `suppaftp`.

use std::fmt;
use std::io::Read;
use std::net::{SocketAddr, ToSocketAddrs};

use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};
use tracing::{debug, info};

use crate::session::{Endpoint, SessionConnector, SessionError, TransferSession};

/// Connector that dials real FTP servers.
#[derive(Clone, Copy, Debug, Default)]
pub struct FtpConnector;

impl SessionConnector for FtpConnector {
    type Session = FtpSession;

    fn connect(&self, endpoint: &Endpoint) -> Result<FtpSession, SessionError> {
        let address = endpoint.address();
        let socket = resolve(&address)?;
        let connect_error = |message: String| SessionError::Connect {
            address: address.clone(),
            message,
        };

        let mut stream = FtpStream::connect_timeout(socket, endpoint.timeout)
            .map_err(|err| connect_error(err.to_string()))?;
        stream
            .get_ref()
            .set_read_timeout(Some(endpoint.timeout))
            .and_then(|()| stream.get_ref().set_write_timeout(Some(endpoint.timeout)))
            .map_err(|err| connect_error(err.to_string()))?;

        let mode = if endpoint.passive {
            Mode::Passive
        } else {
            Mode::Active
        };
        stream.set_mode(mode);

        if let Some(welcome) = stream.get_welcome_msg() {
            info!(address = %address, welcome = welcome.trim(), "connected");
        }

        Ok(FtpSession { stream, address })
    }
}

fn resolve(address: &str) -> Result<SocketAddr, SessionError> {
    let connect_error = |message: String| SessionError::Connect {
        address: address.to_owned(),
        message,
    };
    address
        .to_socket_addrs()
        .map_err(|err| connect_error(err.to_string()))?
        .next()
        .ok_or_else(|| connect_error(String::from("host did not resolve to any address")))
}

/// An FTP control connection.
pub struct FtpSession {
    stream: FtpStream,
    address: String,
}

impl fmt::Debug for FtpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpSession")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl TransferSession for FtpSession {
    fn authenticate(&mut self, user: &str, secret: &str) -> Result<(), SessionError> {
        self.stream
            .login(user, secret)
            .map_err(|err| SessionError::command(format!("USER {user}"), err))?;
        self.stream
            .transfer_type(FileType::Binary)
            .map_err(|err| SessionError::command("TYPE I", err))
    }

    fn change_directory(&mut self, path: &str) -> Result<(), SessionError> {
        self.stream
            .cwd(path)
            .map_err(|err| SessionError::command(format!("CWD {path}"), err))
    }

    fn make_directory(&mut self, path: &str) -> Result<(), SessionError> {
        self.stream
            .mkdir(path)
            .map_err(|err| SessionError::command(format!("MKD {path}"), err))
    }

    fn current_directory(&mut self) -> Result<String, SessionError> {
        self.stream
            .pwd()
            .map_err(|err| SessionError::command("PWD", err))
    }

    fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, SessionError> {
        let mut source = reader;
        let bytes = self
            .stream
            .put_file(remote_path, &mut source)
            .map_err(|err| SessionError::command(format!("STOR {remote_path}"), err))?;
        debug!(remote_path, bytes, "stored file");
        Ok(bytes)
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.stream
            .quit()
            .map_err(|err| SessionError::command("QUIT", err))
    }
}
