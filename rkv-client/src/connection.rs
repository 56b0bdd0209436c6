//! # Connection
//!
//! Purpose: Own one TCP stream, run the authentication handshake once, and
//! expose the generic `exec` request/reply call every typed command uses.
//!
//! ## Design Principles
//! 1. **Single-Shot Handshake**: A `Connection` is only ever returned in the
//!    ready state; a failed handshake drops the stream.
//! 2. **Strict Ordering**: One request is written and one reply read per call,
//!    so the type takes `&mut self` and is not shared between callers.
//! 3. **Buffer Reuse**: The encode and line buffers live on the connection.
//! 4. **No Hidden Recovery**: Errors are returned as-is; nothing is retried.

use std::io::{self, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, ClientResult, ServerErrorKind};
use crate::resp::{encode_command, read_reply, Reply};

/// How the handshake concluded for a ready connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No credential was supplied and the store accepted commands without one.
    Open,
    /// The credential was accepted by AUTH.
    Authenticated,
    /// A credential was supplied but the store has no password configured.
    NotRequired,
}

/// Single blocking connection to the store.
///
/// The buffers are stored on the connection to avoid per-call allocations.
pub struct Connection {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
    endpoint: Endpoint,
    auth: AuthState,
}

impl Connection {
    /// Parses `url` and opens a connection with default transport options.
    pub fn connect(url: &str) -> ClientResult<Self> {
        let endpoint = Endpoint::parse(url)?;
        Self::open(&endpoint)
    }

    /// Opens a connection to `endpoint` with default transport options.
    pub fn open(endpoint: &Endpoint) -> ClientResult<Self> {
        Self::open_with_config(endpoint, &ClientConfig::default())
    }

    /// Opens the transport, authenticates, and selects the database.
    ///
    /// Fails with `ClientError::Auth` when the store rejects the credential,
    /// or demands one and none was supplied. A credential sent to a store
    /// without a password is ignored and the connection is still returned.
    pub fn open_with_config(endpoint: &Endpoint, config: &ClientConfig) -> ClientResult<Self> {
        let stream = connect_stream(endpoint, config)?;
        if let Some(timeout) = config.read_timeout() {
            stream.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = config.write_timeout() {
            stream.set_write_timeout(Some(timeout))?;
        }
        if config.nodelay {
            // Disable Nagle to keep request latency low for small payloads.
            stream.set_nodelay(true)?;
        }
        debug!(addr = %endpoint.addr(), "connected");

        let mut conn = Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
            endpoint: endpoint.clone(),
            auth: AuthState::Open,
        };
        conn.auth = conn.authenticate()?;
        conn.select_db()?;
        Ok(conn)
    }

    /// Sends one command and reads its reply.
    ///
    /// An error reply from the store is returned as `ClientError::Server`,
    /// so a successful `Reply` is never `Reply::Error`.
    pub fn exec(&mut self, command: &str, args: &[&[u8]]) -> ClientResult<Reply> {
        trace!(command, args = args.len(), "exec");
        match self.round_trip(command.as_bytes(), args)? {
            Reply::Error(err) => Err(ClientError::Server(err)),
            reply => Ok(reply),
        }
    }

    /// Endpoint this connection was opened against.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Outcome of the handshake.
    pub fn auth_state(&self) -> AuthState {
        self.auth
    }

    fn authenticate(&mut self) -> ClientResult<AuthState> {
        let credential = match self.endpoint.credential() {
            Some(credential) => credential.to_owned(),
            None => return self.check_open(),
        };

        match self.round_trip(b"AUTH", &[credential.as_bytes()])? {
            Reply::Status(_) => {
                debug!("authenticated");
                Ok(AuthState::Authenticated)
            }
            Reply::Error(err) if err.kind == ServerErrorKind::AuthNotRequired => {
                warn!("store has no password configured, ignoring supplied credential");
                Ok(AuthState::NotRequired)
            }
            Reply::Error(err) => Err(ClientError::Auth(err)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    // Without a credential one PING is sent so that a protected store fails
    // construction instead of the first caller command.
    fn check_open(&mut self) -> ClientResult<AuthState> {
        match self.round_trip(b"PING", &[])? {
            Reply::Status(_) | Reply::Bulk(_) => Ok(AuthState::Open),
            Reply::Error(err) if err.kind == ServerErrorKind::NoAuth => Err(ClientError::Auth(err)),
            Reply::Error(err) => Err(ClientError::Server(err)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn select_db(&mut self) -> ClientResult<()> {
        let db = match self.endpoint.db() {
            Some(db) if db != 0 => db,
            _ => return Ok(()),
        };

        let index = db.to_string();
        match self.exec("SELECT", &[index.as_bytes()])? {
            Reply::Status(_) => {
                debug!(db, "selected database");
                Ok(())
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn round_trip(&mut self, command: &[u8], args: &[&[u8]]) -> ClientResult<Reply> {
        self.write_buf.clear();
        encode_command(command, args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_reply(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_stream(endpoint: &Endpoint, config: &ClientConfig) -> ClientResult<TcpStream> {
    let timeout = match config.connect_timeout() {
        Some(timeout) => timeout,
        None => return Ok(TcpStream::connect((endpoint.host(), endpoint.port()))?),
    };

    // connect_timeout needs a resolved address; try each in turn.
    let mut last_err = None;
    for addr in (endpoint.host(), endpoint.port()).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err
        .unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no addresses")
        })
        .into())
}
