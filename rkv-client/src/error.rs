//! # Client Errors
//!
//! Purpose: Give every failure the client can observe a distinct, typed
//! variant so callers never have to inspect reply text.
//!
//! ## Design Principles
//! 1. **Closed Taxonomy**: Transport, protocol, authentication and
//!    server-reported failures are separate variants.
//! 2. **Classify Once**: Server error lines are tagged with a
//!    `ServerErrorKind` when they are decoded, not at every call site.
//! 3. **No Silent Defaults**: An error reply is never turned into a zero value.

use std::fmt;

use thiserror::Error;

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The store rejected (or demanded) credentials during the handshake.
    #[error("authentication failed: {0}")]
    Auth(ServerError),
    /// Server returned an error reply.
    #[error("server error: {0}")]
    Server(ServerError),
    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// A bulk payload was expected to be text but was not valid UTF-8.
    #[error("response payload is not valid utf-8")]
    InvalidUtf8,
    /// Connection URL could not be turned into an endpoint.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Returns the server error carried by `Server` or `Auth`, if any.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            ClientError::Server(err) | ClientError::Auth(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true when the server reported a wrong-type operation.
    pub fn is_wrong_type(&self) -> bool {
        matches!(self.server_error(), Some(err) if err.kind == ServerErrorKind::WrongType)
    }
}

/// Ways a reply stream can violate RESP2 framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Stream ended before a complete reply was read.
    #[error("unexpected end of stream")]
    UnexpectedEof,
    /// Leading byte is not one of `+ - : $ *`.
    #[error("unexpected reply marker {0:#04x}")]
    UnexpectedMarker(u8),
    /// A header line was empty.
    #[error("empty reply line")]
    EmptyLine,
    /// A line or bulk payload was not terminated by CRLF.
    #[error("missing CRLF terminator")]
    MissingCrlf,
    /// An integer, length or count field was not a valid decimal.
    #[error("invalid integer field")]
    InvalidInteger,
    /// A bulk length or array count was below -1.
    #[error("invalid length {0}")]
    InvalidLength(i64),
    /// Arrays were nested deeper than the decoder accepts.
    #[error("reply nesting too deep")]
    NestingTooDeep,
}

/// Semantic class of a server error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    /// AUTH was sent to a store that has no password configured.
    AuthNotRequired,
    /// A command was sent before authenticating to a protected store.
    NoAuth,
    /// The supplied credential was rejected.
    WrongPass,
    /// The key holds a value of an incompatible type.
    WrongType,
    /// Any other error reply (syntax, unknown command, ...).
    Other,
}

/// Error reply returned by the store, tagged with its semantic kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub kind: ServerErrorKind,
    pub message: String,
}

impl ServerError {
    /// Builds a server error from the raw error line (without the `-` marker).
    pub fn from_line(line: &[u8]) -> Self {
        let message = String::from_utf8_lossy(line).into_owned();
        ServerError {
            kind: classify(&message),
            message,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServerError {}

// Stores before 6.0 only use the generic ERR prefix for auth outcomes, so the
// two known sentences are matched here and nowhere else.
const AUTH_NOT_REQUIRED_LEGACY: &str = "ERR Client sent AUTH, but no password is set";
const AUTH_NOT_REQUIRED_ACL: &str = "without any password configured";
const WRONG_PASS_LEGACY: &str = "ERR invalid password";

fn classify(message: &str) -> ServerErrorKind {
    let prefix = message.split_whitespace().next().unwrap_or("");
    match prefix {
        "NOAUTH" => return ServerErrorKind::NoAuth,
        "WRONGPASS" => return ServerErrorKind::WrongPass,
        "WRONGTYPE" => return ServerErrorKind::WrongType,
        _ => {}
    }

    if message.starts_with(AUTH_NOT_REQUIRED_LEGACY)
        || (message.starts_with("ERR AUTH") && message.contains(AUTH_NOT_REQUIRED_ACL))
    {
        ServerErrorKind::AuthNotRequired
    } else if message.starts_with(WRONG_PASS_LEGACY) {
        ServerErrorKind::WrongPass
    } else {
        ServerErrorKind::Other
    }
}
