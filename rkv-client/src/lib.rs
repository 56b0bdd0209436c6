//! # RKV Sync Client
//!
//! Purpose: Provide a minimal, synchronous client for Redis-compatible stores:
//! one connection, one command at a time, typed replies.
//!
//! ## Design Principles
//! 1. **Eager Handshake**: Authentication runs when the connection is opened,
//!    so a returned `Connection` is always ready.
//! 2. **Closed Replies**: `Reply` is a tagged union and every typed command
//!    decodes it with an exhaustive match.
//! 3. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.
//!
//! ## Usage
//!
//! ```no_run
//! use rkv_client::Connection;
//!
//! let mut conn = Connection::connect("redis://:secret@localhost:6379/0")?;
//! conn.lpush("queue", "job-1")?;
//! assert_eq!(conn.lpop("queue")?, Some("job-1".to_string()));
//! # Ok::<(), rkv_client::ClientError>(())
//! ```

mod commands;
mod config;
mod connection;
mod endpoint;
mod error;
mod resp;

pub use commands::{SScanIter, SCAN_START};
pub use config::ClientConfig;
pub use connection::{AuthState, Connection};
pub use endpoint::{Endpoint, DEFAULT_PORT};
pub use error::{ClientError, ClientResult, ProtocolError, ServerError, ServerErrorKind};
pub use resp::{encode_command, read_reply, Reply, MAX_NESTING};
