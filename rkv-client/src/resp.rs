//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands into request framing and parse server
//! replies into a closed `Reply` type.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Arguments and bulk strings are treated as raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately and
//!    never tries to resynchronize.

use std::fmt::Write as _;
use std::io::{self, BufRead, Read};

use bytes::{BufMut, BytesMut};

use crate::error::{ClientError, ClientResult, ProtocolError, ServerError};

// Upper bound on speculative allocation for array headers.
const MAX_PREALLOC_ITEMS: usize = 1024;

/// Deepest array nesting accepted in a reply.
pub const MAX_NESTING: usize = 32;

/// One decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// +OK or +PONG style responses.
    Status(String),
    /// -ERR ... responses, already classified.
    Error(ServerError),
    /// :123 responses.
    Integer(i64),
    /// $... bulk strings.
    Bulk(Vec<u8>),
    /// $-1 or *-1.
    Nil,
    /// *... arrays, possibly nested.
    Array(Vec<Reply>),
}

impl Reply {
    /// Returns true for the null bulk / null array reply.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Returns true when the reply is the `+OK` status.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Status(text) if text == "OK")
    }
}

/// Encodes a RESP2 array command into the provided buffer.
///
/// The command name is the first bulk string, followed by `args` in order.
pub fn encode_command(command: &[u8], args: &[&[u8]], out: &mut BytesMut) {
    push_header(out, '*', args.len() + 1);
    push_bulk(out, command);
    for arg in args {
        push_bulk(out, arg);
    }
}

fn push_bulk(out: &mut BytesMut, data: &[u8]) {
    push_header(out, '$', data.len());
    out.put_slice(data);
    out.put_slice(b"\r\n");
}

/// Reads one RESP2 reply from the buffered reader.
///
/// Blocks until a full reply is available. A stream that ends mid-reply is
/// reported as `ProtocolError::UnexpectedEof`; arrays nested deeper than
/// `MAX_NESTING` as `ProtocolError::NestingTooDeep`.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<Reply> {
    read_nested(reader, line_buf, 0)
}

fn read_nested<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> ClientResult<Reply> {
    read_line(reader, line_buf)?;
    let (&marker, rest) = line_buf
        .split_first()
        .ok_or(ProtocolError::EmptyLine)?;

    match marker {
        b'+' => Ok(Reply::Status(String::from_utf8_lossy(rest).into_owned())),
        b'-' => Ok(Reply::Error(ServerError::from_line(rest))),
        b':' => Ok(Reply::Integer(parse_i64(rest)?)),
        b'$' => {
            let len = parse_i64(rest)?;
            parse_bulk_len(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            parse_array_len(reader, len, line_buf, depth)
        }
        other => Err(ProtocolError::UnexpectedMarker(other).into()),
    }
}

fn parse_bulk_len<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<Reply> {
    if len == -1 {
        return Ok(Reply::Nil);
    }
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len).into());
    }

    let len = len as usize;
    let mut data = Vec::with_capacity(len.min(64 * 1024));
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(ProtocolError::UnexpectedEof.into());
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).map_err(eof_as_protocol)?;
    if crlf != [b'\r', b'\n'] {
        return Err(ProtocolError::MissingCrlf.into());
    }

    Ok(Reply::Bulk(data))
}

fn parse_array_len<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> ClientResult<Reply> {
    if len == -1 {
        return Ok(Reply::Nil);
    }
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len).into());
    }

    if depth >= MAX_NESTING {
        return Err(ProtocolError::NestingTooDeep.into());
    }

    let len = len as usize;
    let mut items = Vec::with_capacity(len.min(MAX_PREALLOC_ITEMS));
    for _ in 0..len {
        items.push(read_nested(reader, line_buf, depth + 1)?);
    }
    Ok(Reply::Array(items))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(ProtocolError::UnexpectedEof.into());
    }
    if buf.last() != Some(&b'\n') {
        return Err(ProtocolError::UnexpectedEof.into());
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(ProtocolError::MissingCrlf.into());
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn eof_as_protocol(err: io::Error) -> ClientError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ProtocolError::UnexpectedEof.into()
    } else {
        ClientError::Io(err)
    }
}

fn parse_i64(data: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    // Negative values accumulate below zero so i64::MIN stays reachable.
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let digit = (b - b'0') as i64;
        value = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
            .ok_or(ProtocolError::InvalidInteger)?;
    }

    Ok(value)
}

fn push_header(out: &mut BytesMut, marker: char, len: usize) {
    // fmt::Write on BytesMut grows the buffer and never reports an error.
    let _ = write!(out, "{marker}{len}\r\n");
}
