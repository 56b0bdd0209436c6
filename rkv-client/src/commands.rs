//! # Typed Commands
//!
//! Purpose: Thin, strongly typed projections over `Connection::exec`.
//!
//! ## Design Principles
//! 1. **Total Decoding**: Every reply is matched exhaustively; any shape the
//!    command cannot produce is `ClientError::UnexpectedResponse`.
//! 2. **Errors Stay Errors**: Server error replies (wrong type, syntax) come
//!    back as `ClientError::Server` and are never mapped to an empty value.
//! 3. **Nil Is Not Empty**: Null bulk replies become `None`, distinct from
//!    an empty string.
//! 4. **Stateless Scans**: `sscan` is a pure function of its arguments; the
//!    caller owns the cursor.

use std::collections::VecDeque;

use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::resp::Reply;

/// Cursor value that starts a scan and marks its completion.
pub const SCAN_START: u64 = 0;

impl Connection {
    /// Pings the server. Returns the status or echoed payload.
    pub fn ping(&mut self) -> ClientResult<String> {
        match self.exec("PING", &[])? {
            Reply::Status(text) => Ok(text),
            Reply::Bulk(data) => into_string(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Deletes a key. Returns the number of keys removed.
    pub fn del(&mut self, key: &str) -> ClientResult<i64> {
        let reply = self.exec("DEL", &[key.as_bytes()])?;
        into_integer(reply)
    }

    /// Sets a string value.
    pub fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        let reply = self.exec("SET", &[key.as_bytes(), value.as_bytes()])?;
        into_ok(reply)
    }

    /// Fetches a string value. Returns `Ok(None)` when the key is missing.
    pub fn get(&mut self, key: &str) -> ClientResult<Option<String>> {
        let reply = self.exec("GET", &[key.as_bytes()])?;
        into_optional_string(reply)
    }

    /// Adds elements to a HyperLogLog.
    ///
    /// Returns 1 when at least one internal register changed, 0 otherwise.
    pub fn pf_add(&mut self, key: &str, elements: &[&str]) -> ClientResult<i64> {
        let args = with_key(key, elements);
        let reply = self.exec("PFADD", &args)?;
        into_integer(reply)
    }

    /// Returns the store's cardinality estimate, unmodified.
    pub fn pf_count(&mut self, key: &str) -> ClientResult<i64> {
        let reply = self.exec("PFCOUNT", &[key.as_bytes()])?;
        into_integer(reply)
    }

    /// Merges `sources` into `dest`. Returns true on `OK`.
    pub fn pf_merge(&mut self, dest: &str, sources: &[&str]) -> ClientResult<bool> {
        let args = with_key(dest, sources);
        let reply = self.exec("PFMERGE", &args)?;
        match reply {
            Reply::Status(text) => Ok(text == "OK"),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Prepends a value. Returns the new list length.
    pub fn lpush(&mut self, key: &str, value: &str) -> ClientResult<i64> {
        let reply = self.exec("LPUSH", &[key.as_bytes(), value.as_bytes()])?;
        into_integer(reply)
    }

    /// Pops the head of a list. `Ok(None)` means the list had no element.
    pub fn lpop(&mut self, key: &str) -> ClientResult<Option<String>> {
        let reply = self.exec("LPOP", &[key.as_bytes()])?;
        into_optional_string(reply)
    }

    /// Returns the list length; 0 for a missing key.
    pub fn llen(&mut self, key: &str) -> ClientResult<i64> {
        let reply = self.exec("LLEN", &[key.as_bytes()])?;
        into_integer(reply)
    }

    /// Trims a list to `[start, stop]`. Negative indices count from the end.
    pub fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> ClientResult<()> {
        let start = start.to_string();
        let stop = stop.to_string();
        let reply = self.exec("LTRIM", &[key.as_bytes(), start.as_bytes(), stop.as_bytes()])?;
        into_ok(reply)
    }

    /// Returns list elements in `[start, stop]` in store order.
    ///
    /// A missing key or an out-of-range window yields an empty vector.
    pub fn lrange(&mut self, key: &str, start: i64, stop: i64) -> ClientResult<Vec<String>> {
        let start = start.to_string();
        let stop = stop.to_string();
        let reply = self.exec("LRANGE", &[key.as_bytes(), start.as_bytes(), stop.as_bytes()])?;
        into_string_list(reply)
    }

    /// Adds members to a set. Returns how many were not already present.
    pub fn sadd(&mut self, key: &str, members: &[&str]) -> ClientResult<i64> {
        let args = with_key(key, members);
        let reply = self.exec("SADD", &args)?;
        into_integer(reply)
    }

    /// Removes members from a set. Returns how many were present.
    pub fn srem(&mut self, key: &str, members: &[&str]) -> ClientResult<i64> {
        let args = with_key(key, members);
        let reply = self.exec("SREM", &args)?;
        into_integer(reply)
    }

    /// Returns the set cardinality; 0 for a missing key.
    pub fn scard(&mut self, key: &str) -> ClientResult<i64> {
        let reply = self.exec("SCARD", &[key.as_bytes()])?;
        into_integer(reply)
    }

    /// Returns all members of a set, in no particular order.
    pub fn smembers(&mut self, key: &str) -> ClientResult<Vec<String>> {
        let reply = self.exec("SMEMBERS", &[key.as_bytes()])?;
        into_string_list(reply)
    }

    /// Moves `member` from `src` to `dst`. True iff it was in `src`.
    pub fn smove(&mut self, src: &str, dst: &str, member: &str) -> ClientResult<bool> {
        let reply = self.exec("SMOVE", &[src.as_bytes(), dst.as_bytes(), member.as_bytes()])?;
        match reply {
            Reply::Integer(1) => Ok(true),
            Reply::Integer(0) => Ok(false),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetches one page of a set scan.
    ///
    /// Returns the next cursor and the page's members. A returned cursor of
    /// `SCAN_START` means the scan is complete. An empty `pattern` sends no
    /// MATCH clause; a zero `count` sends no COUNT clause. Members may repeat
    /// across pages and are passed through as received.
    pub fn sscan(
        &mut self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> ClientResult<(u64, Vec<String>)> {
        let cursor = cursor.to_string();
        let count_arg = count.to_string();
        let mut args: Vec<&[u8]> = vec![key.as_bytes(), cursor.as_bytes()];
        if !pattern.is_empty() {
            args.push(b"MATCH");
            args.push(pattern.as_bytes());
        }
        if count > 0 {
            args.push(b"COUNT");
            args.push(count_arg.as_bytes());
        }

        let reply = self.exec("SSCAN", &args)?;
        into_scan_page(reply)
    }

    /// Iterates every member of a set by driving `sscan` to completion.
    pub fn sscan_iter<'a>(
        &'a mut self,
        key: &'a str,
        pattern: &'a str,
        count: usize,
    ) -> SScanIter<'a> {
        SScanIter {
            conn: self,
            key,
            pattern,
            count,
            cursor: SCAN_START,
            pending: VecDeque::new(),
            done: false,
        }
    }
}

/// Member-by-member iterator over an `SSCAN` cursor loop.
///
/// Yields each member as received, including duplicates across pages. After
/// the first error the iterator yields that error and then ends.
pub struct SScanIter<'a> {
    conn: &'a mut Connection,
    key: &'a str,
    pattern: &'a str,
    count: usize,
    cursor: u64,
    pending: VecDeque<String>,
    done: bool,
}

impl Iterator for SScanIter<'_> {
    type Item = ClientResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(member) = self.pending.pop_front() {
                return Some(Ok(member));
            }
            if self.done {
                return None;
            }

            match self.conn.sscan(self.key, self.cursor, self.pattern, self.count) {
                Ok((next, members)) => {
                    self.cursor = next;
                    self.done = next == SCAN_START;
                    self.pending.extend(members);
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn with_key<'a>(key: &'a str, rest: &[&'a str]) -> Vec<&'a [u8]> {
    let mut args = Vec::with_capacity(rest.len() + 1);
    args.push(key.as_bytes());
    args.extend(rest.iter().map(|item| item.as_bytes()));
    args
}

fn into_integer(reply: Reply) -> ClientResult<i64> {
    match reply {
        Reply::Integer(value) => Ok(value),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn into_ok(reply: Reply) -> ClientResult<()> {
    match reply {
        Reply::Status(text) if text == "OK" => Ok(()),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn into_string(data: Vec<u8>) -> ClientResult<String> {
    String::from_utf8(data).map_err(|_| ClientError::InvalidUtf8)
}

fn into_optional_string(reply: Reply) -> ClientResult<Option<String>> {
    match reply {
        Reply::Bulk(data) => into_string(data).map(Some),
        Reply::Nil => Ok(None),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn into_string_list(reply: Reply) -> ClientResult<Vec<String>> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Reply::Bulk(data) => into_string(data),
                _ => Err(ClientError::UnexpectedResponse),
            })
            .collect(),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn into_scan_page(reply: Reply) -> ClientResult<(u64, Vec<String>)> {
    let mut parts = match reply {
        Reply::Array(parts) if parts.len() == 2 => parts.into_iter(),
        _ => return Err(ClientError::UnexpectedResponse),
    };

    let cursor = match parts.next() {
        Some(Reply::Bulk(raw)) => std::str::from_utf8(&raw)
            .ok()
            .and_then(|text| text.parse::<u64>().ok())
            .ok_or(ClientError::UnexpectedResponse)?,
        _ => return Err(ClientError::UnexpectedResponse),
    };
    let members = match parts.next() {
        Some(page) => into_string_list(page)?,
        None => return Err(ClientError::UnexpectedResponse),
    };

    Ok((cursor, members))
}
