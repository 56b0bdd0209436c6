//! # Connection Endpoint
//!
//! Purpose: Turn a `redis://` URL into the host, port, credential and
//! database index a `Connection` needs.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Port used when the URL omits one.
pub const DEFAULT_PORT: u16 = 6379;

const SCHEME: &str = "redis";

/// Parsed connection target. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    db: Option<u32>,
}

impl Endpoint {
    /// Builds an endpoint for `host:port` without credentials or db index.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
            username: None,
            password: None,
            db: None,
        }
    }

    /// Parses a connection string such as `redis://:secret@localhost:6379/2`.
    pub fn parse(url: &str) -> ClientResult<Self> {
        let parsed = Url::parse(url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        Self::from_url(&parsed)
    }

    /// Extracts endpoint fields from an already parsed URL.
    pub fn from_url(url: &Url) -> ClientResult<Self> {
        if url.scheme() != SCHEME {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme {:?}, expected {SCHEME}://",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ClientError::InvalidUrl("missing host".to_string()))?;
        // IPv6 literals come back bracketed; the socket layer wants them bare.
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

        let username = non_empty(decode_userinfo(url.username())?);
        let password = match url.password() {
            Some(raw) => non_empty(decode_userinfo(raw)?),
            None => None,
        };

        Ok(Endpoint {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password,
            db: parse_db(url.path())?,
        })
    }

    /// Sets the credential carried in the password slot.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the logical database index.
    pub fn with_db(mut self, db: u32) -> Self {
        self.db = Some(db);
        self
    }

    /// Host name or address, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port; 6379 unless the URL named one.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Decoded user slot of the URL, if non-empty.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Decoded password slot of the URL, if non-empty.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Logical database index from the URL path, if any.
    pub fn db(&self) -> Option<u32> {
        self.db
    }

    /// Credential to send with AUTH.
    ///
    /// The password slot wins; a URL that only carries a user slot
    /// (`redis://secret@host`) uses that value instead.
    pub fn credential(&self) -> Option<&str> {
        self.password().or_else(|| self.username())
    }

    /// Address in `host:port` form for the transport.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

// Credentials stay out of Debug output so endpoints can be logged.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("has_credential", &self.credential().is_some())
            .field("db", &self.db)
            .finish()
    }
}

// A `%` that does not start a valid escape is kept literally.
fn decode_userinfo(raw: &str) -> ClientResult<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ClientError::InvalidUrl("userinfo is not valid utf-8 once decoded".to_string()))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_db(path: &str) -> ClientResult<Option<u32>> {
    let segment = path.trim_matches('/');
    if segment.is_empty() {
        return Ok(None);
    }
    segment
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ClientError::InvalidUrl(format!("invalid database index {segment:?}")))
}
