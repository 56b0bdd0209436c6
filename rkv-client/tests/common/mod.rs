//! Scripted RESP2 server for integration tests.
//!
//! Each test describes the exact commands it expects, in order, and the raw
//! reply bytes to send back. The server accepts one connection, checks every
//! request against the script and exits when the script is exhausted.
#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One expected request and the reply written for it.
pub struct Exchange {
    expect: Vec<Vec<u8>>,
    reply: Vec<u8>,
}

pub fn exchange(expect: &[&str], reply: &[u8]) -> Exchange {
    Exchange {
        expect: expect.iter().map(|arg| arg.as_bytes().to_vec()).collect(),
        reply: reply.to_vec(),
    }
}

/// The handshake a credential-less connection performs.
pub fn ping_handshake() -> Exchange {
    exchange(&["PING"], b"+PONG\r\n")
}

pub struct ScriptedServer {
    addr: String,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `redis://` URL for this server without credentials.
    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// `redis://` URL with the given userinfo and path suffix.
    pub fn url_with(&self, userinfo: &str, path: &str) -> String {
        format!("redis://{}@{}{}", userinfo, self.addr, path)
    }

    /// Waits for the script to finish, propagating request mismatches.
    pub fn finish(self) {
        self.handle.join().expect("scripted server panicked");
    }
}

pub fn spawn_script(script: Vec<Exchange>) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for (idx, step) in script.into_iter().enumerate() {
            let args = read_command(&mut reader).expect("read command");
            assert_eq!(
                render(&args),
                render(&step.expect),
                "request {idx} did not match the script"
            );
            stream.write_all(&step.reply).expect("write reply");
            stream.flush().expect("flush");
        }
    });

    ScriptedServer { addr, handle }
}

fn render(args: &[Vec<u8>]) -> Vec<String> {
    args.iter()
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

pub fn bulk(data: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", data.len(), data).into_bytes()
}

pub fn bulk_array(items: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend_from_slice(&bulk(item));
    }
    out
}

/// Reply shaped like SSCAN: `[cursor, [members...]]`.
pub fn scan_page(cursor: u64, members: &[&str]) -> Vec<u8> {
    let mut out = b"*2\r\n".to_vec();
    out.extend_from_slice(&bulk(&cursor.to_string()));
    out.extend_from_slice(&bulk_array(members));
    out
}

fn read_command(reader: &mut BufReader<TcpStream>) -> io::Result<Vec<Vec<u8>>> {
    let count = read_header(reader, '*')?;
    (0..count)
        .map(|_| {
            let len = read_header(reader, '$')?;
            // Payload plus its CRLF terminator.
            let mut data = vec![0u8; len + 2];
            reader.read_exact(&mut data)?;
            if !data.ends_with(b"\r\n") {
                return Err(invalid("bulk argument not terminated by CRLF"));
            }
            data.truncate(len);
            Ok(data)
        })
        .collect()
}

/// Reads a `<marker><len>\r\n` header line and returns the length.
fn read_header(reader: &mut BufReader<TcpStream>, marker: char) -> io::Result<usize> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client closed"));
    }
    line.strip_suffix("\r\n")
        .and_then(|header| header.strip_prefix(marker))
        .and_then(|len| len.parse().ok())
        .ok_or_else(|| invalid(&format!("bad {marker} header {line:?}")))
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
