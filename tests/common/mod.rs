//! Shared harness for integration tests: a scripted peer on the far end of
//! the transport.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::time::timeout;

use slirc_client::{Client, Config, Transport};

pub const STEP: Duration = Duration::from_secs(5);

/// The "server" side of a test connection.
pub struct Peer<S> {
    reader: BufReader<tokio::io::ReadHalf<S>>,
    writer: tokio::io::WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> Peer<S> {
    pub fn new(stream: S) -> Self {
        let (r, w) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(r),
            writer: w,
        }
    }

    /// Read one line, stripped of CRLF. `None` on EOF.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = timeout(STEP, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line from the client")
            .expect("read error on test transport");
        if n == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read one line and assert it starts with `prefix`.
    pub async fn expect(&mut self, prefix: &str) -> String {
        let line = self
            .read_line()
            .await
            .unwrap_or_else(|| panic!("eof while expecting {:?}", prefix));
        assert!(
            line.starts_with(prefix),
            "expected line starting with {:?}, got {:?}",
            prefix,
            line
        );
        line
    }

    /// Send one line to the client.
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .expect("write error on test transport");
    }
}

/// A configuration suitable for driving the engine over a pipe.
pub fn test_config() -> Config {
    Config {
        server: "test.invalid:6667".to_string(),
        nick: "testbot".to_string(),
        user: "tester".to_string(),
        realname: "Test Bot".to_string(),
        handshake_timeout: Duration::from_secs(5),
        keepalive: None,
        reconnect_interval: None,
        ..Config::default()
    }
}

/// Build a client wired to a scripted peer.
pub fn connect_pair(config: Config) -> (Client, Peer<DuplexStream>) {
    let (client_side, peer_side) = tokio::io::duplex(65536);
    let client = Client::new(config);
    client
        .connect_with_transport(Transport::local(client_side))
        .expect("attach failed");
    (client, Peer::new(peer_side))
}

/// Walk the peer through a capless registration: `CAP LS` → empty
/// advertisement → `CAP END`/`NICK`/`USER` → `001`.
pub async fn register_plain<S: AsyncRead + AsyncWrite>(peer: &mut Peer<S>, nick: &str) {
    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :").await;
    peer.expect("CAP END").await;
    peer.expect("NICK ").await;
    peer.expect("USER ").await;
    peer.send(&format!(":srv 001 {} :Welcome", nick)).await;
}
