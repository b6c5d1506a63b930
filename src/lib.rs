//! # slirc-client
//!
//! An event-driven IRC client connection engine. The crate owns a single
//! TCP/TLS connection to a server, drives it through IRCv3 capability
//! negotiation, optional SASL authentication, and registration, and exposes
//! a priority-ordered callback API for inbound and outbound protocol
//! events. Connection lifecycle is supervised: transient failures feed a
//! reconnect loop, and an explicit quit tears everything down with no
//! orphaned background tasks.
//!
//! ## Features
//!
//! - `CAP LS 302` negotiation with multiline replies, `ACK`/`NAK` tracking,
//!   and post-registration `cap-notify` handling
//! - SASL PLAIN and EXTERNAL; authentication failure aborts the attempt,
//!   while capability rejection never does
//! - Deterministic nickname collision recovery (`433`/`437`)
//! - One unbounded outbound queue drained by a single writer, preserving
//!   send order under concurrent callers
//! - Keepalive `PING` probing and a handshake watchdog, both on the
//!   monotonic clock
//! - Pluggable transports: TCP, TLS (tokio-rustls), or an in-memory pipe
//!   for tests and embedding

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ```no_run
//! use slirc_client::{Client, Config, Direction};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), slirc_client::ClientError> {
//! let client = Client::new(Config {
//!     server: "irc.libera.chat:6697".to_string(),
//!     use_tls: true,
//!     nick: "slircbot".to_string(),
//!     user: "slirc".to_string(),
//!     realname: "slirc client".to_string(),
//!     request_caps: vec!["server-time".to_string(), "account-tag".to_string()],
//!     ..Config::default()
//! });
//!
//! client.register_event(
//!     Direction::In,
//!     "PRIVMSG",
//!     Arc::new(|event| println!("<{}> {}", event.nick(), event.text())),
//!     0,
//! );
//!
//! client.connect().await?;
//! client.wait_for_registration().await?;
//! client.send("JOIN", &["#rust"])?;
//! # Ok(())
//! # }
//! ```

pub mod caps;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod line;
pub mod message;
pub mod negotiate;
pub mod sasl;
pub mod transport;

pub use self::caps::CapabilityTracker;
pub use self::client::{Client, HandlerHandle};
pub use self::config::Config;
pub use self::dispatch::{Direction, Handler, ALL_EVENTS, RAW_EVENTS};
pub use self::error::{ClientError, MessageParseError, NegotiationError, Result};
pub use self::event::Event;
pub use self::line::LineCodec;
pub use self::message::{Message, Tag};
pub use self::negotiate::NegotiationState;
pub use self::sasl::{encode_external, encode_plain, SaslMechanism, SaslOutcome};
pub use self::transport::Transport;
