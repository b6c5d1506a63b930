//! Error types for the IRC client engine.
//!
//! This module defines the failure taxonomy surfaced by the public API:
//! configuration problems, transport failures, handshake timeouts, fatal
//! negotiation errors, and per-message send rejections.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Required configuration was missing or inconsistent before connect.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dialing the server failed. No retry is performed here; retries are
    /// the reconnect loop's responsibility.
    #[error("dial error: {0}")]
    Dial(#[source] std::io::Error),

    /// TLS setup failed before any protocol traffic.
    #[error("tls error: {0}")]
    Tls(String),

    /// I/O error on an established connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The CAP/SASL/registration sequence exceeded the configured bound.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Fatal negotiation failure (SASL or server-terminated handshake).
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    /// An outbound message exceeded the configured line length. The message
    /// was rejected rather than truncated.
    #[error("line too long: {len} bytes (limit {max})")]
    LineTooLong {
        /// Encoded length of the rejected line, excluding tags.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A send was attempted while no connection was active.
    #[error("not connected")]
    NotConnected,

    /// Failed to parse an IRC line.
    #[error("invalid message: {string}")]
    Parse {
        /// The raw line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

impl Clone for ClientError {
    fn clone(&self) -> Self {
        // io::Error is not Clone; rebuild it from kind and message so the
        // terminal error can be broadcast to every waiter.
        fn dup(err: &std::io::Error) -> std::io::Error {
            std::io::Error::new(err.kind(), err.to_string())
        }

        match self {
            Self::Config(s) => Self::Config(s.clone()),
            Self::Dial(e) => Self::Dial(dup(e)),
            Self::Tls(s) => Self::Tls(s.clone()),
            Self::Io(e) => Self::Io(dup(e)),
            Self::HandshakeTimeout => Self::HandshakeTimeout,
            Self::Negotiation(e) => Self::Negotiation(e.clone()),
            Self::LineTooLong { len, max } => Self::LineTooLong {
                len: *len,
                max: *max,
            },
            Self::NotConnected => Self::NotConnected,
            Self::Parse { string, cause } => Self::Parse {
                string: string.clone(),
                cause: cause.clone(),
            },
        }
    }
}

/// Fatal errors raised by the negotiation state machine.
///
/// Capability rejection is deliberately absent: a `CAP NAK` is tolerated and
/// negotiation proceeds without the capability. SASL, by contrast, is an
/// opt-in hard requirement, so any SASL failure aborts the connection
/// attempt.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NegotiationError {
    /// SASL was enabled but the server did not acknowledge the `sasl`
    /// capability.
    #[error("sasl unavailable: server did not acknowledge the sasl capability")]
    SaslUnavailable,

    /// SASL authentication failed (902/904-907).
    #[error("sasl authentication failed: {0}")]
    SaslFailed(String),

    /// The configured SASL mechanism cannot be encoded by this client.
    #[error("unsupported sasl mechanism: {0}")]
    UnsupportedMechanism(String),

    /// The server terminated the connection with `ERROR`.
    #[error("server error: {0}")]
    ServerError(String),
}

/// Errors encountered when parsing IRC messages.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Parsing failed at a specific position.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Character position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}
