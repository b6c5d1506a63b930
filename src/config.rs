//! Client configuration.
//!
//! All knobs are fixed before `connect`; the engine never mutates them. The
//! same configuration drives every reconnect attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio_rustls::rustls;

use crate::error::{ClientError, Result};
use crate::sasl::SaslMechanism;

/// Default outbound line length limit in bytes, excluding tags and CRLF
/// headroom (RFC 1459 framing).
pub const DEFAULT_MAX_LINE_LEN: usize = 512;

/// Connection configuration.
///
/// ```rust
/// use slirc_client::Config;
///
/// let config = Config {
///     server: "irc.libera.chat:6697".to_string(),
///     use_tls: true,
///     nick: "slircbot".to_string(),
///     user: "slirc".to_string(),
///     realname: "slirc client".to_string(),
///     request_caps: vec!["server-time".to_string(), "message-tags".to_string()],
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Server address as `host:port`.
    pub server: String,
    /// Dial with TLS.
    pub use_tls: bool,
    /// TLS configuration override. `None` uses the webpki trust roots.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub tls_config: Option<Arc<rustls::ClientConfig>>,

    /// Desired nickname. Required.
    pub nick: String,
    /// Username (ident). Required.
    pub user: String,
    /// Realname / GECOS.
    pub realname: String,
    /// Parameters for the `WEBIRC` command, sent verbatim when non-empty.
    pub webirc: Vec<String>,
    /// Server password (`PASS`).
    pub password: Option<String>,

    /// IRCv3 capabilities to request. Rejection of any of these is
    /// non-fatal.
    pub request_caps: Vec<String>,
    /// Authenticate over SASL during registration. Failure is fatal.
    pub use_sasl: bool,
    /// SASL account name.
    pub sasl_login: String,
    /// SASL password.
    pub sasl_password: String,
    /// SASL mechanism to drive.
    pub sasl_mechanism: SaslMechanism,

    /// Message sent with `QUIT` when none is given explicitly.
    pub quit_message: String,
    /// Reply string for CTCP VERSION when the CTCP responder is enabled.
    pub version: String,
    /// Respond to CTCP VERSION/PING.
    pub enable_ctcp: bool,
    /// Propagate callback panics to the dispatch site instead of containing
    /// them.
    pub strict_callback_faults: bool,

    /// Bound on the whole CAP/SASL/registration sequence.
    pub handshake_timeout: Duration,
    /// Idle interval before a liveness `PING` is sent. `None` disables the
    /// keepalive probe.
    pub keepalive: Option<Duration>,
    /// Delay between reconnect attempts. `None` disables reconnection.
    pub reconnect_interval: Option<Duration>,
    /// Maximum outbound line length in bytes, excluding tags.
    pub max_line_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: String::new(),
            use_tls: false,
            tls_config: None,
            nick: String::new(),
            user: String::new(),
            realname: String::new(),
            webirc: Vec::new(),
            password: None,
            request_caps: Vec::new(),
            use_sasl: false,
            sasl_login: String::new(),
            sasl_password: String::new(),
            sasl_mechanism: SaslMechanism::Plain,
            quit_message: String::new(),
            version: format!("slirc-client {}", env!("CARGO_PKG_VERSION")),
            enable_ctcp: false,
            strict_callback_faults: false,
            handshake_timeout: Duration::from_secs(60),
            keepalive: Some(Duration::from_secs(4 * 60)),
            reconnect_interval: Some(Duration::from_secs(2 * 60)),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl Config {
    /// Check the identity fields required before any connection attempt.
    pub fn validate(&self) -> Result<()> {
        if self.nick.is_empty() || self.user.is_empty() {
            return Err(ClientError::Config(
                "nick and user must be set before connecting".to_string(),
            ));
        }
        if self.server.is_empty() {
            return Err(ClientError::Config("server address must be set".to_string()));
        }
        if self.use_sasl && self.sasl_mechanism == SaslMechanism::Plain && self.sasl_login.is_empty()
        {
            return Err(ClientError::Config(
                "sasl enabled but no sasl_login configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Hostname portion of [`Config::server`], used for TLS server name
    /// verification.
    pub(crate) fn host(&self) -> &str {
        self.server.rsplit_once(':').map_or(self.server.as_str(), |(host, _)| host)
    }
}
