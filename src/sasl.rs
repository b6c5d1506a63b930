//! SASL authentication helpers.
//!
//! Credential encoding for the mechanisms the engine can drive during the
//! `AUTHENTICATE` exchange.
//!
//! # Supported Mechanisms
//!
//! - **PLAIN**: Simple username/password authentication (RFC 4616)
//! - **EXTERNAL**: Certificate-based authentication (client cert)
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Maximum length of a single SASL message chunk (400 bytes).
///
/// SASL responses that exceed this length must be split into multiple
/// AUTHENTICATE commands.
pub const SASL_CHUNK_SIZE: usize = 400;

/// Supported SASL authentication mechanisms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SaslMechanism {
    /// PLAIN mechanism (RFC 4616) - simple username/password.
    Plain,
    /// EXTERNAL mechanism - uses TLS client certificate.
    External,
    /// Unknown or unsupported mechanism.
    Unknown(String),
}

impl SaslMechanism {
    /// Parse a mechanism name string.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "EXTERNAL" => Self::External,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical name of this mechanism.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
            Self::Unknown(s) => s,
        }
    }

    /// Check if this mechanism is supported for encoding.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Plain | Self::External)
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a SASL exchange.
///
/// Failure is fatal to the connection attempt; contrast with capability
/// rejection, which is tolerated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaslOutcome {
    /// Exchange not yet finished.
    Pending,
    /// Server confirmed authentication (903).
    Success,
    /// Server rejected authentication (902/904-907).
    Failed(String),
}

impl SaslOutcome {
    /// Check if authentication is complete (success or failure).
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check if authentication succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Parse a list of mechanisms from a server's `RPL_SASLMECHS` (908) response.
///
/// The mechanisms are typically comma-separated.
pub fn parse_mechanisms(list: &str) -> Vec<SaslMechanism> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(SaslMechanism::parse)
        .collect()
}

/// Encode credentials for the PLAIN mechanism.
///
/// The PLAIN mechanism encodes: `authzid NUL authcid NUL password`.
/// For IRC SASL, `authzid` is typically empty and `authcid` is the account
/// name.
///
/// # Example
///
/// ```
/// use slirc_client::sasl::encode_plain;
///
/// let encoded = encode_plain("testuser", "testpass");
/// // Decodes to: "\0testuser\0testpass"
/// assert!(!encoded.is_empty());
/// ```
pub fn encode_plain(username: &str, password: &str) -> String {
    // Format: authzid NUL authcid NUL password
    // For IRC, authzid is typically empty
    let payload = format!("\0{}\0{}", username, password);
    BASE64.encode(payload.as_bytes())
}

/// Encode an EXTERNAL mechanism response.
///
/// For EXTERNAL, the response is typically empty ("+") or contains
/// the authorization identity if different from the certificate CN.
pub fn encode_external(authzid: Option<&str>) -> String {
    match authzid {
        Some(id) if !id.is_empty() => BASE64.encode(id.as_bytes()),
        _ => "+".to_owned(), // Empty response
    }
}

/// Split an encoded SASL response into chunks for transmission.
///
/// IRC SASL requires responses longer than 400 bytes to be split
/// across multiple AUTHENTICATE commands. When the payload length is an
/// exact multiple of the chunk size, a final bare `+` must follow; the
/// caller handles that.
pub fn chunk_response(encoded: &str) -> impl Iterator<Item = &str> {
    encoded.as_bytes().chunks(SASL_CHUNK_SIZE).map(|chunk| {
        // Safe because base64 is always ASCII
        std::str::from_utf8(chunk).unwrap()
    })
}
