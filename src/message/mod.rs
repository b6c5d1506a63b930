//! Generic IRC wire messages.
//!
//! The engine treats the wire format as a black box: a message is tags, an
//! optional prefix, a command, and parameters. No command-specific typing is
//! applied here; the dispatch layer keys on the (uppercased) command string.
//!
//! # Example
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let msg = Message::new("PRIVMSG", &["#rust", "Hello, world!"])
//!     .with_tag("msgid", Some("abc123"));
//! assert_eq!(msg.to_string(), "@msgid=abc123 PRIVMSG #rust :Hello, world!");
//!
//! let parsed: Message = ":nick!user@host PRIVMSG #rust :hi".parse().unwrap();
//! assert_eq!(parsed.command, "PRIVMSG");
//! assert_eq!(parsed.params, vec!["#rust", "hi"]);
//! ```

mod parse;
pub mod tags;

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

use self::parse::ParsedMessage;
use self::tags::{escape_tag_value, unescape_tag_value};

/// A single IRCv3 message tag: key and optional value.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub String, pub Option<String>);

/// A parsed IRC message.
///
/// Wire form: `[@tags ][:prefix ]COMMAND[ param]* [:trailing]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// IRCv3 message tags, if present.
    pub tags: Option<Vec<Tag>>,
    /// Message source (`nick!user@host` or server name), if present.
    pub prefix: Option<String>,
    /// The command name or three-digit numeric, as received.
    pub command: String,
    /// Command parameters, including the trailing parameter.
    pub params: Vec<String>,
}

impl Message {
    /// Construct a message from a command and parameters.
    pub fn new(command: &str, params: &[&str]) -> Self {
        Self {
            tags: None,
            prefix: None,
            command: command.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Attach a tag, returning the modified message.
    #[must_use]
    pub fn with_tag(mut self, key: &str, value: Option<&str>) -> Self {
        let tag = Tag(key.to_string(), value.map(str::to_string));
        match self.tags {
            Some(ref mut tags) => tags.push(tag),
            None => self.tags = Some(vec![tag]),
        }
        self
    }

    /// Attach a prefix, returning the modified message.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Parse a single IRC line (CR/LF tolerated and ignored).
    pub fn parse(line: &str) -> Result<Self, MessageParseError> {
        let parsed = ParsedMessage::parse(line)?;

        let tags = parsed.tags.map(|raw| {
            raw.split(';')
                .filter(|s| !s.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((key, value)) => {
                        Tag(key.to_string(), Some(unescape_tag_value(value)))
                    }
                    None => Tag(pair.to_string(), None),
                })
                .collect()
        });

        Ok(Self {
            tags,
            prefix: parsed.prefix.map(str::to_string),
            command: parsed.command.to_string(),
            params: parsed.params.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Serialized form without the tags section (and without CRLF).
    ///
    /// The outbound line-length limit applies to this portion only; tags
    /// have their own, much larger limit on the wire.
    pub fn body(&self) -> String {
        let mut out = String::new();
        if let Some(ref prefix) = self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(&self.command);
        if let Some((last, rest)) = self.params.split_last() {
            for param in rest {
                out.push(' ');
                out.push_str(param);
            }
            out.push(' ');
            if last.is_empty() || last.starts_with(':') || last.contains(' ') {
                out.push(':');
            }
            out.push_str(last);
        }
        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref tags) = self.tags {
            f.write_str("@")?;
            for (i, Tag(key, value)) in tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(key)?;
                if let Some(value) = value {
                    f.write_str("=")?;
                    escape_tag_value(f, value)?;
                }
            }
            f.write_str(" ")?;
        }
        f.write_str(&self.body())
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
