//! Events delivered to registered callbacks.
//!
//! One [`Event`] is built per wire line, in each direction. `RAW` handlers
//! see it before structured dispatch; for a line the wire codec could not
//! parse, `message` is `None` and only `RAW` fires.

use chrono::{DateTime, Utc};

use crate::message::Message;

/// A single protocol event: one line, inbound or outbound.
#[derive(Clone, Debug)]
pub struct Event {
    /// Wall-clock time the event was observed.
    pub time: DateTime<Utc>,
    /// The wire line, without CRLF.
    pub raw: String,
    /// The parsed message, when the line decoded successfully.
    pub message: Option<Message>,
}

impl Event {
    pub(crate) fn new(raw: String, message: Option<Message>) -> Self {
        Self {
            time: Utc::now(),
            raw,
            message,
        }
    }

    /// The command name as received, or `""` for an unparsed line.
    pub fn command(&self) -> &str {
        self.message.as_ref().map_or("", |m| m.command.as_str())
    }

    /// All parameters, trailing included.
    pub fn params(&self) -> &[String] {
        self.message.as_ref().map_or(&[], |m| m.params.as_slice())
    }

    /// The parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params().get(index).map(String::as_str)
    }

    /// The last parameter, conventionally the message text. Empty string if
    /// there are none.
    pub fn text(&self) -> &str {
        self.params().last().map_or("", String::as_str)
    }

    /// The raw prefix, or `""`.
    pub fn prefix(&self) -> &str {
        self.message
            .as_ref()
            .and_then(|m| m.prefix.as_deref())
            .unwrap_or("")
    }

    /// Nickname portion of a `nick!user@host` prefix.
    pub fn nick(&self) -> &str {
        self.split_nuh().0
    }

    /// Username portion of a `nick!user@host` prefix.
    pub fn user(&self) -> &str {
        self.split_nuh().1
    }

    /// Host portion of a `nick!user@host` prefix.
    pub fn host(&self) -> &str {
        self.split_nuh().2
    }

    fn split_nuh(&self) -> (&str, &str, &str) {
        let prefix = self.prefix();
        if let (Some(i), Some(j)) = (prefix.find('!'), prefix.find('@')) {
            if i < j {
                return (&prefix[..i], &prefix[i + 1..j], &prefix[j + 1..]);
            }
        }
        ("", "", "")
    }
}
