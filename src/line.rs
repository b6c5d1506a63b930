//! Byte-level line framing for the IRC transport.
//!
//! [`LineCodec`] splits the inbound byte stream on `\n`, strips CR/LF, and
//! decodes to text with a configurable character encoding (UTF-8 by
//! default, decoded lossily so a stray byte never kills the connection).
//! Outbound lines are encoded and terminated with CRLF.
//!
//! Message grammar is handled a layer up, in [`crate::message`]; this codec
//! only deals in whole lines.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ClientError;

/// Maximum length in bytes of an inbound line (tags included) before the
/// peer is considered misbehaving and the connection is dropped.
pub const MAX_INBOUND_LINE_LEN: usize = 8191 + 512;

/// A line-oriented codec with charset decoding.
pub struct LineCodec {
    encoding: &'static encoding::Encoding,
    next_index: usize,
}

impl LineCodec {
    /// Create a codec for the given encoding label (e.g. `"utf-8"`).
    pub fn new(label: &str) -> Result<Self, ClientError> {
        encoding::Encoding::for_label(label.as_bytes())
            .map(|encoding| Self {
                encoding,
                next_index: 0,
            })
            .ok_or_else(|| ClientError::Config(format!("unknown encoding: {}", label)))
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ClientError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let pos = self.next_index + offset;
            self.next_index = 0;

            let line = src.split_to(pos + 1);
            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }

            let (text, _, _) = self.encoding.decode(&line[..end]);
            Ok(Some(text.into_owned()))
        } else if src.len() > MAX_INBOUND_LINE_LEN {
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("inbound line exceeded {} bytes", MAX_INBOUND_LINE_LEN),
            )))
        } else {
            self.next_index = src.len();
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ClientError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), ClientError> {
        let (data, _, _) = self.encoding.encode(&item);
        dst.reserve(data.len() + 2);
        dst.put_slice(&data);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
