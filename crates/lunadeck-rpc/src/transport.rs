//! ETX-delimited transport codec for JSON-RPC messages.
//!
//! Moonraker's unix socket frames every JSON payload with a trailing ETX
//! byte (`0x03`) instead of a length prefix:
//! ```text
//! +------------------+--------+
//! |  N bytes         | 1 byte |
//! |  (JSON payload)  |  0x03  |
//! +------------------+--------+
//! ```

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::protocol::Message;

/// Maximum message size (16 MB)
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// End-of-text frame terminator
const ETX: u8 = 0x03;

/// Codec for ETX-terminated JSON-RPC messages
#[derive(Debug, Default)]
pub struct JsonRpcCodec {
    // Bytes already scanned for a terminator, so partial frames aren't rescanned.
    next_index: usize,
}

impl JsonRpcCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for JsonRpcCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == ETX) else {
                if src.len() > MAX_MESSAGE_SIZE {
                    return Err(CodecError::MessageTooLarge(src.len()));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            let frame = src.split_to(end + 1);
            self.next_index = 0;

            let payload = &frame[..end];
            if payload.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            // Only this frame is lost; the next one starts after its ETX
            match serde_json::from_slice::<Message>(payload) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => {
                    warn!(
                        "Skipping malformed frame ({} bytes): {err}",
                        payload.len()
                    );
                }
            }
        }
    }
}

impl Encoder<Message> for JsonRpcCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&item)?;
        let json_bytes = json.as_bytes();

        if json_bytes.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::MessageTooLarge(json_bytes.len()));
        }

        dst.reserve(json_bytes.len() + 1);
        dst.put_slice(json_bytes);
        dst.put_u8(ETX);

        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),
}
