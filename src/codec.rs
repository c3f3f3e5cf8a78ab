//! Binary envelope used when a message travels with a payload.
//!
//! A packed frame is laid out as:
//!
//! ```text
//! +----------------+----------------------+-----------------+
//! | len: u16 (BE)  | JSON message (len B) | payload (rest)  |
//! +----------------+----------------------+-----------------+
//! ```
//!
//! Messages without a payload are sent as plain text frames and never go
//! through [`pack`].

use crate::error::{Error, Result};
use crate::protocol::Inbound;
use crate::transport::Frame;
use serde::Serialize;
use serde_json::Value;

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 2;

/// Largest JSON block the length prefix can describe
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// A frame split back into its JSON message and raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct Unpacked {
    /// Parsed JSON message
    pub message: Value,

    /// Bytes following the JSON block
    pub payload: Vec<u8>,
}

/// Pack a JSON-serializable message and a payload into one binary frame
pub fn pack<T: Serialize + ?Sized>(message: &T, payload: &[u8]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(message).map_err(|e| Error::Serialize(e.to_string()))?;
    let len = u16::try_from(json.len()).map_err(|_| Error::MessageTooLarge(json.len()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + json.len() + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&json);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Unpack a binary frame produced by [`pack`]
pub fn unpack(frame: &[u8]) -> Result<Unpacked> {
    if frame.len() < HEADER_LEN {
        return Err(Error::Decode(format!(
            "frame of {} bytes is shorter than the length header",
            frame.len()
        )));
    }

    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let body = &frame[HEADER_LEN..];
    if len > body.len() {
        return Err(Error::Decode(format!(
            "declared message length {} exceeds the {} bytes available",
            len,
            body.len()
        )));
    }

    let message = serde_json::from_slice(&body[..len])?;
    Ok(Unpacked {
        message,
        payload: body[len..].to_vec(),
    })
}

/// Decode a transport frame into a classified inbound message
pub fn decode_frame(frame: Frame) -> Result<Inbound> {
    match frame {
        Frame::Text(text) => {
            let message: Value = serde_json::from_str(&text)?;
            Ok(Inbound::classify(message, None))
        }
        Frame::Binary(bytes) => {
            let Unpacked { message, payload } = unpack(&bytes)?;
            Ok(Inbound::classify(message, Some(payload)))
        }
    }
}

/// Encode a message, packing it with the payload when one is present
pub fn encode_frame<T: Serialize + ?Sized>(message: &T, payload: Option<&[u8]>) -> Result<Frame> {
    match payload {
        Some(payload) => Ok(Frame::Binary(pack(message, payload)?)),
        None => serde_json::to_string(message)
            .map(Frame::Text)
            .map_err(|e| Error::Serialize(e.to_string())),
    }
}
