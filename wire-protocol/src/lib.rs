//! The length-prefixed JSON framing shared by the frontend and backend tiers.
//!
//! Every message on the wire is a 4-byte big-endian length header followed
//! by that many bytes of UTF-8 JSON: `{"type": <type>, "data": <data>}`.
//! Both sides speak exactly this framing, nothing more — no compression, no
//! keepalive, no multiplexing. A connection carries one request and one
//! response, then is closed by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Header is a plain `u32` length of the JSON body that follows, big-endian.
pub const HEADER_SIZE: usize = 4;

/// Frames larger than this are rejected before the body is even read, so a
/// misbehaving peer can't make us allocate an unbounded buffer.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Screenshot,
    Performance,
    ImageProcessing,
    Response,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Screenshot => "screenshot",
            MessageType::Performance => "performance",
            MessageType::ImageProcessing => "image_processing",
            MessageType::Response => "response",
            MessageType::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub data: Value,
}

impl Message {
    pub fn new(msg_type: MessageType, data: Value) -> Self {
        Self { msg_type, data }
    }

    pub fn response(data: Value) -> Self {
        Self::new(MessageType::Response, data)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            MessageType::Error,
            serde_json::json!({ "error": message.into(), "success": false }),
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("frame exceeds maximum size of {max} bytes (got {actual})")]
    TooLarge { max: u32, actual: u32 },
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes a message to its wire representation: header followed by body.
pub fn encode(message: &Message) -> Result<Vec<u8>, FrameError> {
    let body = serde_json::to_vec(message)?;
    let len: u32 = body
        .len()
        .try_into()
        .map_err(|_| FrameError::TooLarge {
            max: MAX_FRAME_SIZE,
            actual: u32::MAX,
        })?;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            max: MAX_FRAME_SIZE,
            actual: len,
        });
    }
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Parses a message body (without the header) into a `Message`.
pub fn decode_body(body: &[u8]) -> Result<Message, FrameError> {
    Ok(serde_json::from_slice(body)?)
}

/// Writes one framed message to `writer` and flushes it. A connection is
/// meant to carry a single request/response pair, so callers are expected to
/// write once per socket.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), FrameError> {
    let framed = encode(message)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one framed message from `reader`. Returns
/// `FrameError::ConnectionClosed` if the peer closes the connection before a
/// complete header is available (a clean "nothing more to read" EOF).
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, FrameError> {
    let mut header = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed)
        }
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            max: MAX_FRAME_SIZE,
            actual: len,
        });
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            _ => FrameError::Io(err),
        })?;

    decode_body(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_message() {
        let message = Message::new(
            MessageType::Screenshot,
            serde_json::json!({"url": "https://example.com"}),
        );
        let mut buf = Vec::new();
        write_message(&mut buf, &message).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_message(&mut cursor).await.unwrap();
        assert_eq!(decoded.msg_type, MessageType::Screenshot);
        assert_eq!(decoded.data["url"], "https://example.com");
    }

    #[tokio::test]
    async fn rejects_oversized_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn reports_connection_closed_on_partial_header() {
        let buf = vec![0u8, 1u8];
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn rejects_malformed_json_body() {
        let err = decode_body(b"not json").unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[test]
    fn message_type_round_trips_through_json() {
        for mt in [
            MessageType::Screenshot,
            MessageType::Performance,
            MessageType::ImageProcessing,
            MessageType::Response,
            MessageType::Error,
        ] {
            let json = serde_json::to_string(&mt).unwrap();
            let back: MessageType = serde_json::from_str(&json).unwrap();
            assert_eq!(mt, back);
            assert_eq!(json.trim_matches('"'), mt.as_str());
        }
    }
}
