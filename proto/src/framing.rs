//! Wire framing shared by every channel (C1).
//!
//! Two framings are used across the system:
//!
//! * [`LengthPrefixedReader`]/[`write_length_prefixed`] — a 4-byte
//!   big-endian length prefix followed by exactly that many bytes of UTF-8
//!   JSON. Used on the screen-share and file sockets.
//! * [`NdjsonReader`]/[`write_ndjson_message`] — one UTF-8 JSON object per
//!   line, terminated by `\n`. Used on the control channel.
//!
//! Neither framing knows about the message types carried over it; callers
//! decide what to deserialize into and how to react to an unknown `type`
//! field (log and ignore, per the control channel's contract).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Reject any length-prefixed frame larger than this many bytes.
pub const MAX_FRAME_LEN: u32 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("peer closed the connection")]
    Closed,
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte cap")]
    Oversized(u32),
    #[error("malformed JSON frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Length-prefixed JSON
// ────────────────────────────────────────────────────────────────────────────

/// Read one length-prefixed JSON frame as a raw [`Value`].
///
/// Returns [`FrameError::Closed`] on a clean EOF while reading the length
/// prefix (a partial read of the prefix itself is still an `Io` error),
/// [`FrameError::Oversized`] if the declared length exceeds [`MAX_FRAME_LEN`],
/// and [`FrameError::Malformed`] if the body does not parse as JSON.
pub async fn read_length_prefixed_value<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Value, FrameError> {
    let bytes = read_length_prefixed_bytes(reader).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read one length-prefixed JSON frame and deserialize it as `T`.
pub async fn read_length_prefixed<T: DeserializeOwned, R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<T, FrameError> {
    let bytes = read_length_prefixed_bytes(reader).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read the raw bytes of one length-prefixed frame without parsing them.
pub async fn read_length_prefixed_bytes<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(FrameError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversized(len));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Serialize `msg` and write it as a single length-prefixed frame in one
/// logical write (length + body concatenated, then flushed).
pub async fn write_length_prefixed<T: Serialize, W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &T,
) -> Result<(), FrameError> {
    write_length_prefixed_bytes(writer, &serde_json::to_vec(msg)?).await
}

/// Write raw `body` as a single length-prefixed frame, with no JSON
/// encoding. Used for non-JSON sentinels (e.g. the file broker's `ERROR`
/// reply) that must share the same framing as the JSON frames on the same
/// connection so a reader can tell them apart with one read.
pub async fn write_length_prefixed_bytes<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), FrameError> {
    let len = body.len() as u32;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Newline-delimited JSON
// ────────────────────────────────────────────────────────────────────────────

/// Buffered reader for newline-delimited JSON, used on the control channel.
///
/// Accumulates bytes across reads until a `\n` is seen; empty lines (bare
/// `\n` with no content, or CRLF leftovers) are skipped transparently.
pub struct NdjsonReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin> NdjsonReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    /// Read the next non-empty line as a raw [`Value`]. Returns
    /// [`FrameError::Closed`] on EOF.
    pub async fn read_value(&mut self) -> Result<Value, FrameError> {
        loop {
            let mut line = String::new();
            let n = self.inner.read_line(&mut line).await?;
            if n == 0 {
                return Err(FrameError::Closed);
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            return Ok(serde_json::from_str(trimmed)?);
        }
    }

    /// Read the next non-empty line and deserialize it as `T`.
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> Result<T, FrameError> {
        let value = self.read_value().await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Serialize `msg` as one line of newline-delimited JSON and write it.
pub async fn write_ndjson_message<T: Serialize, W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &T,
) -> Result<(), FrameError> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn length_prefixed_round_trips() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, &Ping { n: 7 }).await.unwrap();
        let mut cursor = Cursor::new(buf);
        let got: Ping = read_length_prefixed(&mut cursor).await.unwrap();
        assert_eq!(got, Ping { n: 7 });
    }

    #[tokio::test]
    async fn length_prefixed_rejects_oversized() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_length_prefixed_bytes(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::Oversized(_)));
    }

    #[tokio::test]
    async fn length_prefixed_empty_is_closed() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = read_length_prefixed_bytes(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::Closed));
    }

    #[tokio::test]
    async fn ndjson_skips_empty_lines() {
        let data = b"\n\n{\"n\":3}\n".to_vec();
        let mut reader = NdjsonReader::new(Cursor::new(data));
        let got: Ping = reader.read_message().await.unwrap();
        assert_eq!(got, Ping { n: 3 });
    }

    #[tokio::test]
    async fn ndjson_round_trips() {
        let mut buf = Vec::new();
        write_ndjson_message(&mut buf, &Ping { n: 42 }).await.unwrap();
        assert_eq!(buf, b"{\"n\":42}\n");
        let mut reader = NdjsonReader::new(Cursor::new(buf));
        let got: Ping = reader.read_message().await.unwrap();
        assert_eq!(got, Ping { n: 42 });
    }
}
