//! Frame codec
//!
//! Every frame on the wire is:
//!
//! ```text
//! +----------------+--------+-------------------+
//! | length (u32 BE)| kind   | body              |
//! +----------------+--------+-------------------+
//!   covers kind + body
//! ```
//!
//! Strings are a u32 BE byte length followed by UTF-8. Timestamps are u64 BE
//! microseconds since the Unix epoch.
//!
//! | kind | direction | body                                         |
//! |------|-----------|----------------------------------------------|
//! | 0x01 | C -> S    | want_history: u8                             |
//! | 0x02 | C -> S    | since: timestamp                             |
//! | 0x03 | C -> S    | channel: string, text: string                |
//! | 0x04 | C -> S    | password: string                             |
//! | 0x81 | S -> C    | timestamp, channel, sender, content          |
//! | 0x82 | S -> C    | text: string                                 |

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::constants::*;
use super::message::{ChatMessage, ClientRequest, ServerEvent};
use crate::error::{ProtocolError, Result};

/// Encode a client request as one frame
pub fn encode_request(req: &ClientRequest, buf: &mut BytesMut) {
    match req {
        ClientRequest::Subscribe { want_history } => {
            let start = begin_frame(buf, KIND_SUBSCRIBE);
            buf.put_u8(u8::from(*want_history));
            finish_frame(buf, start);
        }
        ClientRequest::ReplayHistory { since } => {
            let start = begin_frame(buf, KIND_REPLAY_HISTORY);
            put_timestamp(buf, *since);
            finish_frame(buf, start);
        }
        ClientRequest::SendMessage { channel, text } => {
            let start = begin_frame(buf, KIND_SEND_MESSAGE);
            put_string(buf, channel);
            put_string(buf, text);
            finish_frame(buf, start);
        }
        ClientRequest::Shutdown { password } => {
            let start = begin_frame(buf, KIND_SHUTDOWN);
            put_string(buf, password);
            finish_frame(buf, start);
        }
    }
}

/// Bytes of a chat message frame besides its channel, sender and content:
/// kind, timestamp and three string lengths
pub const MESSAGE_FRAME_OVERHEAD: usize = 1 + 8 + 3 * 4;

/// Longest content, in bytes, that still fits one chat message frame
pub fn max_content_len(channel: &str, sender: &str) -> usize {
    MAX_FRAME_SIZE.saturating_sub(MESSAGE_FRAME_OVERHEAD + channel.len() + sender.len())
}

/// Encode a chat message frame
pub fn encode_message(msg: &ChatMessage, buf: &mut BytesMut) {
    let start = begin_frame(buf, KIND_CHAT_MESSAGE);
    put_timestamp(buf, msg.timestamp);
    put_string(buf, &msg.channel);
    put_string(buf, &msg.sender);
    put_string(buf, &msg.content);
    finish_frame(buf, start);
}

/// Encode a system notice frame
pub fn encode_notice(text: &str, buf: &mut BytesMut) {
    let start = begin_frame(buf, KIND_SYSTEM_NOTICE);
    put_string(buf, text);
    finish_frame(buf, start);
}

/// Encode any server event
pub fn encode_event(event: &ServerEvent, buf: &mut BytesMut) {
    match event {
        ServerEvent::Message(msg) => encode_message(msg, buf),
        ServerEvent::Notice(text) => encode_notice(text, buf),
    }
}

/// Split one complete frame off the front of `buf`
///
/// Returns `Ok(None)` when more bytes are needed. The length is validated
/// before the body arrives so an oversized frame is rejected without
/// buffering it.
pub fn decode_frame(
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> std::result::Result<Option<(u8, Bytes)>, ProtocolError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len == 0 {
        return Err(ProtocolError::Truncated("frame kind"));
    }
    if len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let total = FRAME_HEADER_SIZE + len;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    let mut body = buf.split_to(len).freeze();
    let kind = body.get_u8();
    Ok(Some((kind, body)))
}

/// Decode the body of a client -> server frame
pub fn decode_request(
    kind: u8,
    mut body: Bytes,
) -> std::result::Result<ClientRequest, ProtocolError> {
    let req = match kind {
        KIND_SUBSCRIBE => {
            need(&body, 1, "want_history")?;
            ClientRequest::Subscribe {
                want_history: body.get_u8() != 0,
            }
        }
        KIND_REPLAY_HISTORY => ClientRequest::ReplayHistory {
            since: get_timestamp(&mut body, "since")?,
        },
        KIND_SEND_MESSAGE => {
            let channel = get_string(&mut body, "channel")?;
            let text = get_string(&mut body, "text")?;
            ClientRequest::SendMessage { channel, text }
        }
        KIND_SHUTDOWN => ClientRequest::Shutdown {
            password: get_string(&mut body, "password")?,
        },
        other => return Err(ProtocolError::UnknownFrameKind(other)),
    };

    expect_end(&body)?;
    Ok(req)
}

/// Decode the body of a server -> client frame
pub fn decode_event(kind: u8, mut body: Bytes) -> std::result::Result<ServerEvent, ProtocolError> {
    let event = match kind {
        KIND_CHAT_MESSAGE => {
            let timestamp = get_timestamp(&mut body, "timestamp")?;
            let channel = get_string(&mut body, "channel")?;
            let sender = get_string(&mut body, "sender")?;
            let content = get_string(&mut body, "content")?;
            ServerEvent::Message(Arc::new(ChatMessage::new(
                channel, sender, content, timestamp,
            )))
        }
        KIND_SYSTEM_NOTICE => ServerEvent::Notice(get_string(&mut body, "notice")?),
        other => return Err(ProtocolError::UnknownFrameKind(other)),
    };

    expect_end(&body)?;
    Ok(event)
}

fn begin_frame(buf: &mut BytesMut, kind: u8) -> usize {
    let start = buf.len();
    buf.put_u32(0);
    buf.put_u8(kind);
    start
}

fn finish_frame(buf: &mut BytesMut, start: usize) {
    let len = (buf.len() - start - FRAME_HEADER_SIZE) as u32;
    buf[start..start + FRAME_HEADER_SIZE].copy_from_slice(&len.to_be_bytes());
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn put_timestamp(buf: &mut BytesMut, t: SystemTime) {
    let micros = t
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    buf.put_u64(micros);
}

fn need(body: &Bytes, n: usize, field: &'static str) -> std::result::Result<(), ProtocolError> {
    if body.remaining() < n {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(())
}

fn get_string(body: &mut Bytes, field: &'static str) -> std::result::Result<String, ProtocolError> {
    need(body, 4, field)?;
    let len = body.get_u32() as usize;
    need(body, len, field)?;
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(field))
}

fn get_timestamp(
    body: &mut Bytes,
    field: &'static str,
) -> std::result::Result<SystemTime, ProtocolError> {
    need(body, 8, field)?;
    let micros = body.get_u64();
    UNIX_EPOCH
        .checked_add(Duration::from_micros(micros))
        .ok_or(ProtocolError::InvalidTimestamp(micros))
}

fn expect_end(body: &Bytes) -> std::result::Result<(), ProtocolError> {
    if body.has_remaining() {
        return Err(ProtocolError::TrailingBytes(body.remaining()));
    }
    Ok(())
}

/// Buffered frame reader over any byte stream
///
/// `read_frame` is cancel safe: bytes of a partially received frame stay in
/// the internal buffer, so it can sit in a `tokio::select!` arm.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with an 8KB initial buffer
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, 8 * 1024)
    }

    /// Create a reader with the given initial buffer size
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Read the next frame; `None` on a clean close between frames
    pub async fn read_frame(&mut self) -> Result<Option<(u8, Bytes)>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_frame_size)? {
                return Ok(Some(frame));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )
                .into());
            }
        }
    }

    /// Read and decode the next client request
    pub async fn read_request(&mut self) -> Result<Option<ClientRequest>> {
        match self.read_frame().await? {
            Some((kind, body)) => Ok(Some(decode_request(kind, body)?)),
            None => Ok(None),
        }
    }

    /// Read and decode the next server event
    pub async fn read_event(&mut self) -> Result<Option<ServerEvent>> {
        match self.read_frame().await? {
            Some((kind, body)) => Ok(Some(decode_event(kind, body)?)),
            None => Ok(None),
        }
    }
}

/// Frame writer; each send is written and flushed as a unit
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4 * 1024),
        }
    }

    pub async fn send_request(&mut self, req: &ClientRequest) -> Result<()> {
        self.buf.clear();
        encode_request(req, &mut self.buf);
        self.write_buffered().await
    }

    pub async fn send_message(&mut self, msg: &ChatMessage) -> Result<()> {
        self.buf.clear();
        encode_message(msg, &mut self.buf);
        self.write_buffered().await
    }

    pub async fn send_notice(&mut self, text: &str) -> Result<()> {
        self.buf.clear();
        encode_notice(text, &mut self.buf);
        self.write_buffered().await
    }

    pub async fn send_event(&mut self, event: &ServerEvent) -> Result<()> {
        self.buf.clear();
        encode_event(event, &mut self.buf);
        self.write_buffered().await
    }

    /// Shut down the write half of the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    async fn write_buffered(&mut self) -> Result<()> {
        // Never emit a frame the peer's reader would refuse
        let size = self.buf.len() - FRAME_HEADER_SIZE;
        if size > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: MAX_FRAME_SIZE,
            }
            .into());
        }

        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
