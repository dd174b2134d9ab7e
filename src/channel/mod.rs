//! Length-framed message channel between the coordinator and its workers
//!
//! Every message is a frame: a 2-byte big-endian length followed by exactly
//! that many payload bytes. The payload itself is a text command or reply, see
//! [`protocol`].
//!
//! Readers never hand a partial frame to protocol logic. A stream that ends
//! before the length prefix is complete is a clean close; a stream that ends
//! inside the payload is reported as [`Received::Short`] and each side decides
//! what that means.

pub mod protocol;

pub use protocol::{Command, ProtocolError, Reply};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload a frame may carry
pub const MAX_FRAME_LEN: usize = 4096;

/// Size of the in-memory pipe backing each worker channel
pub const CHANNEL_BUFFER: usize = 64 * 1024;

/// Errors raised by the framing layer
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Outcome of reading one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete frame payload
    Frame(Vec<u8>),

    /// The peer closed the stream before a length prefix arrived
    Closed,

    /// The stream ended inside a payload; holds the bytes that did arrive
    Short(Vec<u8>),
}

/// Writes one frame: the length prefix, then the payload
///
/// The frame is assembled first and written with `write_all`, so partial
/// writes are retried until everything is flushed.
pub async fn send<W>(writer: &mut W, payload: &[u8]) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(payload.len()).map_err(|_| ChannelError::FrameTooLarge {
        len: payload.len(),
        max: u16::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(2 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame whose payload may be at most `max_len` bytes
///
/// An oversized length prefix is rejected before any payload is read.
pub async fn receive<R>(reader: &mut R, max_len: usize) -> Result<Received, ChannelError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 2];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return Ok(Received::Closed);
        }
        filled += n;
    }

    let len = u16::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(ChannelError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut payload[filled..]).await?;
        if n == 0 {
            payload.truncate(filled);
            return Ok(Received::Short(payload));
        }
        filled += n;
    }

    Ok(Received::Frame(payload))
}
