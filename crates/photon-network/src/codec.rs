//! Length-prefixed framing
//!
//! Wire format: `[length: u32 BE][JSON payload]`. Used by the event-loop
//! server through [`FrameCodec`] and by the blocking server and client through
//! [`read_frame`] / [`write_frame`].
//!
//! The configured frame limit bounds what a server reads from its peers.
//! Outbound frames carry relays and history snapshots, which outgrow any
//! inbound limit as the log grows, so they are bounded only by the prefix.

use crate::error::{NetworkError, NetworkResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read, Write};
use tokio_util::codec::{Decoder, Encoder};

/// Default maximum frame size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size (4 bytes).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest frame a `u32` length prefix can describe.
pub const MAX_WIRE_FRAME_SIZE: usize = u32::MAX as usize;

fn check_length(length: usize, max: usize) -> NetworkResult<()> {
    if length == 0 {
        return Err(NetworkError::EmptyFrame);
    }
    if length > max {
        return Err(NetworkError::FrameTooLarge { size: length, max });
    }
    Ok(())
}

/// Codec for length-prefixed frames.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
    decode_state: DecodeState,
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    ReadingLength,
    ReadingPayload {
        length: usize,
    },
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    /// Creates a codec that rejects inbound frames over `max_frame_size`
    /// bytes. Limits past [`MAX_WIRE_FRAME_SIZE`] are clamped to it.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_WIRE_FRAME_SIZE),
            decode_state: DecodeState::ReadingLength,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = NetworkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.decode_state {
                DecodeState::ReadingLength => {
                    if src.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
                    check_length(length, self.max_frame_size)?;

                    src.advance(LENGTH_PREFIX_SIZE);
                    src.reserve(length);
                    self.decode_state = DecodeState::ReadingPayload { length };
                }
                DecodeState::ReadingPayload { length } => {
                    if src.len() < length {
                        return Ok(None);
                    }

                    let payload = src.split_to(length);
                    self.decode_state = DecodeState::ReadingLength;
                    return Ok(Some(payload));
                }
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = NetworkError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        check_length(item.len(), MAX_WIRE_FRAME_SIZE)?;
        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one frame from a blocking stream.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary.
pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: usize) -> NetworkResult<Option<Vec<u8>>> {
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    match read_full(reader, &mut len_buf)? {
        0 => return Ok(None),
        LENGTH_PREFIX_SIZE => {}
        _ => {
            return Err(NetworkError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated length prefix",
            )))
        }
    }

    let length = u32::from_be_bytes(len_buf) as usize;
    check_length(length, max_frame_size.min(MAX_WIRE_FRAME_SIZE))?;

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Write one frame to a blocking stream and flush it.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> NetworkResult<()> {
    check_length(payload.len(), MAX_WIRE_FRAME_SIZE)?;
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}
