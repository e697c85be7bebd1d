//! Length-prefixed frame codec.
//!
//! Wire format:
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | Payload          |
//! +----------------------------+------------------+
//! ```
//!
//! The payload is the UTF-8 text message parsed by
//! [`super::message::Frame::parse`]. The length prefix is validated
//! against the codec's current limit before the payload is buffered, so an
//! oversized announcement never causes an allocation.
//!
//! New connections start with the stricter [`MAX_LOGIN_FRAME_SIZE`] limit;
//! the connection task calls [`FrameCodec::upgrade_to_full_frame_size`]
//! after a successful login.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::{ProtocolError, MAX_FRAME_SIZE, MAX_LOGIN_FRAME_SIZE};

/// Length prefix width in bytes.
const LENGTH_PREFIX: usize = 4;

/// Frame codec with a switchable size limit.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Codec for a fresh, unauthenticated connection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: MAX_LOGIN_FRAME_SIZE,
        }
    }

    /// Codec with an explicit limit (used by clients and tests).
    #[must_use]
    pub const fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Raise the limit to [`MAX_FRAME_SIZE`] after a successful login.
    pub fn upgrade_to_full_frame_size(&mut self) {
        self.max_frame_size = MAX_FRAME_SIZE;
    }

    /// The limit currently in force.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX]);
        let size = u32::from_be_bytes(prefix) as usize;

        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        if src.len() < LENGTH_PREFIX + size {
            src.reserve(LENGTH_PREFIX + size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        Ok(Some(src.split_to(size).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Outbound frames are server-built and bounded by the full limit
        // regardless of the inbound phase.
        if item.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: item.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        dst.reserve(LENGTH_PREFIX + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}
