use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::command::Command;
use crate::frame::{self, Frame, CRLF};
use crate::Error;

/// Default upper bound for the receive buffer, 512 MiB like the server's own bulk limit.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Turns commands into request bytes and the receive buffer into replies.
///
/// Decoding never consumes a partial frame: whatever cannot be parsed yet stays at the front of
/// the buffer, so feeding the stream in any number of chunks yields the same replies as feeding
/// it at once.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }

    /// Decodes every complete reply currently in `src`, in stream order. The unconsumed tail is
    /// left in `src`.
    pub fn decode_all(&mut self, src: &mut BytesMut) -> Result<Vec<Frame>, Error> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decode(src)? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }

            let mut cursor = Cursor::new(&src[..]);
            match Frame::parse(&mut cursor) {
                Ok(frame) => {
                    let position = cursor.position() as usize;
                    // Remove the parsed frame from the buffer.
                    src.advance(position);
                    return Ok(Some(frame));
                }
                // Not enough data to parse a frame. Everything from the frame's first byte
                // stays buffered, arrays included, so the buffer now holds that one frame only.
                Err(frame::Error::Incomplete) => {
                    if src.len() > self.max_frame_size {
                        return Err("frame size exceeds limit".into());
                    }
                    return Ok(None);
                }
                // A malformed frame must not stall the stream: drop one byte and try to pick up
                // the next frame boundary.
                Err(err) => {
                    warn!(byte = src[0], "skipping malformed reply data: {}", err);
                    src.advance(1);
                }
            }
        }
    }
}

impl Encoder<&Command> for FrameCodec {
    type Error = Error;

    /// `*<argc>\r\n` followed by one `$<len>\r\n<bytes>\r\n` block per argument.
    fn encode(&mut self, command: &Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let argc = command.args().len().to_string();
        dst.reserve(command.encoded_len());

        dst.put_u8(b'*');
        dst.put_slice(argc.as_bytes());
        dst.put_slice(CRLF);

        for arg in command.args() {
            dst.put_u8(b'$');
            dst.put_slice(arg.len().to_string().as_bytes());
            dst.put_slice(CRLF);
            dst.put_slice(arg);
            dst.put_slice(CRLF);
        }

        Ok(())
    }
}
