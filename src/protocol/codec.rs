use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use super::{LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
use crate::core::{Error, Result};

/// A single decoded NIS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of a non-empty frame, trimmed of surrounding whitespace
    Line(String),
    /// Zero-length frame the daemon sends after the last line
    End,
}

/// Codec for the NIS length-prefixed framing
///
/// Every frame on the wire is a big-endian `u16` length followed by that many
/// payload bytes. Payloads longer than [`MAX_FRAME_SIZE`] are truncated and
/// the rest of the declared bytes are dropped so the following frame is still
/// read from its own prefix.
///
/// Dropping the excess departs on purpose from apcupsd's own reference
/// client, which reads only the first 255 bytes and leaves the remainder on
/// the wire to be misread as the next length prefix.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    /// Bytes of an oversized frame that still have to be dropped
    discard: usize,
}

impl FrameCodec {
    /// Creates a new frame codec
    pub fn new() -> Self {
        FrameCodec::default()
    }

    /// Drops pending oversized bytes, returns true once none are left
    fn skip_discarded(&mut self, src: &mut BytesMut) -> bool {
        let n = self.discard.min(src.len());
        src.advance(n);
        self.discard -= n;
        self.discard == 0
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !self.skip_discarded(src) {
            return Ok(None);
        }

        if src.len() < LENGTH_PREFIX_SIZE {
            // Need more data to read frame length
            return Ok(None);
        }

        let declared = u16::from_be_bytes([src[0], src[1]]) as usize;
        if declared == 0 {
            src.advance(LENGTH_PREFIX_SIZE);
            trace!("decoded end of response frame");
            return Ok(Some(Frame::End));
        }

        let size = declared.min(MAX_FRAME_SIZE);
        if src.len() < LENGTH_PREFIX_SIZE + size {
            // Need more data to read full payload
            src.reserve(LENGTH_PREFIX_SIZE + size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let payload = src.split_to(size);

        if declared > size {
            warn!(
                declared,
                max = MAX_FRAME_SIZE,
                "frame exceeds maximum size, truncating"
            );
            self.discard = declared - size;
            self.skip_discarded(src);
        }

        let line = String::from_utf8_lossy(&payload).trim().to_string();
        trace!(%line, "decoded frame");
        Ok(Some(Frame::Line(line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        // The daemon may close without a zero-length frame. A stream that
        // stops on a frame boundary, or right after a length prefix, is a
        // complete response.
        if self.discard > 0 {
            trace!(remaining = self.discard, "stream closed inside oversized frame");
            self.discard = 0;
            return Ok(None);
        }

        match src.len() {
            0 => Ok(None),
            LENGTH_PREFIX_SIZE => {
                trace!("stream closed after length prefix");
                src.clear();
                Ok(None)
            }
            1 => Err(Error::network("truncated frame: incomplete length prefix")),
            n => {
                let declared = u16::from_be_bytes([src[0], src[1]]) as usize;
                Err(Error::network(format!(
                    "truncated frame: expected {} payload bytes, got {}",
                    declared.min(MAX_FRAME_SIZE),
                    n - LENGTH_PREFIX_SIZE
                )))
            }
        }
    }
}

impl<'a> Encoder<&'a str> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, command: &'a str, dst: &mut BytesMut) -> Result<()> {
        let length = u16::try_from(command.len()).map_err(|_| {
            Error::protocol(format!("command too long: {} bytes", command.len()))
        })?;

        dst.reserve(LENGTH_PREFIX_SIZE + command.len());

        // Write length prefix
        dst.put_u16(length);

        // Write command bytes
        dst.extend_from_slice(command.as_bytes());

        Ok(())
    }
}

/// Encodes a single command as a request frame
pub fn encode_command(command: &str) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + command.len());
    FrameCodec::new().encode(command, &mut buf)?;
    Ok(buf.freeze())
}
