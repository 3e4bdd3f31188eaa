use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::frame::Error;
use crate::request::{ConnectionHandle, PartialRequest, Request};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Decodes multibulk requests from a connection's read buffer.
///
/// A request that doesn't arrive in one read is decoded element by element: bytes of complete
/// elements are removed from the buffer right away and only the unfinished element is retried.
pub struct RequestCodec {
    connection: ConnectionHandle,
    max_frame_size: usize,
    partial: PartialRequest,
    // Bytes of the partial request already removed from the buffer.
    consumed: usize,
}

impl RequestCodec {
    pub fn new(connection: ConnectionHandle, max_frame_size: usize) -> RequestCodec {
        RequestCodec {
            connection,
            max_frame_size,
            partial: PartialRequest::default(),
            consumed: 0,
        }
    }
}

impl Decoder for RequestCodec {
    type Item = Request;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let budget = self.max_frame_size.saturating_sub(self.consumed);
        let result = self.partial.resume(&mut cursor, self.connection, budget);
        let position = cursor.position() as usize;

        match result {
            Ok(request) => {
                trace!(bytes = self.consumed + position, "decoded request");
                self.consumed = 0;

                // Remove the rest of the parsed request from the buffer.
                src.advance(position);

                Ok(Some(request))
            }
            Err(Error::Incomplete) => {
                src.advance(position);
                self.consumed += position;

                // Nothing more can be buffered than a single frame is allowed to take.
                if self.consumed + src.len() > self.max_frame_size {
                    return Err(Error::MalformedHeader(format!(
                        "frame size exceeds limit of {} bytes",
                        self.max_frame_size
                    )));
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None if src.is_empty() && self.partial.is_empty() => Ok(None),
            None => Err(Error::TruncatedInput(None)),
        }
    }
}
