use futures::StreamExt;
use std::net::SocketAddr;
use tokio::io::{self, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

use crate::codec::{RequestCodec, DEFAULT_MAX_FRAME_SIZE};
use crate::frame::Error;
use crate::reply::Reply;
use crate::request::{ConnectionHandle, Request};

/// One client session: requests are read through [`RequestCodec`], replies are written straight
/// to the stream.
pub struct Connection<S = TcpStream> {
    pub handle: ConnectionHandle,
    // Data is read from the socket into the codec's read buffer. When a request is parsed, the
    // corresponding data is removed from the buffer.
    reader: FramedRead<ReadHalf<S>, RequestCodec>,
    writer: WriteHalf<S>,
}

impl Connection<TcpStream> {
    pub fn new(stream: TcpStream) -> Connection<TcpStream> {
        let address = stream.peer_addr().ok();
        Connection::with_max_frame_size(stream, address, DEFAULT_MAX_FRAME_SIZE)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn with_max_frame_size(
        stream: S,
        address: Option<SocketAddr>,
        max_frame_size: usize,
    ) -> Connection<S> {
        let handle = ConnectionHandle::new(address);
        let (reader, writer) = io::split(stream);

        Connection {
            handle,
            reader: FramedRead::new(reader, RequestCodec::new(handle, max_frame_size)),
            writer,
        }
    }

    /// Reads the next request. `None` means the peer closed the stream between two requests.
    pub async fn read_request(&mut self) -> Result<Option<Request>, Error> {
        self.reader.next().await.transpose()
    }

    /// Writes `reply` and returns the number of bytes sent.
    pub async fn write_reply(&mut self, reply: &Reply) -> Result<u64, Error> {
        reply.write_to(&mut self.writer).await
    }
}
