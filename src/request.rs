use bytes::Bytes;
use std::io::Cursor;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::frame::{self, Error, CRLF};

/// Identifies the connection a request was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub address: Option<SocketAddr>,
}

impl ConnectionHandle {
    pub fn new(address: Option<SocketAddr>) -> ConnectionHandle {
        ConnectionHandle {
            id: Uuid::new_v4(),
            address,
        }
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A command sent by a client as a multibulk frame: `*<n>\r\n` followed by `n` bulk strings.
///
/// The first bulk string is the command name, kept in the case it was received in. The
/// remaining `n - 1` bulk strings are the arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub command: String,
    pub arguments: Vec<Bytes>,
    pub connection: ConnectionHandle,
}

impl Request {
    pub fn new(
        command: impl Into<String>,
        arguments: Vec<Bytes>,
        connection: ConnectionHandle,
    ) -> Request {
        Request {
            command: command.into(),
            arguments,
            connection,
        }
    }

    /// Decodes one complete request from `src`.
    ///
    /// On `Err(Error::Incomplete)` the caller is expected to retry from the start once more data
    /// is buffered. A request that would take more than `max_size` bytes is rejected as soon as
    /// a bulk header announces it, before its payload is read.
    pub fn parse(
        src: &mut Cursor<&[u8]>,
        connection: ConnectionHandle,
        max_size: usize,
    ) -> Result<Request, Error> {
        PartialRequest::default().resume(src, connection, max_size)
    }

    /// Serializes the request as a multibulk command frame.
    pub fn serialize(&self) -> Vec<u8> {
        let count = (self.arguments.len() + 1).to_string();
        let mut bytes = Vec::with_capacity(
            1 + count.len()
                + CRLF.len()
                + bulk_len(self.command.as_bytes())
                + self.arguments.iter().map(|a| bulk_len(a)).sum::<usize>(),
        );

        bytes.push(b'*');
        bytes.extend_from_slice(count.as_bytes());
        bytes.extend_from_slice(CRLF);

        serialize_bulk(&mut bytes, self.command.as_bytes());
        for argument in &self.arguments {
            serialize_bulk(&mut bytes, argument);
        }

        bytes
    }
}

/// A request whose bytes arrive in pieces.
///
/// Elements are decoded one at a time and kept here, so the bytes they came from can be dropped
/// from the read buffer and are never parsed twice.
#[derive(Debug, Default)]
pub(crate) struct PartialRequest {
    // Number of bulk strings announced by the `*<n>` header, command included.
    count: Option<usize>,
    command: Option<String>,
    arguments: Vec<Bytes>,
}

impl PartialRequest {
    /// True when no part of a request has been decoded yet.
    pub(crate) fn is_empty(&self) -> bool {
        self.count.is_none()
    }

    /// Continues decoding from `src`.
    ///
    /// On `Err(Error::Incomplete)` the cursor is left just past the last complete element, so
    /// everything before it can be discarded before the next call. `max_size` is what is left
    /// of the request size limit, counted from the start of `src`.
    pub(crate) fn resume(
        &mut self,
        src: &mut Cursor<&[u8]>,
        connection: ConnectionHandle,
        max_size: usize,
    ) -> Result<Request, Error> {
        let count = match self.count {
            Some(count) => count,
            None => {
                let count = parse_header(src)?;
                // The declared count is untrusted, don't let it size the allocation on its own.
                self.arguments = Vec::with_capacity((count - 1).min(1024));
                self.count = Some(count);
                count
            }
        };

        if self.command.is_none() {
            let command = resume_bulk(src, max_size)?;
            let command = String::from_utf8(command.to_vec()).map_err(|_| {
                Error::MalformedHeader("command name is not valid UTF-8".to_string())
            })?;
            self.command = Some(command);
        }

        while self.arguments.len() < count - 1 {
            let argument = resume_bulk(src, max_size)?;
            self.arguments.push(argument);
        }

        let partial = std::mem::take(self);
        Ok(Request {
            command: partial.command.unwrap_or_default(),
            arguments: partial.arguments,
            connection,
        })
    }
}

// *<count>\r\n
fn parse_header(src: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    // Only multibulk requests are accepted, inline commands are not supported.
    let marker = frame::peek_byte(src)?;
    if marker != b'*' {
        return Err(Error::UnsupportedFraming(marker));
    }

    let count = frame::read_decimal(src, b'*')?;
    match usize::try_from(count) {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(Error::MalformedHeader(format!(
            "argument count must include the command name, got {}",
            count
        ))),
    }
}

// Parses one bulk string, leaving the cursor where it was if the bulk isn't complete yet.
fn resume_bulk(src: &mut Cursor<&[u8]>, max_size: usize) -> Result<Bytes, Error> {
    let mark = src.position();
    parse_bulk(src, max_size).map_err(|err| {
        src.set_position(mark);
        err
    })
}

// $<length>\r\n<data>\r\n
fn parse_bulk(src: &mut Cursor<&[u8]>, max_size: usize) -> Result<Bytes, Error> {
    let length = frame::read_decimal(src, b'$')?;

    // `$-1` is a null bulk string, a command argument can't be null.
    let length = usize::try_from(length).map_err(|_| {
        Error::MalformedHeader(format!("bulk length must not be negative, got {}", length))
    })?;
    // The payload and its terminator have to fit in what is left of the size limit.
    let end = (src.position() as usize)
        .checked_add(length)
        .and_then(|end| end.checked_add(CRLF.len()));
    if end.map_or(true, |end| end > max_size) {
        return Err(Error::MalformedHeader(format!(
            "bulk length {} exceeds request size limit of {} bytes",
            length, max_size
        )));
    }

    let data = frame::read_payload(src, length)?;
    Ok(Bytes::copy_from_slice(data))
}

fn serialize_bulk(bytes: &mut Vec<u8>, data: &[u8]) {
    bytes.push(b'$');
    bytes.extend_from_slice(data.len().to_string().as_bytes());
    bytes.extend_from_slice(CRLF);
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(CRLF);
}

fn bulk_len(data: &[u8]) -> usize {
    1 + data.len().to_string().len() + CRLF.len() + data.len() + CRLF.len()
}
