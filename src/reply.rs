use bytes::Bytes;
use std::io;
use strum_macros::AsRefStr;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::frame::{EncodeFailure, Error, CRLF};

static NULL_BULK: &[u8] = b"$-1\r\n";

/// A reply to a single request, as produced by a dispatcher.
///
/// Ref: <https://redis.io/docs/reference/protocol-spec/#resp-protocol-description>
#[derive(Clone, Debug, PartialEq, AsRefStr)]
pub enum Reply {
    /// `-ERROR <message>\r\n`. The message must be a single line, a CR or LF in it fails the
    /// encode.
    Error(String),
    /// `:<value>\r\n`
    Integer(i64),
    /// `+<code>\r\n`, single line like [`Reply::Error`].
    Status(String),
    /// `$<len>\r\n<value>\r\n`, or `$-1\r\n` when absent or empty.
    Bulk(Option<Bytes>),
    /// `*<count>\r\n` followed by one bulk per value. `None` is the nil array, which is distinct
    /// from an empty array and fails to encode.
    MultiBulk(Option<Vec<Option<Bytes>>>),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Status("OK".to_string())
    }

    pub fn error(message: impl Into<String>) -> Reply {
        Reply::Error(message.into())
    }

    pub fn bulk(value: impl Into<Bytes>) -> Reply {
        Reply::Bulk(Some(value.into()))
    }

    pub fn null() -> Reply {
        Reply::Bulk(None)
    }

    pub fn unknown_command(command: &str) -> Reply {
        // The name comes from the client and may hold any byte, keep the reply on one line.
        let command = command.replace(['\r', '\n'], " ");
        Reply::Error(format!("unknown command '{}'", command))
    }

    pub fn wrong_arity(command: &str) -> Reply {
        Reply::Error(format!(
            "wrong number of arguments for '{}' command",
            command.to_lowercase()
        ))
    }

    /// Writes the reply to `writer` and flushes it, returning the number of bytes written.
    ///
    /// Multibulk elements are written one after the other. If a write fails, the remaining
    /// elements are skipped and the returned error carries the number of bytes the writer had
    /// already accepted.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0;

        match self.write_parts(writer, &mut written).await {
            Ok(()) => Ok(written),
            Err(cause) => Err(Error::EncodeFailure { written, cause }),
        }
    }

    async fn write_parts<W>(&self, writer: &mut W, written: &mut u64) -> Result<(), EncodeFailure>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            Reply::Error(message) => {
                let bytes = line(b"-ERROR ", single_line(message)?);
                write_counted(writer, &bytes, written).await?;
            }
            Reply::Integer(value) => {
                let bytes = line(b":", value.to_string().as_bytes());
                write_counted(writer, &bytes, written).await?;
            }
            Reply::Status(code) => {
                let bytes = line(b"+", single_line(code)?);
                write_counted(writer, &bytes, written).await?;
            }
            Reply::Bulk(value) => {
                write_counted(writer, &bulk(value.as_deref()), written).await?;
            }
            Reply::MultiBulk(None) => return Err(EncodeFailure::NilArray),
            Reply::MultiBulk(Some(values)) => {
                let header = line(b"*", values.len().to_string().as_bytes());
                write_counted(writer, &header, written).await?;

                for value in values {
                    write_counted(writer, &bulk(value.as_deref()), written).await?;
                }
            }
        }

        writer.flush().await?;
        Ok(())
    }
}

impl From<Vec<Option<Bytes>>> for Reply {
    fn from(values: Vec<Option<Bytes>>) -> Self {
        Reply::MultiBulk(Some(values))
    }
}

// Status and error text ends at the first CRLF on the wire, so it can't contain one.
fn single_line(text: &str) -> Result<&[u8], EncodeFailure> {
    if text.contains(['\r', '\n']) {
        return Err(EncodeFailure::LineBreak);
    }
    Ok(text.as_bytes())
}

fn line(prefix: &[u8], content: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(prefix.len() + content.len() + CRLF.len());
    bytes.extend_from_slice(prefix);
    bytes.extend_from_slice(content);
    bytes.extend_from_slice(CRLF);
    bytes
}

// An empty bulk string goes out as null, same as an absent one.
fn bulk(value: Option<&[u8]>) -> Vec<u8> {
    match value {
        None => NULL_BULK.to_vec(),
        Some(data) if data.is_empty() => NULL_BULK.to_vec(),
        Some(data) => {
            let mut bytes = line(b"$", data.len().to_string().as_bytes());
            bytes.reserve(data.len() + CRLF.len());
            bytes.extend_from_slice(data);
            bytes.extend_from_slice(CRLF);
            bytes
        }
    }
}

/// Like `write_all`, but keeps `written` accurate even when the writer fails halfway through.
async fn write_counted<W>(writer: &mut W, mut buf: &[u8], written: &mut u64) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while !buf.is_empty() {
        let n = writer.write(buf).await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        *written += n as u64;
        buf = &buf[n..];
    }
    Ok(())
}
