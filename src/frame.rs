// https://redis.io/docs/reference/protocol-spec

use bytes::Buf;
use std::io::{self, Cursor};
use thiserror::Error as ThisError;

pub(crate) static CRLF: &[u8; 2] = b"\r\n";

// Longest header line: a marker followed by any i64.
const MAX_LINE_LENGTH: usize = 21;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Not enough data is buffered to parse an entire frame. Never leaves the codec: it is the
    /// signal to read more bytes from the stream.
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("truncated input; the stream ended before a complete frame was read")]
    TruncatedInput(#[source] Option<io::Error>),
    #[error("protocol error; malformed framing, {0}")]
    MalformedFraming(String),
    #[error("protocol error; malformed header, {0}")]
    MalformedHeader(String),
    #[error("protocol error; unsupported framing, expected '*', got {:?}", as_char(.0))]
    UnsupportedFraming(u8),
    #[error("encode failure after {written} bytes written; {cause}")]
    EncodeFailure {
        written: u64,
        #[source]
        cause: EncodeFailure,
    },
}

#[derive(Debug, ThisError)]
pub enum EncodeFailure {
    /// RESP has `*-1\r\n` for this, but the reply encoder refuses to emit it.
    #[error("a nil multibulk reply cannot be encoded")]
    NilArray,
    #[error("status and error text must not contain CR or LF")]
    LineBreak,
    #[error("write to the output sink failed: {0}")]
    Io(#[from] io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::TruncatedInput(Some(err))
    }
}

/// Reads a CRLF terminated line and returns its content, without the terminator.
pub fn read_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let window = &buf[start..buf.len().min(start + MAX_LINE_LENGTH + CRLF.len())];
    let newline = match window.iter().position(|b| *b == b'\n') {
        Some(index) => start + index,
        None if window.len() > MAX_LINE_LENGTH + 1 => {
            return Err(Error::MalformedHeader(format!(
                "header line longer than {} bytes",
                MAX_LINE_LENGTH
            )))
        }
        None => return Err(Error::Incomplete),
    };

    if newline == start || buf[newline - 1] != b'\r' {
        return Err(Error::MalformedFraming(
            "line feed without a preceding carriage return".to_string(),
        ));
    }

    src.set_position((newline + 1) as u64);

    Ok(&buf[start..newline - 1])
}

/// Reads exactly `len` bytes followed by the mandatory CRLF terminator.
pub fn read_payload<'a>(src: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = start
        .checked_add(len)
        .ok_or_else(|| Error::MalformedHeader(format!("bulk length {} is too large", len)))?;

    if buf.len() < end + CRLF.len() {
        return Err(Error::Incomplete);
    }

    let terminator = &buf[end..end + CRLF.len()];
    if terminator != CRLF {
        return Err(Error::MalformedFraming(format!(
            "expected CRLF after a {} byte payload, got {:?}",
            len, terminator
        )));
    }

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

/// Reads a line that starts with `marker` and parses the rest of it as a decimal integer.
pub fn read_decimal(src: &mut Cursor<&[u8]>, marker: u8) -> Result<i64, Error> {
    let line = read_line(src)?;
    match line.split_first() {
        Some((first, rest)) if *first == marker => parse_decimal(rest),
        Some((first, _)) => Err(Error::MalformedHeader(format!(
            "expected '{}', got {:?}",
            char::from(marker),
            char::from(*first)
        ))),
        None => Err(Error::MalformedHeader("empty header line".to_string())),
    }
}

fn as_char(byte: &u8) -> char {
    char::from(*byte)
}

pub fn peek_byte(src: &Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn parse_decimal(digits: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::MalformedHeader(format!(
                "invalid decimal {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_line_strips_terminator() {
        let data = b"*2\r\n$3\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(read_line(&mut cursor).unwrap(), b"*2");
        assert_eq!(read_line(&mut cursor).unwrap(), b"$3");
        assert_eq!(cursor.position(), data.len() as u64);
    }

    #[test]
    fn read_line_incomplete() {
        let data = b"*2\r";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(read_line(&mut cursor), Err(Error::Incomplete)));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn read_line_without_carriage_return() {
        let data = b"*2\n";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            read_line(&mut cursor),
            Err(Error::MalformedFraming(_))
        ));
    }

    #[test]
    fn read_line_too_long() {
        let data = b"$123456789012345678901234567890";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            read_line(&mut cursor),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn read_line_longest_header() {
        let data = b"*-9223372036854775808\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(read_line(&mut cursor).unwrap(), b"*-9223372036854775808");
    }

    #[test]
    fn read_payload_is_binary_safe() {
        let data = b"a\r\nb\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(read_payload(&mut cursor, 4).unwrap(), b"a\r\nb");
        assert_eq!(cursor.position(), data.len() as u64);
    }

    #[test]
    fn read_payload_empty() {
        let data = b"\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(read_payload(&mut cursor, 0).unwrap(), b"");
    }

    #[test]
    fn read_payload_incomplete() {
        let data = b"hello\r";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            read_payload(&mut cursor, 5),
            Err(Error::Incomplete)
        ));
    }

    #[test]
    fn read_payload_wrong_terminator() {
        let data = b"helloXY";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            read_payload(&mut cursor, 5),
            Err(Error::MalformedFraming(_))
        ));
    }

    #[test]
    fn read_decimal_with_marker() {
        let data = b"$-1\r\n*+3\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(read_decimal(&mut cursor, b'$').unwrap(), -1);
        assert_eq!(read_decimal(&mut cursor, b'*').unwrap(), 3);
    }

    #[test]
    fn read_decimal_wrong_marker() {
        let data = b":3\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            read_decimal(&mut cursor, b'$'),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn read_decimal_not_a_number() {
        let data = b"$abc\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert!(matches!(
            read_decimal(&mut cursor, b'$'),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn unsupported_framing_names_the_byte() {
        let err = Error::UnsupportedFraming(b'G');

        assert_eq!(
            err.to_string(),
            "protocol error; unsupported framing, expected '*', got 'G'"
        );
    }
}
