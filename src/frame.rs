// https://redis.io/docs/reference/protocol-spec
//
// RESP v1 value model. One `Frame` is one top-level value on the wire.

use std::fmt;

use bytes::Bytes;

pub(crate) static CRLF: &[u8; 2] = b"\r\n";

static NULL_BULK: &[u8] = b"$-1\r\n";
static NULL_ARRAY: &[u8] = b"*-1\r\n";

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// `$-1\r\n`. Distinct from an empty bulk string.
    NullBulk,
    /// `*-1\r\n`. Distinct from an empty array.
    NullArray,
    Array(Vec<Frame>),
}

impl Frame {
    /// Bulk string from anything byte-like. Most request arguments go
    /// through here.
    pub fn bulk(bytes: impl AsRef<[u8]>) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(bytes.as_ref()))
    }

    /// The wire encoding as an ordered list of byte segments. Concatenated
    /// in order, the segments are the exact frame bytes; keeping them
    /// separate lets the writer copy payloads once and share the static
    /// tag/terminator segments.
    pub fn segments(&self) -> Vec<Bytes> {
        let mut segments = Vec::new();
        self.push_segments(&mut segments);
        segments
    }

    fn push_segments(&self, out: &mut Vec<Bytes>) {
        match self {
            Frame::Simple(s) => {
                out.push(Bytes::from_static(b"+"));
                out.push(Bytes::copy_from_slice(s.as_bytes()));
                out.push(Bytes::from_static(CRLF));
            }
            Frame::Error(s) => {
                out.push(Bytes::from_static(b"-"));
                out.push(Bytes::copy_from_slice(s.as_bytes()));
                out.push(Bytes::from_static(CRLF));
            }
            Frame::Integer(i) => {
                out.push(Bytes::from_static(b":"));
                out.push(Bytes::from(i.to_string()));
                out.push(Bytes::from_static(CRLF));
            }
            Frame::Bulk(bytes) => {
                out.push(Bytes::from_static(b"$"));
                out.push(Bytes::from(bytes.len().to_string()));
                out.push(Bytes::from_static(CRLF));
                out.push(bytes.clone());
                out.push(Bytes::from_static(CRLF));
            }
            Frame::NullBulk => out.push(Bytes::from_static(NULL_BULK)),
            Frame::NullArray => out.push(Bytes::from_static(NULL_ARRAY)),
            Frame::Array(items) => {
                out.push(Bytes::from_static(b"*"));
                out.push(Bytes::from(items.len().to_string()));
                out.push(Bytes::from_static(CRLF));
                for item in items {
                    item.push_segments(out);
                }
            }
        }
    }

    /// Total encoded size in bytes, without building the segments.
    pub fn encoded_len(&self) -> usize {
        fn decimal_len(mut n: u64) -> usize {
            let mut digits = 1;
            while n >= 10 {
                n /= 10;
                digits += 1;
            }
            digits
        }

        match self {
            Frame::Simple(s) | Frame::Error(s) => 1 + s.len() + CRLF.len(),
            Frame::Integer(i) => {
                let sign = usize::from(*i < 0);
                1 + sign + decimal_len(i.unsigned_abs()) + CRLF.len()
            }
            Frame::Bulk(bytes) => {
                1 + decimal_len(bytes.len() as u64) + CRLF.len() + bytes.len() + CRLF.len()
            }
            Frame::NullBulk => NULL_BULK.len(),
            Frame::NullArray => NULL_ARRAY.len(),
            Frame::Array(items) => {
                let header = 1 + decimal_len(items.len() as u64) + CRLF.len();
                items.iter().fold(header, |acc, f| acc + f.encoded_len())
            }
        }
    }

    /// The complete wire bytes. Convenience over `segments`; the transport
    /// itself encodes straight into its write buffer instead.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        for segment in self.segments() {
            bytes.extend_from_slice(&segment);
        }
        bytes
    }

    /// Variant name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::NullBulk => "null bulk string",
            Frame::NullArray => "null array",
            Frame::Array(_) => "array",
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::NullBulk => write!(f, "$-1"),
            Frame::NullArray => write!(f, "*-1"),
            Frame::Array(items) => {
                write!(f, "*{}", items.len())?;
                for item in items {
                    write!(f, " {}", item)?;
                }
                Ok(())
            }
        }
    }
}
