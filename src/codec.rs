//! Streaming RESP codec.
//!
//! The decoder is assembled from the parsers in [`crate::parse`]: one
//! delimited line selects the frame variant, then the variant-specific
//! parser finishes the frame. It accepts partial input (`Ok(None)`) and
//! picks up where it left off on the next call, for an unbounded sequence
//! of frames.

use std::io::Cursor;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error as ThisError;
use tokio_util::codec::Decoder;

use crate::frame::{Frame, CRLF};
use crate::parse::{bind, delimited, fail, fixed, just, BoxDecode, Decode, DecodeError};
use crate::Error;

/// Cap on delimited header lines (type byte + decimal + text). Bulk
/// payloads are bounded only by their declared length.
pub const MAX_LINE_LEN: usize = 4096;

/// A frame whose encoding can never fit the write buffer. Such a frame
/// would sit at the head of the request queue forever, so the transport
/// fails the connection instead.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("encoded frame of {len} bytes exceeds write buffer capacity of {capacity} bytes")]
pub struct EncodeError {
    pub len: usize,
    pub capacity: usize,
}

/// Writes the full encoding of `frame` into `dst` iff it fits within
/// `capacity` total buffered bytes, returning the byte count. Returns 0
/// leaving `dst` untouched otherwise. All-or-nothing: a partially written
/// frame would desynchronize the server's parser.
pub fn encode_atomic(frame: &Frame, dst: &mut BytesMut, capacity: usize) -> usize {
    let len = frame.encoded_len();
    if dst.len() + len > capacity {
        return 0;
    }

    for segment in frame.segments() {
        dst.extend_from_slice(&segment);
    }
    len
}

pub struct RespCodec {
    decoder: BoxDecode<Frame>,
}

impl RespCodec {
    pub fn new() -> RespCodec {
        RespCodec {
            decoder: frame_decoder(),
        }
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RespCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let result = self.decoder.step(&mut cursor);

        // Bytes consumed by completed sub-parsers belong to the memoized
        // decoder state now, even when the frame as a whole is incomplete.
        let consumed = cursor.position() as usize;
        src.advance(consumed);

        match result {
            Ok(Some(frame)) => {
                self.decoder.reset();
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(err) => Err(Error::Decode(err)),
        }
    }
}

fn frame_decoder() -> BoxDecode<Frame> {
    Box::new(bind(delimited(CRLF, MAX_LINE_LEN), |line: Bytes| {
        dispatch(&line)
    }))
}

fn dispatch(line: &[u8]) -> BoxDecode<Frame> {
    let Some((&type_byte, rest)) = line.split_first() else {
        // An empty header line means the frame opened with the CR itself.
        return Box::new(fail(DecodeError::BadTypeByte(b'\r')));
    };

    match type_byte {
        b'+' => Box::new(just(Frame::Simple(text(rest)))),
        b'-' => Box::new(just(Frame::Error(text(rest)))),
        b':' => match parse_decimal(rest) {
            Ok(n) => Box::new(just(Frame::Integer(n))),
            Err(err) => Box::new(fail(err)),
        },
        b'$' => match parse_decimal(rest) {
            Ok(n) if n < 0 => Box::new(just(Frame::NullBulk)),
            Ok(n) => bulk_decoder(n as usize),
            Err(err) => Box::new(fail(err)),
        },
        b'*' => match parse_decimal(rest) {
            Ok(n) if n < 0 => Box::new(just(Frame::NullArray)),
            Ok(n) => Box::new(ArraySeq::new(n as usize)),
            Err(err) => Box::new(fail(err)),
        },
        other => Box::new(fail(DecodeError::BadTypeByte(other))),
    }
}

fn bulk_decoder(len: usize) -> BoxDecode<Frame> {
    Box::new(bind(fixed(len + CRLF.len()), move |bytes: Bytes| {
        if &bytes[len..] != CRLF {
            Box::new(fail(DecodeError::BadBulkTerminator)) as BoxDecode<Frame>
        } else {
            Box::new(just(Frame::Bulk(bytes.slice(..len))))
        }
    }))
}

/// Sequences `len` child frames into an array, index by index. Each child
/// is a full frame parser, so nesting recurses naturally.
struct ArraySeq {
    len: usize,
    items: Vec<Frame>,
    child: BoxDecode<Frame>,
}

impl ArraySeq {
    fn new(len: usize) -> ArraySeq {
        ArraySeq {
            len,
            items: Vec::with_capacity(len.min(64)),
            child: frame_decoder(),
        }
    }
}

impl Decode for ArraySeq {
    type Output = Frame;

    fn step(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<Frame>, DecodeError> {
        while self.items.len() < self.len {
            match self.child.step(src)? {
                Some(item) => {
                    self.items.push(item);
                    self.child.reset();
                }
                None => return Ok(None),
            }
        }

        Ok(Some(Frame::Array(std::mem::take(&mut self.items))))
    }

    fn reset(&mut self) {
        self.items.clear();
        self.child.reset();
    }
}

/// Base 10, optional leading sign, nothing else.
fn parse_decimal(digits: &[u8]) -> Result<i64, DecodeError> {
    let digits = std::str::from_utf8(digits).map_err(|_| DecodeError::BadNumber)?;
    if digits.is_empty() {
        return Err(DecodeError::BadNumber);
    }
    digits.parse::<i64>().map_err(|_| DecodeError::BadNumber)
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(codec: &mut RespCodec, bytes: &[u8]) -> crate::Result<Option<Frame>> {
        let mut buf = BytesMut::from(bytes);
        codec.decode(&mut buf)
    }

    fn decode_full(bytes: &[u8]) -> Frame {
        let mut codec = RespCodec::new();
        decode_one(&mut codec, bytes).unwrap().unwrap()
    }

    fn decode_err(bytes: &[u8]) -> DecodeError {
        let mut codec = RespCodec::new();
        match decode_one(&mut codec, bytes) {
            Err(Error::Decode(err)) => err,
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn decode_simple_string() {
        assert_eq!(decode_full(b"+TEST\r\n"), Frame::Simple("TEST".to_string()));
    }

    #[test]
    fn decode_error_frame() {
        assert_eq!(
            decode_full(b"-Error message\r\n"),
            Frame::Error("Error message".to_string())
        );
    }

    #[test]
    fn decode_integers() {
        assert_eq!(decode_full(b":1000\r\n"), Frame::Integer(1000));
        assert_eq!(decode_full(b":-1000\r\n"), Frame::Integer(-1000));
        assert_eq!(decode_full(b":+42\r\n"), Frame::Integer(42));
        assert_eq!(decode_full(b":0\r\n"), Frame::Integer(0));
    }

    #[test]
    fn decode_bulk_string() {
        assert_eq!(decode_full(b"$4\r\nTEST\r\n"), Frame::bulk("TEST"));
    }

    #[test]
    fn decode_bulk_string_empty() {
        assert_eq!(decode_full(b"$0\r\n\r\n"), Frame::Bulk(Bytes::new()));
    }

    #[test]
    fn decode_bulk_string_with_internal_crlf() {
        assert_eq!(decode_full(b"$8\r\none\r\ntwo\r\n"), Frame::bulk("one\r\ntwo"));
    }

    #[test]
    fn decode_null_bulk_and_null_array() {
        assert_eq!(decode_full(b"$-1\r\n"), Frame::NullBulk);
        assert_eq!(decode_full(b"*-1\r\n"), Frame::NullArray);
    }

    #[test]
    fn decode_empty_array() {
        assert_eq!(decode_full(b"*0\r\n"), Frame::Array(vec![]));
    }

    #[test]
    fn decode_mixed_array() {
        let frame = decode_full(b"*6\r\n+TEST\r\n-Error\r\n:1000\r\n$4\r\nTEST\r\n$-1\r\n*-1\r\n");
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Simple("TEST".to_string()),
                Frame::Error("Error".to_string()),
                Frame::Integer(1000),
                Frame::bulk("TEST"),
                Frame::NullBulk,
                Frame::NullArray,
            ])
        );
    }

    #[test]
    fn decode_nested_arrays() {
        let frame = decode_full(b"*2\r\n*2\r\n*1\r\n:1\r\n:2\r\n+deep\r\n");
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Array(vec![
                    Frame::Array(vec![Frame::Integer(1)]),
                    Frame::Integer(2),
                ]),
                Frame::Simple("deep".to_string()),
            ])
        );
    }

    #[test]
    fn decode_incomplete_returns_none_and_resumes() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nSE"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        // The array header and bulk header are consumed into parser state.
        buf.extend_from_slice(b"T\r\n+OK\r\n");
        let frame = codec.decode(&mut buf).unwrap();
        assert_eq!(
            frame,
            Some(Frame::Array(vec![
                Frame::bulk("SET"),
                Frame::Simple("OK".to_string()),
            ]))
        );
    }

    #[test]
    fn decode_two_frames_back_to_back() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"+one\r\n+two\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Simple("one".to_string()))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Simple("two".to_string()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_rejects_unknown_type_byte() {
        assert_eq!(decode_err(b"=3\r\nfoo\r\n"), DecodeError::BadTypeByte(b'='));
    }

    #[test]
    fn decode_rejects_empty_integer() {
        assert_eq!(decode_err(b":\r\n"), DecodeError::BadNumber);
    }

    #[test]
    fn decode_rejects_non_numeric_integer() {
        assert_eq!(decode_err(b":bad\r\n"), DecodeError::BadNumber);
    }

    #[test]
    fn decode_rejects_whitespace_in_integer() {
        assert_eq!(decode_err(b": 12\r\n"), DecodeError::BadNumber);
    }

    #[test]
    fn decode_rejects_bad_bulk_length() {
        assert_eq!(decode_err(b"$bad\r\nxx\r\n"), DecodeError::BadNumber);
    }

    #[test]
    fn decode_rejects_bad_array_length() {
        assert_eq!(decode_err(b"*bad\r\n"), DecodeError::BadNumber);
    }

    #[test]
    fn decode_rejects_short_bulk_declaration() {
        // Declared 3 bytes but the payload runs on: terminator lands inside.
        assert_eq!(decode_err(b"$3\r\nTEST\r\n"), DecodeError::BadBulkTerminator);
    }

    #[test]
    fn decode_rejects_oversized_line() {
        let mut bytes = vec![b'+'];
        bytes.extend(std::iter::repeat(b'a').take(MAX_LINE_LEN + 16));
        bytes.extend_from_slice(b"\r\n");
        assert_eq!(
            decode_err(&bytes),
            DecodeError::MessageTooLong(MAX_LINE_LEN)
        );
    }

    #[test]
    fn encode_atomic_writes_when_it_fits() {
        let frame = Frame::Array(vec![Frame::bulk("PING")]);
        let mut dst = BytesMut::with_capacity(64);

        let written = encode_atomic(&frame, &mut dst, 64);
        assert_eq!(written, frame.encoded_len());
        assert_eq!(&dst[..], b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn encode_atomic_rejects_without_touching_buffer() {
        let frame = Frame::bulk("a value that will not fit");
        let mut dst = BytesMut::with_capacity(64);
        dst.extend_from_slice(b"existing");

        let written = encode_atomic(&frame, &mut dst, 16);
        assert_eq!(written, 0);
        assert_eq!(&dst[..], b"existing");
    }

    #[test]
    fn encode_atomic_fills_to_exact_capacity() {
        let frame = Frame::Simple("OK".to_string());
        let len = frame.encoded_len();
        let mut dst = BytesMut::new();

        assert_eq!(encode_atomic(&frame, &mut dst, len), len);
        assert_eq!(encode_atomic(&frame, &mut dst, len), 0);
    }

    #[test]
    fn decode_round_trips_encoded_frames() {
        let frames = [
            Frame::Simple("TEST".to_string()),
            Frame::Error("Error".to_string()),
            Frame::Integer(-77),
            Frame::bulk("payload"),
            Frame::Bulk(Bytes::from_static(b"\x00\xff\x01binary")),
            Frame::NullBulk,
            Frame::NullArray,
            Frame::Array(vec![]),
            Frame::Array(vec![
                Frame::bulk("LPUSH"),
                Frame::Array(vec![Frame::Integer(1), Frame::NullBulk]),
            ]),
        ];

        let mut codec = RespCodec::new();
        for frame in frames {
            let mut buf = BytesMut::from(&frame.serialize()[..]);
            assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame));
            assert!(buf.is_empty());
        }
    }
}
