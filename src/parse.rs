//! Restartable parsers over a byte cursor.
//!
//! A parser either consumes bytes and yields a value, yields `None` (more
//! input needed), or fails. A primitive parser rewinds the cursor to its
//! entry position on `None`; a composite keeps the bytes its completed
//! stages consumed and memoizes those stages, so a frame split across
//! arbitrarily many socket reads decodes without re-scanning.

use std::io::Cursor;
use std::marker::PhantomData;

use bytes::Bytes;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line exceeds {0} bytes without a terminator")]
    MessageTooLong(usize),
    #[error("invalid frame type byte {0:#04x}")]
    BadTypeByte(u8),
    #[error("invalid decimal number in frame header")]
    BadNumber,
    #[error("bulk payload not terminated by CRLF")]
    BadBulkTerminator,
}

pub trait Decode {
    type Output;

    /// Attempt to produce a value. `Ok(None)` means the input ran out; the
    /// cursor sits after the last fully consumed stage, and the unfinished
    /// stage's bytes are still in the buffer.
    fn step(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<Self::Output>, DecodeError>;

    /// Discard internal progress so the parser can be reused for the next
    /// frame.
    fn reset(&mut self);
}

pub type BoxDecode<T> = Box<dyn Decode<Output = T> + Send>;

impl<T> Decode for BoxDecode<T> {
    type Output = T;

    fn step(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<T>, DecodeError> {
        (**self).step(src)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Scans for `delimiter` and yields the bytes before it, consuming through
/// it. Fails with [`DecodeError::MessageTooLong`] once `max_len` bytes have
/// been scanned without a complete match.
pub fn delimited(delimiter: &'static [u8], max_len: usize) -> Delimited {
    Delimited { delimiter, max_len }
}

/// Yields the next `len` bytes once they are available.
pub fn fixed(len: usize) -> Fixed {
    Fixed { len }
}

/// Yields `value` without consuming input.
pub fn just<T: Clone>(value: T) -> Just<T> {
    Just { value }
}

/// Fails with `err`.
pub fn fail<T>(err: DecodeError) -> Fail<T> {
    Fail {
        err,
        _output: PhantomData,
    }
}

/// Runs `first`; feeds its value to `make` to obtain the parser that
/// finishes the job. The second parser is memoized, so an incomplete second
/// step never re-runs `first`.
pub fn bind<T, V, P, F>(first: P, make: F) -> Bind<T, V>
where
    P: Decode<Output = T> + Send + 'static,
    F: FnMut(T) -> BoxDecode<V> + Send + 'static,
{
    Bind {
        first: Box::new(first),
        make: Box::new(make),
        second: None,
    }
}

/// `bind` with a plain value transform.
pub fn map<T, V, P, F>(parser: P, mut transform: F) -> Bind<T, V>
where
    P: Decode<Output = T> + Send + 'static,
    F: FnMut(T) -> V + Send + 'static,
    V: Clone + Send + 'static,
{
    bind(parser, move |value| {
        Box::new(just(transform(value))) as BoxDecode<V>
    })
}

pub struct Delimited {
    delimiter: &'static [u8],
    max_len: usize,
}

impl Decode for Delimited {
    type Output = Bytes;

    fn step(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<Bytes>, DecodeError> {
        let entry = src.position() as usize;
        let haystack = &src.get_ref()[entry..];

        let mut matched = 0;
        let mut consumed = None;
        for (i, &byte) in haystack.iter().enumerate() {
            if i >= self.max_len {
                return Err(DecodeError::MessageTooLong(self.max_len));
            }
            if byte == self.delimiter[matched] {
                matched += 1;
                if matched == self.delimiter.len() {
                    consumed = Some(i + 1);
                    break;
                }
            } else {
                // A failed partial match restarts at the mismatched byte
                // itself, so b"\r\r\n" still matches CRLF at offset 1.
                matched = usize::from(byte == self.delimiter[0]);
            }
        }

        match consumed {
            Some(consumed) => {
                let line_end = entry + consumed - self.delimiter.len();
                let line = Bytes::copy_from_slice(&src.get_ref()[entry..line_end]);
                src.set_position((entry + consumed) as u64);
                Ok(Some(line))
            }
            None if haystack.len() >= self.max_len => {
                Err(DecodeError::MessageTooLong(self.max_len))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {}
}

pub struct Fixed {
    len: usize,
}

impl Decode for Fixed {
    type Output = Bytes;

    fn step(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<Bytes>, DecodeError> {
        let entry = src.position() as usize;
        if src.get_ref().len() - entry < self.len {
            return Ok(None);
        }

        let bytes = Bytes::copy_from_slice(&src.get_ref()[entry..entry + self.len]);
        src.set_position((entry + self.len) as u64);
        Ok(Some(bytes))
    }

    fn reset(&mut self) {}
}

pub struct Just<T: Clone> {
    value: T,
}

impl<T: Clone> Decode for Just<T> {
    type Output = T;

    fn step(&mut self, _src: &mut Cursor<&[u8]>) -> Result<Option<T>, DecodeError> {
        Ok(Some(self.value.clone()))
    }

    fn reset(&mut self) {}
}

pub struct Fail<T> {
    err: DecodeError,
    _output: PhantomData<fn() -> T>,
}

impl<T> Decode for Fail<T> {
    type Output = T;

    fn step(&mut self, _src: &mut Cursor<&[u8]>) -> Result<Option<T>, DecodeError> {
        Err(self.err.clone())
    }

    fn reset(&mut self) {}
}

pub struct Bind<T, V> {
    first: BoxDecode<T>,
    make: Box<dyn FnMut(T) -> BoxDecode<V> + Send>,
    second: Option<BoxDecode<V>>,
}

impl<T, V> Decode for Bind<T, V> {
    type Output = V;

    fn step(&mut self, src: &mut Cursor<&[u8]>) -> Result<Option<V>, DecodeError> {
        let second = match &mut self.second {
            Some(second) => second,
            None => match self.first.step(src)? {
                Some(value) => self.second.insert((self.make)(value)),
                None => return Ok(None),
            },
        };

        second.step(src)
    }

    fn reset(&mut self) {
        self.second = None;
        self.first.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(bytes: &[u8]) -> Cursor<&[u8]> {
        Cursor::new(bytes)
    }

    #[test]
    fn delimited_yields_line_and_consumes_delimiter() {
        let mut parser = delimited(b"\r\n", 4096);
        let mut src = cursor(b"OK\r\nrest");

        let line = parser.step(&mut src).unwrap();
        assert_eq!(line, Some(Bytes::from_static(b"OK")));
        assert_eq!(src.position(), 4);
    }

    #[test]
    fn delimited_incomplete_rewinds_cursor() {
        let mut parser = delimited(b"\r\n", 4096);
        let mut src = cursor(b"no terminator");

        assert_eq!(parser.step(&mut src).unwrap(), None);
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn delimited_partial_delimiter_is_incomplete() {
        let mut parser = delimited(b"\r\n", 4096);
        let mut src = cursor(b"OK\r");

        assert_eq!(parser.step(&mut src).unwrap(), None);
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn delimited_rescans_from_mismatched_byte() {
        // The first CR is a false start; the match is CR at index 1.
        let mut parser = delimited(b"\r\n", 4096);
        let mut src = cursor(b"\r\r\n");

        let line = parser.step(&mut src).unwrap();
        assert_eq!(line, Some(Bytes::from_static(b"\r")));
        assert_eq!(src.position(), 3);
    }

    #[test]
    fn delimited_over_max_len_fails() {
        let mut parser = delimited(b"\r\n", 8);
        let mut src = cursor(b"123456789\r\n");

        assert_eq!(
            parser.step(&mut src),
            Err(DecodeError::MessageTooLong(8))
        );
    }

    #[test]
    fn delimited_exactly_max_len_without_match_fails() {
        let mut parser = delimited(b"\r\n", 8);
        let mut src = cursor(b"12345678");

        assert_eq!(
            parser.step(&mut src),
            Err(DecodeError::MessageTooLong(8))
        );
    }

    #[test]
    fn delimited_match_within_max_len_succeeds() {
        let mut parser = delimited(b"\r\n", 8);
        let mut src = cursor(b"123456\r\n");

        let line = parser.step(&mut src).unwrap();
        assert_eq!(line, Some(Bytes::from_static(b"123456")));
    }

    #[test]
    fn fixed_waits_for_all_bytes() {
        let mut parser = fixed(5);
        let mut src = cursor(b"abc");

        assert_eq!(parser.step(&mut src).unwrap(), None);
        assert_eq!(src.position(), 0);

        let mut src = cursor(b"abcdefg");
        assert_eq!(
            parser.step(&mut src).unwrap(),
            Some(Bytes::from_static(b"abcde"))
        );
        assert_eq!(src.position(), 5);
    }

    #[test]
    fn just_consumes_nothing() {
        let mut parser = just(42);
        let mut src = cursor(b"untouched");

        assert_eq!(parser.step(&mut src).unwrap(), Some(42));
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn fail_always_errors() {
        let mut parser = fail::<()>(DecodeError::BadNumber);
        let mut src = cursor(b"");

        assert_eq!(parser.step(&mut src), Err(DecodeError::BadNumber));
    }

    #[test]
    fn bind_sequences_two_parsers() {
        let mut parser = bind(delimited(b"\r\n", 64), |line: Bytes| {
            Box::new(map(fixed(3), move |body: Bytes| (line.clone(), body)))
                as BoxDecode<(Bytes, Bytes)>
        });

        let mut src = cursor(b"hdr\r\nxyz");
        let out = parser.step(&mut src).unwrap();
        assert_eq!(
            out,
            Some((Bytes::from_static(b"hdr"), Bytes::from_static(b"xyz")))
        );
        assert_eq!(src.position(), 8);
    }

    #[test]
    fn bind_memoizes_second_parser() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Count how many times the continuation is built: once, even though
        // the second parser needs two calls to complete.
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let mut parser = bind(delimited(b"\r\n", 64), move |_line: Bytes| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(fixed(3)) as BoxDecode<Bytes>
        });

        let mut src = cursor(b"hdr\r\nx");
        assert_eq!(parser.step(&mut src).unwrap(), None);
        // Header consumed, body incomplete.
        assert_eq!(src.position(), 5);

        let mut src = cursor(b"xyz");
        assert_eq!(
            parser.step(&mut src).unwrap(),
            Some(Bytes::from_static(b"xyz"))
        );
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bind_reset_clears_memo() {
        let mut parser = bind(delimited(b"\r\n", 64), |line: Bytes| {
            Box::new(just(line)) as BoxDecode<Bytes>
        });

        let mut src = cursor(b"one\r\n");
        assert_eq!(
            parser.step(&mut src).unwrap(),
            Some(Bytes::from_static(b"one"))
        );

        parser.reset();
        let mut src = cursor(b"two\r\n");
        assert_eq!(
            parser.step(&mut src).unwrap(),
            Some(Bytes::from_static(b"two"))
        );
    }

    #[test]
    fn map_transforms_output() {
        let mut parser = map(delimited(b"\r\n", 64), |line: Bytes| line.len());
        let mut src = cursor(b"four\r\n");

        assert_eq!(parser.step(&mut src).unwrap(), Some(4));
    }
}
