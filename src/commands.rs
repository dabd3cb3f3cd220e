//! Redis command surface.
//!
//! Every wrapper is the same three steps: build a request array of bulk
//! strings, submit it, coerce the response shape. Wrappers submit before
//! returning their future, so issuing several calls and awaiting them later
//! pipelines naturally:
//!
//! ```ignore
//! let a = client.set("k1", "v1");
//! let b = client.set("k2", "v2");
//! let (a, b) = tokio::join!(a, b);
//! ```
//!
//! Commands not covered here go through [`Client::submit`] with a
//! [`Command`]-built frame and one of the coercion helpers.

use std::future::Future;

use bytes::Bytes;

use crate::client::Client;
use crate::frame::Frame;
use crate::{Error, Result};

/// Request builder: a command name and its arguments, each a bulk string.
pub struct Command {
    parts: Vec<Frame>,
}

impl Command {
    pub fn new(name: &str) -> Command {
        Command {
            parts: vec![Frame::bulk(name)],
        }
    }

    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Command {
        self.parts.push(Frame::bulk(arg));
        self
    }

    pub fn build(self) -> Frame {
        Frame::Array(self.parts)
    }
}

// Response coercions. Each starts by surfacing a server-side error frame,
// then insists on the one shape the command is documented to return.

fn checked(frame: Frame) -> Result<Frame> {
    match frame {
        Frame::Error(message) => Err(Error::Server(message)),
        frame => Ok(frame),
    }
}

fn mismatch(expected: &'static str, actual: &Frame) -> Error {
    Error::InvalidResponse {
        expected,
        actual: actual.kind(),
    }
}

fn required<T>(value: Option<T>, expected: &'static str) -> Result<T> {
    value.ok_or(Error::InvalidResponse {
        expected,
        actual: "null bulk string",
    })
}

pub fn simple(frame: Frame) -> Result<String> {
    match checked(frame)? {
        Frame::Simple(s) => Ok(s),
        other => Err(mismatch("simple string", &other)),
    }
}

pub fn integer(frame: Frame) -> Result<i64> {
    match checked(frame)? {
        Frame::Integer(n) => Ok(n),
        other => Err(mismatch("integer", &other)),
    }
}

/// Integer reply read as a boolean: positive means yes.
pub fn flag(frame: Frame) -> Result<bool> {
    integer(frame).map(|n| n > 0)
}

pub fn bulk(frame: Frame) -> Result<Option<Bytes>> {
    match checked(frame)? {
        Frame::Bulk(bytes) => Ok(Some(bytes)),
        Frame::NullBulk => Ok(None),
        other => Err(mismatch("bulk string", &other)),
    }
}

pub fn bulk_text(frame: Frame) -> Result<Option<String>> {
    Ok(bulk(frame)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

pub fn bulk_float(frame: Frame) -> Result<Option<f64>> {
    match bulk_text(frame)? {
        Some(text) => text
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::InvalidResponse {
                expected: "decimal bulk string",
                actual: "bulk string",
            }),
        None => Ok(None),
    }
}

pub fn array<T>(frame: Frame, coerce: impl Fn(Frame) -> Result<T>) -> Result<Option<Vec<T>>> {
    match checked(frame)? {
        Frame::NullArray => Ok(None),
        Frame::Array(items) => items.into_iter().map(coerce).collect::<Result<_>>().map(Some),
        other => Err(mismatch("array", &other)),
    }
}

/// Flat array of alternating keys and values, as returned by `HGETALL`.
pub fn pairs(frame: Frame) -> Result<Vec<(String, Bytes)>> {
    match checked(frame)? {
        Frame::Array(items) => {
            let mut pairs = Vec::with_capacity(items.len() / 2);
            let mut items = items.into_iter();
            while let (Some(key), Some(value)) = (items.next(), items.next()) {
                let key = required(bulk_text(key)?, "bulk string")?;
                let value = required(bulk(value)?, "bulk string")?;
                pairs.push((key, value));
            }
            Ok(pairs)
        }
        other => Err(mismatch("array", &other)),
    }
}

/// `SCAN` reply: next cursor plus the page of keys.
pub fn scan_reply(frame: Frame) -> Result<(u64, Vec<String>)> {
    match checked(frame)? {
        Frame::Array(items) => {
            let [cursor, elements] =
                <[Frame; 2]>::try_from(items).map_err(|_| Error::InvalidResponse {
                    expected: "two-element array",
                    actual: "array",
                })?;
            let cursor = required(bulk_text(cursor)?, "bulk string")?
                .parse::<u64>()
                .map_err(|_| Error::InvalidResponse {
                    expected: "decimal cursor",
                    actual: "bulk string",
                })?;
            let keys = array(elements, |item| required(bulk_text(item)?, "bulk string"))?;
            Ok((cursor, keys.unwrap_or_default()))
        }
        other => Err(mismatch("array", &other)),
    }
}

/// Integer reply that may come back as a null bulk string instead, like
/// `ZRANK` for a missing member.
pub fn integer_or_null(frame: Frame) -> Result<Option<i64>> {
    match checked(frame)? {
        Frame::Integer(n) => Ok(Some(n)),
        Frame::NullBulk => Ok(None),
        other => Err(mismatch("integer", &other)),
    }
}

/// Flat array of alternating members and scores, as returned by the
/// `WITHSCORES` range variants.
pub fn score_pairs(frame: Frame) -> Result<Vec<(String, f64)>> {
    match checked(frame)? {
        Frame::Array(items) => {
            let mut pairs = Vec::with_capacity(items.len() / 2);
            let mut items = items.into_iter();
            while let (Some(member), Some(score)) = (items.next(), items.next()) {
                let member = required(bulk_text(member)?, "bulk string")?;
                let score = required(bulk_float(score)?, "decimal bulk string")?;
                pairs.push((member, score));
            }
            Ok(pairs)
        }
        other => Err(mismatch("array", &other)),
    }
}

/// Two-element key/value reply of the blocking pops; a null array means the
/// timeout elapsed.
pub fn key_value(frame: Frame) -> Result<Option<(String, Bytes)>> {
    match checked(frame)? {
        Frame::NullArray => Ok(None),
        Frame::Array(items) => {
            let [key, value] =
                <[Frame; 2]>::try_from(items).map_err(|_| Error::InvalidResponse {
                    expected: "two-element array",
                    actual: "array",
                })?;
            let key = required(bulk_text(key)?, "bulk string")?;
            let value = required(bulk(value)?, "bulk string")?;
            Ok(Some((key, value)))
        }
        other => Err(mismatch("array", &other)),
    }
}

impl Client {
    // Connection commands.

    pub fn auth(&self, password: &str) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("AUTH").arg(password).build());
        async move { simple(response.await?) }
    }

    pub fn echo(&self, message: impl AsRef<[u8]>) -> impl Future<Output = Result<Bytes>> {
        let response = self.submit(Command::new("ECHO").arg(message).build());
        async move { required(bulk(response.await?)?, "bulk string") }
    }

    pub fn ping(&self) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("PING").build());
        async move { simple(response.await?) }
    }

    /// Asks the server to close the connection after replying. The local
    /// side still tears down through the reader observing EOF.
    pub fn quit(&self) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("QUIT").build());
        async move { simple(response.await?) }
    }

    pub fn select(&self, index: u32) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("SELECT").arg(index.to_string()).build());
        async move { simple(response.await?) }
    }

    // String commands.

    pub fn append(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("APPEND").arg(key).arg(value).build());
        async move { integer(response.await?) }
    }

    pub fn decr(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("DECR").arg(key).build());
        async move { integer(response.await?) }
    }

    pub fn decrby(&self, key: &str, delta: i64) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("DECRBY").arg(key).arg(delta.to_string()).build());
        async move { integer(response.await?) }
    }

    /// `None` when the key does not exist.
    pub fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>>> {
        let response = self.submit(Command::new("GET").arg(key).build());
        async move { bulk(response.await?) }
    }

    pub fn getrange(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> impl Future<Output = Result<Bytes>> {
        let response = self.submit(
            Command::new("GETRANGE")
                .arg(key)
                .arg(start.to_string())
                .arg(end.to_string())
                .build(),
        );
        async move { required(bulk(response.await?)?, "bulk string") }
    }

    pub fn getset(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<Option<Bytes>>> {
        let response = self.submit(Command::new("GETSET").arg(key).arg(value).build());
        async move { bulk(response.await?) }
    }

    pub fn incr(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("INCR").arg(key).build());
        async move { integer(response.await?) }
    }

    pub fn incrby(&self, key: &str, delta: i64) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("INCRBY").arg(key).arg(delta.to_string()).build());
        async move { integer(response.await?) }
    }

    pub fn incrbyfloat(&self, key: &str, delta: f64) -> impl Future<Output = Result<f64>> {
        let response =
            self.submit(Command::new("INCRBYFLOAT").arg(key).arg(delta.to_string()).build());
        async move { required(bulk_float(response.await?)?, "decimal bulk string") }
    }

    /// One slot per requested key, `None` where a key is missing.
    pub fn mget(&self, keys: &[&str]) -> impl Future<Output = Result<Vec<Option<Bytes>>>> {
        let mut command = Command::new("MGET");
        for key in keys {
            command = command.arg(key);
        }
        let response = self.submit(command.build());
        async move { required(array(response.await?, bulk)?, "array") }
    }

    pub fn mset(&self, pairs: &[(&str, &[u8])]) -> impl Future<Output = Result<String>> {
        let mut command = Command::new("MSET");
        for (key, value) in pairs {
            command = command.arg(key).arg(value);
        }
        let response = self.submit(command.build());
        async move { simple(response.await?) }
    }

    pub fn msetnx(&self, pairs: &[(&str, &[u8])]) -> impl Future<Output = Result<bool>> {
        let mut command = Command::new("MSETNX");
        for (key, value) in pairs {
            command = command.arg(key).arg(value);
        }
        let response = self.submit(command.build());
        async move { flag(response.await?) }
    }

    pub fn set(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("SET").arg(key).arg(value).build());
        async move { simple(response.await?) }
    }

    /// `SET` with a TTL in seconds.
    pub fn setex(
        &self,
        key: &str,
        seconds: u64,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<String>> {
        let response = self.submit(
            Command::new("SETEX")
                .arg(key)
                .arg(seconds.to_string())
                .arg(value)
                .build(),
        );
        async move { simple(response.await?) }
    }

    /// True when the key was set, false when it already existed.
    pub fn setnx(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("SETNX").arg(key).arg(value).build());
        async move { flag(response.await?) }
    }

    pub fn strlen(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("STRLEN").arg(key).build());
        async move { integer(response.await?) }
    }

    // Key commands.

    pub fn del(&self, keys: &[&str]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("DEL");
        for key in keys {
            command = command.arg(key);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    pub fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("EXISTS").arg(key).build());
        async move { flag(response.await?) }
    }

    pub fn expire(&self, key: &str, seconds: u64) -> impl Future<Output = Result<bool>> {
        let response =
            self.submit(Command::new("EXPIRE").arg(key).arg(seconds.to_string()).build());
        async move { flag(response.await?) }
    }

    pub fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> {
        let response = self.submit(Command::new("KEYS").arg(pattern).build());
        async move {
            let keys = array(response.await?, |item| {
                required(bulk_text(item)?, "bulk string")
            })?;
            Ok(keys.unwrap_or_default())
        }
    }

    pub fn persist(&self, key: &str) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("PERSIST").arg(key).build());
        async move { flag(response.await?) }
    }

    pub fn pexpire(&self, key: &str, millis: u64) -> impl Future<Output = Result<bool>> {
        let response =
            self.submit(Command::new("PEXPIRE").arg(key).arg(millis.to_string()).build());
        async move { flag(response.await?) }
    }

    /// Milliseconds to live; -1 without a timeout, -2 when the key is
    /// missing.
    pub fn pttl(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("PTTL").arg(key).build());
        async move { integer(response.await?) }
    }

    /// `None` when the database is empty.
    pub fn randomkey(&self) -> impl Future<Output = Result<Option<String>>> {
        let response = self.submit(Command::new("RANDOMKEY").build());
        async move { bulk_text(response.await?) }
    }

    pub fn rename(&self, key: &str, new_key: &str) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("RENAME").arg(key).arg(new_key).build());
        async move { simple(response.await?) }
    }

    /// True when the rename happened, false when `new_key` already existed.
    pub fn renamenx(&self, key: &str, new_key: &str) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("RENAMENX").arg(key).arg(new_key).build());
        async move { flag(response.await?) }
    }

    /// Seconds to live; -1 without a timeout, -2 when the key is missing.
    pub fn ttl(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("TTL").arg(key).build());
        async move { integer(response.await?) }
    }

    pub fn key_type(&self, key: &str) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("TYPE").arg(key).build());
        async move { simple(response.await?) }
    }

    // Hash commands.

    pub fn hdel(&self, key: &str, fields: &[&str]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("HDEL").arg(key);
        for field in fields {
            command = command.arg(field);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    pub fn hexists(&self, key: &str, field: &str) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("HEXISTS").arg(key).arg(field).build());
        async move { flag(response.await?) }
    }

    pub fn hget(&self, key: &str, field: &str) -> impl Future<Output = Result<Option<Bytes>>> {
        let response = self.submit(Command::new("HGET").arg(key).arg(field).build());
        async move { bulk(response.await?) }
    }

    pub fn hincrby(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> impl Future<Output = Result<i64>> {
        let response = self.submit(
            Command::new("HINCRBY")
                .arg(key)
                .arg(field)
                .arg(delta.to_string())
                .build(),
        );
        async move { integer(response.await?) }
    }

    /// One slot per requested field, `None` where a field is missing.
    pub fn hmget(
        &self,
        key: &str,
        fields: &[&str],
    ) -> impl Future<Output = Result<Vec<Option<Bytes>>>> {
        let mut command = Command::new("HMGET").arg(key);
        for field in fields {
            command = command.arg(field);
        }
        let response = self.submit(command.build());
        async move { required(array(response.await?, bulk)?, "array") }
    }

    pub fn hgetall(&self, key: &str) -> impl Future<Output = Result<Vec<(String, Bytes)>>> {
        let response = self.submit(Command::new("HGETALL").arg(key).build());
        async move { pairs(response.await?) }
    }

    pub fn hkeys(&self, key: &str) -> impl Future<Output = Result<Vec<String>>> {
        let response = self.submit(Command::new("HKEYS").arg(key).build());
        async move {
            let fields = array(response.await?, |item| {
                required(bulk_text(item)?, "bulk string")
            })?;
            Ok(fields.unwrap_or_default())
        }
    }

    pub fn hlen(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("HLEN").arg(key).build());
        async move { integer(response.await?) }
    }

    /// True when the field is new, false when it was overwritten.
    pub fn hset(
        &self,
        key: &str,
        field: &str,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("HSET").arg(key).arg(field).arg(value).build());
        async move { flag(response.await?) }
    }

    pub fn hvals(&self, key: &str) -> impl Future<Output = Result<Vec<Bytes>>> {
        let response = self.submit(Command::new("HVALS").arg(key).build());
        async move {
            let values = array(response.await?, |item| {
                required(bulk(item)?, "bulk string")
            })?;
            Ok(values.unwrap_or_default())
        }
    }

    // List commands.

    /// Blocks server-side up to `timeout_secs` (0 blocks indefinitely);
    /// `None` when the timeout elapsed. Blocking is per request, not per
    /// connection, so other pipelined requests queue behind it.
    pub fn blpop(
        &self,
        keys: &[&str],
        timeout_secs: u64,
    ) -> impl Future<Output = Result<Option<(String, Bytes)>>> {
        let mut command = Command::new("BLPOP");
        for key in keys {
            command = command.arg(key);
        }
        let response = self.submit(command.arg(timeout_secs.to_string()).build());
        async move { key_value(response.await?) }
    }

    /// Blocking tail pop, same contract as [`blpop`](Client::blpop).
    pub fn brpop(
        &self,
        keys: &[&str],
        timeout_secs: u64,
    ) -> impl Future<Output = Result<Option<(String, Bytes)>>> {
        let mut command = Command::new("BRPOP");
        for key in keys {
            command = command.arg(key);
        }
        let response = self.submit(command.arg(timeout_secs.to_string()).build());
        async move { key_value(response.await?) }
    }

    pub fn lindex(&self, key: &str, index: i64) -> impl Future<Output = Result<Option<Bytes>>> {
        let response =
            self.submit(Command::new("LINDEX").arg(key).arg(index.to_string()).build());
        async move { bulk(response.await?) }
    }

    pub fn llen(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("LLEN").arg(key).build());
        async move { integer(response.await?) }
    }

    pub fn lpop(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>>> {
        let response = self.submit(Command::new("LPOP").arg(key).build());
        async move { bulk(response.await?) }
    }

    pub fn lpush(&self, key: &str, values: &[&[u8]]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("LPUSH").arg(key);
        for value in values {
            command = command.arg(value);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    pub fn lrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<Vec<Bytes>>> {
        let response = self.submit(
            Command::new("LRANGE")
                .arg(key)
                .arg(start.to_string())
                .arg(stop.to_string())
                .build(),
        );
        async move {
            let items = array(response.await?, |item| {
                required(bulk(item)?, "bulk string")
            })?;
            Ok(items.unwrap_or_default())
        }
    }

    pub fn lset(
        &self,
        key: &str,
        index: i64,
        value: impl AsRef<[u8]>,
    ) -> impl Future<Output = Result<String>> {
        let response = self.submit(
            Command::new("LSET")
                .arg(key)
                .arg(index.to_string())
                .arg(value)
                .build(),
        );
        async move { simple(response.await?) }
    }

    pub fn ltrim(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<String>> {
        let response = self.submit(
            Command::new("LTRIM")
                .arg(key)
                .arg(start.to_string())
                .arg(stop.to_string())
                .build(),
        );
        async move { simple(response.await?) }
    }

    pub fn rpop(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>>> {
        let response = self.submit(Command::new("RPOP").arg(key).build());
        async move { bulk(response.await?) }
    }

    /// `None` when the source list is empty.
    pub fn rpoplpush(
        &self,
        source: &str,
        destination: &str,
    ) -> impl Future<Output = Result<Option<Bytes>>> {
        let response =
            self.submit(Command::new("RPOPLPUSH").arg(source).arg(destination).build());
        async move { bulk(response.await?) }
    }

    pub fn rpush(&self, key: &str, values: &[&[u8]]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("RPUSH").arg(key);
        for value in values {
            command = command.arg(value);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    // Set commands.

    pub fn sadd(&self, key: &str, members: &[&str]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("SADD").arg(key);
        for member in members {
            command = command.arg(member);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    pub fn scard(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("SCARD").arg(key).build());
        async move { integer(response.await?) }
    }

    pub fn sismember(&self, key: &str, member: &str) -> impl Future<Output = Result<bool>> {
        let response = self.submit(Command::new("SISMEMBER").arg(key).arg(member).build());
        async move { flag(response.await?) }
    }

    pub fn smembers(&self, key: &str) -> impl Future<Output = Result<Vec<String>>> {
        let response = self.submit(Command::new("SMEMBERS").arg(key).build());
        async move {
            let members = array(response.await?, |item| {
                required(bulk_text(item)?, "bulk string")
            })?;
            Ok(members.unwrap_or_default())
        }
    }

    /// `None` when the set is empty.
    pub fn spop(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>>> {
        let response = self.submit(Command::new("SPOP").arg(key).build());
        async move { bulk(response.await?) }
    }

    pub fn srem(&self, key: &str, members: &[&str]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("SREM").arg(key);
        for member in members {
            command = command.arg(member);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    // Sorted set commands.

    pub fn zadd(
        &self,
        key: &str,
        score: f64,
        member: &str,
    ) -> impl Future<Output = Result<i64>> {
        let response = self.submit(
            Command::new("ZADD")
                .arg(key)
                .arg(score.to_string())
                .arg(member)
                .build(),
        );
        async move { integer(response.await?) }
    }

    pub fn zcard(&self, key: &str) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("ZCARD").arg(key).build());
        async move { integer(response.await?) }
    }

    pub fn zincrby(
        &self,
        key: &str,
        delta: f64,
        member: &str,
    ) -> impl Future<Output = Result<f64>> {
        let response = self.submit(
            Command::new("ZINCRBY")
                .arg(key)
                .arg(delta.to_string())
                .arg(member)
                .build(),
        );
        async move { required(bulk_float(response.await?)?, "decimal bulk string") }
    }

    pub fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<Vec<String>>> {
        let response = self.submit(
            Command::new("ZRANGE")
                .arg(key)
                .arg(start.to_string())
                .arg(stop.to_string())
                .build(),
        );
        async move {
            let members = array(response.await?, |item| {
                required(bulk_text(item)?, "bulk string")
            })?;
            Ok(members.unwrap_or_default())
        }
    }

    pub fn zrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<Vec<(String, f64)>>> {
        let response = self.submit(
            Command::new("ZRANGE")
                .arg(key)
                .arg(start.to_string())
                .arg(stop.to_string())
                .arg("WITHSCORES")
                .build(),
        );
        async move { score_pairs(response.await?) }
    }

    /// `None` when the member is not in the set.
    pub fn zrank(&self, key: &str, member: &str) -> impl Future<Output = Result<Option<i64>>> {
        let response = self.submit(Command::new("ZRANK").arg(key).arg(member).build());
        async move { integer_or_null(response.await?) }
    }

    pub fn zrem(&self, key: &str, members: &[&str]) -> impl Future<Output = Result<i64>> {
        let mut command = Command::new("ZREM").arg(key);
        for member in members {
            command = command.arg(member);
        }
        let response = self.submit(command.build());
        async move { integer(response.await?) }
    }

    /// `None` when the member is not in the set.
    pub fn zscore(&self, key: &str, member: &str) -> impl Future<Output = Result<Option<f64>>> {
        let response = self.submit(Command::new("ZSCORE").arg(key).arg(member).build());
        async move { bulk_float(response.await?) }
    }

    /// One page of the keyspace. Iterate until the returned cursor is 0.
    pub fn scan(&self, cursor: u64) -> impl Future<Output = Result<(u64, Vec<String>)>> {
        let response = self.submit(Command::new("SCAN").arg(cursor.to_string()).build());
        async move { scan_reply(response.await?) }
    }

    // Server commands.

    pub fn dbsize(&self) -> impl Future<Output = Result<i64>> {
        let response = self.submit(Command::new("DBSIZE").build());
        async move { integer(response.await?) }
    }

    pub fn flushdb(&self) -> impl Future<Output = Result<String>> {
        let response = self.submit(Command::new("FLUSHDB").build());
        async move { simple(response.await?) }
    }
}
