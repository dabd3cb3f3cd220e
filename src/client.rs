//! Pipelined transport over a single TCP connection.
//!
//! Every submitted request is queued immediately and flushed in batches by
//! one writer task; one reader task decodes responses and completes the
//! outstanding handles in FIFO order, which is the order the server
//! guarantees. Neither task exists while the connection is idle: the
//! `writing`/`reading` flags under the submission mutex gate respawning
//! them, so at most one of each is ever live.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{oneshot, Notify};
use tokio_util::codec::Decoder;
use tracing::{debug, error};

use crate::codec::{encode_atomic, EncodeError, RespCodec};
use crate::frame::Frame;
use crate::{Error, Result};

pub const DEFAULT_PORT: u16 = 6379;

const READ_BUFFER_SIZE: usize = 1024 * 1024;
const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Completion handle for one submitted request. Resolves exactly once with
/// the response frame or the failure that tore the connection down.
/// Dropping it abandons the response without affecting the pipeline.
pub struct Response {
    rx: oneshot::Receiver<Result<Frame>>,
}

impl Future for Response {
    type Output = Result<Frame>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        })
    }
}

/// A pipelined RESP client. Cheap to clone; all clones share one
/// connection, and any number of them may submit concurrently.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Connects to the server and returns a ready client. The transport is
    /// single-use: after [`disconnect`](Client::disconnect) or any fatal
    /// failure it stays closed.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Client> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;
        let peer = socket.peer_addr()?;
        let (read_half, write_half) = socket.into_split();

        debug!("connected to {}", peer);

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                connected: true,
                writing: false,
                reading: false,
                request_queue: VecDeque::new(),
                response_queue: VecDeque::new(),
                writer_io: Some(WriterIo {
                    socket: write_half,
                    buf: BytesMut::with_capacity(WRITE_BUFFER_SIZE),
                }),
                reader_io: Some(ReaderIo {
                    socket: read_half,
                    buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
                    codec: RespCodec::new(),
                }),
            }),
            shutdown: Notify::new(),
        });

        Ok(Client { shared })
    }

    /// Enqueues `request` and returns its completion handle. Never blocks:
    /// the frame is picked up by the writer task, batched with whatever
    /// else is queued, and its response is matched back by arrival order.
    /// After disconnect or failure the handle resolves immediately with
    /// [`Error::NotConnected`].
    pub fn submit(&self, request: Frame) -> Response {
        let (tx, rx) = oneshot::channel();
        let mut state = self.shared.state.lock().unwrap();

        if !state.connected {
            let _ = tx.send(Err(Error::NotConnected));
            return Response { rx };
        }

        // Handle first, then request: the response queue depth never
        // trails the request queue depth.
        state.response_queue.push_back(tx);
        state.request_queue.push_back(request);

        if !state.writing {
            state.writing = true;
            tokio::spawn(write_loop(self.shared.clone()));
        }

        Response { rx }
    }

    /// Number of requests submitted and not yet completed.
    pub fn active_requests(&self) -> usize {
        self.shared.state.lock().unwrap().response_queue.len()
    }

    /// Closes the connection. Every outstanding handle resolves with
    /// [`Error::NotConnected`]; queued but unsent requests are discarded.
    pub fn disconnect(&self) {
        debug!("disconnect requested");
        self.shared.fail(Error::NotConnected);
    }
}

struct WriterIo {
    socket: OwnedWriteHalf,
    buf: BytesMut,
}

struct ReaderIo {
    socket: OwnedReadHalf,
    buf: BytesMut,
    codec: RespCodec,
}

struct State {
    connected: bool,
    writing: bool,
    reading: bool,
    request_queue: VecDeque<Frame>,
    response_queue: VecDeque<oneshot::Sender<Result<Frame>>>,
    /// Writer socket half and buffer, parked here while no writer task runs.
    writer_io: Option<WriterIo>,
    /// Reader socket half, buffer and decoder, parked likewise.
    reader_io: Option<ReaderIo>,
}

struct Shared {
    state: Mutex<State>,
    shutdown: Notify,
}

impl Shared {
    /// Terminal teardown, idempotent. Completes every outstanding handle
    /// with `cause`, discards unsent requests and wakes any task parked on
    /// socket I/O so it can observe the closed state.
    fn fail(&self, cause: Error) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.request_queue.clear();

            let outstanding = state.response_queue.len();
            while let Some(tx) = state.response_queue.pop_front() {
                let _ = tx.send(Err(cause.clone()));
            }
            if outstanding > 0 {
                debug!("completed {} outstanding requests with: {}", outstanding, cause);
            }

            // Parked socket halves close here; live tasks drop theirs on
            // the way out.
            state.writer_io = None;
            state.reader_io = None;
        }

        self.shutdown.notify_waiters();
    }
}

async fn write_loop(shared: Arc<Shared>) {
    let mut io = match shared.state.lock().unwrap().writer_io.take() {
        Some(io) => io,
        // Torn down before this task got scheduled.
        None => return,
    };

    // Requests swapped out of the shared queue but not yet encoded. The
    // front of this queue is the logical head of the request queue.
    let mut pending: VecDeque<Frame> = VecDeque::new();

    loop {
        let shutdown = shared.shutdown.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();

        {
            let mut state = shared.state.lock().unwrap();
            if !state.connected {
                return;
            }
            if pending.is_empty() {
                std::mem::swap(&mut pending, &mut state.request_queue);
            }
            if pending.is_empty() && io.buf.is_empty() {
                state.writer_io = Some(io);
                state.writing = false;
                return;
            }
            // The reader must be live before these bytes hit the wire, or
            // a fast response could arrive with nobody listening.
            if !state.reading && !state.response_queue.is_empty() {
                state.reading = true;
                tokio::spawn(read_loop(shared.clone()));
            }
        }

        // Batch whole frames into the buffer; a frame that does not fit
        // stays at the head for the next round.
        while let Some(request) = pending.front() {
            if encode_atomic(request, &mut io.buf, WRITE_BUFFER_SIZE) == 0 {
                if io.buf.is_empty() {
                    let err = EncodeError {
                        len: request.encoded_len(),
                        capacity: WRITE_BUFFER_SIZE,
                    };
                    error!("{}", err);
                    shared.fail(Error::Encode(err));
                    return;
                }
                break;
            }
            pending.pop_front();
        }

        let written = tokio::select! {
            result = io.socket.write(&io.buf) => result,
            _ = &mut shutdown => return,
        };

        match written {
            Ok(0) => {
                shared.fail(Error::NotConnected);
                return;
            }
            Ok(n) => io.buf.advance(n),
            Err(err) => {
                error!("socket write failed: {}", err);
                shared.fail(err.into());
                return;
            }
        }
    }
}

async fn read_loop(shared: Arc<Shared>) {
    let mut io = match shared.state.lock().unwrap().reader_io.take() {
        Some(io) => io,
        None => return,
    };

    loop {
        let shutdown = shared.shutdown.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();

        {
            let mut state = shared.state.lock().unwrap();
            if !state.connected {
                return;
            }
            if state.response_queue.is_empty() {
                state.reader_io = Some(io);
                state.reading = false;
                return;
            }
        }

        let read = tokio::select! {
            result = io.socket.read_buf(&mut io.buf) => result,
            _ = &mut shutdown => return,
        };

        match read {
            // Clean EOF: the server went away.
            Ok(0) => {
                shared.fail(Error::NotConnected);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                error!("socket read failed: {}", err);
                shared.fail(err.into());
                return;
            }
        }

        // Complete one handle per decoded frame, in arrival order.
        loop {
            let frame = match io.codec.decode(&mut io.buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    error!("response decode failed: {}", err);
                    shared.fail(err);
                    return;
                }
            };

            let sender = shared.state.lock().unwrap().response_queue.pop_front();
            match sender {
                Some(tx) => {
                    // A dropped receiver means the caller lost interest;
                    // the pipeline position was consumed either way.
                    let _ = tx.send(Ok(frame));
                }
                None => {
                    shared.fail(Error::StrayResponse);
                    return;
                }
            }
        }
    }
}
