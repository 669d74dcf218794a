use std::pin::pin;

use bytes::{Buf, Bytes, BytesMut};
use embedded_io_async::{ErrorType, Read, Write};
use futures_util::{
    FutureExt as _,
    future::{Either, select},
    lock::Mutex,
};
use rand::Rng as _;
use rand_core::RngCore;

use crate::{
    OpCode,
    error::{Error, HandshakeError},
    frame::{Frame, FrameBuf},
    handshake,
    http::{Header, Request, Response},
    options::{AcceptOptions, BufferOptions, ConnectOptions},
    pool::{self, Pooled, Scratch},
    signal::{CloseSignal, Side},
};

/// The side of the connection. Clients mask every frame they send, servers never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiated the handshake.
    Client,
    /// Accepted the handshake.
    Server,
}

#[derive(Debug)]
struct Reader<R> {
    inner: Option<R>,
    /// Bytes read but not yet decoded.
    buffer: BytesMut,
    /// Decoded bytes not yet handed to a stream reader.
    carry: Bytes,
    scratch: Scratch,
    max_payload_len: Option<usize>,
}

impl<R: Read> Reader<R> {
    /// Performs exactly one transport read and appends what it got.
    async fn fill(&mut self, signal: &CloseSignal) -> Result<(), Error<R::Error>> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(Error::Closed);
        };

        let mut scratch = self.scratch.checkout(0);

        let read = {
            let read = pin!(inner.read(&mut scratch[..]));
            let closed = pin!(signal.closed(Side::Read));

            match select(read, closed).await {
                Either::Left((read, _)) => read,
                Either::Right(_) => return Err(Error::Closed),
            }
        };

        match read.map_err(Error::from_io)? {
            0 => Err(Error::Closed),
            n => {
                self.buffer.extend_from_slice(&scratch[..n]);

                Ok(())
            }
        }
    }

    /// Reads until `parse` recognizes a complete HTTP head, then drops the head
    /// from the buffer. Anything after it stays buffered for the frame decoder.
    async fn read_head<T>(
        &mut self,
        signal: &CloseSignal,
        limit: usize,
        mut parse: impl FnMut(&[u8]) -> Result<Option<(T, usize)>, HandshakeError>,
    ) -> Result<T, Error<R::Error>> {
        loop {
            if let Some((value, len)) = parse(&self.buffer[..])? {
                self.buffer.advance(len);

                return Ok(value);
            }

            if self.buffer.len() >= limit {
                return Err(Error::Handshake(HandshakeError::MessageTooLarge));
            }

            match self.fill(signal).await {
                Ok(()) => {}
                Err(Error::Closed) => {
                    return Err(Error::Handshake(HandshakeError::ConnectionClosed));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R> Reader<R> {
    fn release(&mut self) {
        self.inner = None;
        self.buffer = BytesMut::new();
        self.carry = Bytes::new();
        self.scratch.release();
    }
}

#[derive(Debug)]
struct Writer<W, Rng> {
    inner: Option<W>,
    scratch: Scratch,
    rng: Rng,
    mask: bool,
}

impl<W: Write, Rng: RngCore> Writer<W, Rng> {
    async fn send(
        &mut self,
        signal: &CloseSignal,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<(), Error<W::Error>> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(Error::Closed);
        };

        let mask = self.mask.then(|| self.rng.random::<[u8; 4]>());

        let frame = Frame::new(true, opcode, payload).with_mask(mask);

        let mut scratch = self.scratch.checkout(frame.size());

        let bytes = frame.marshal(&mut scratch);

        tracing::trace!(?opcode, len = payload.len(), "Writing frame");

        write_all(inner, bytes, signal).await
    }

    /// Writes raw bytes and flushes them. Used for the HTTP heads.
    async fn send_raw(&mut self, signal: &CloseSignal, bytes: &[u8]) -> Result<(), Error<W::Error>> {
        write_all(self.inner_mut()?, bytes, signal).await?;

        self.flush(signal).await
    }

    async fn flush(&mut self, signal: &CloseSignal) -> Result<(), Error<W::Error>> {
        let inner = self.inner_mut()?;

        let flush = pin!(inner.flush());
        let closed = pin!(signal.closed(Side::Write));

        match select(flush, closed).await {
            Either::Left((flushed, _)) => flushed.map_err(Error::from_io),
            Either::Right(_) => Err(Error::Closed),
        }
    }

    async fn switching_protocols(
        &mut self,
        signal: &CloseSignal,
        sec_accept: &str,
        additional_headers: &[Header<'_>],
    ) -> Result<(), Error<W::Error>> {
        let headers = &[
            Header {
                name: "upgrade",
                value: b"websocket",
            },
            Header {
                name: "connection",
                value: b"Upgrade",
            },
            Header {
                name: "sec-websocket-accept",
                value: sec_accept.as_bytes(),
            },
        ];

        let mut response = Vec::new();

        Response::switching_protocols(headers, additional_headers).encode(&mut response);

        self.send_raw(signal, &response).await
    }

    fn inner_mut(&mut self) -> Result<&mut W, Error<W::Error>> {
        self.inner.as_mut().ok_or(Error::Closed)
    }
}

impl<W, Rng> Writer<W, Rng> {
    fn release(&mut self) {
        self.inner = None;
        self.scratch.release();
    }
}

/// Writes all of `buf`, treating a zero-length write as end of stream.
async fn write_all<W: Write>(
    inner: &mut W,
    mut buf: &[u8],
    signal: &CloseSignal,
) -> Result<(), Error<W::Error>> {
    while !buf.is_empty() {
        let written = {
            let write = pin!(inner.write(buf));
            let closed = pin!(signal.closed(Side::Write));

            match select(write, closed).await {
                Either::Left((written, _)) => written,
                Either::Right(_) => return Err(Error::Closed),
            }
        };

        match written.map_err(Error::from_io)? {
            0 => return Err(Error::Closed),
            n => buf = &buf[n..],
        }
    }

    Ok(())
}

/// A WebSocket connection over a split transport.
///
/// Reads and writes are guarded by two independent locks: one reader and one
/// writer may run at the same time through a shared reference, while readers
/// queue behind readers and writers behind writers.
///
/// Every frame is treated as a complete message. Control frames are handed to
/// the caller like any other frame; use [`Connection::write_frame`] to answer them.
///
/// Dropping a pending read or write is safe: bytes are only committed once a
/// transport call completes. Apply deadlines by wrapping the futures in a timer.
#[derive(Debug)]
pub struct Connection<R, W, Rng> {
    role: Role,
    reader: Mutex<Reader<R>>,
    writer: Mutex<Writer<W, Rng>>,
    signal: CloseSignal,
}

impl<R, W, Rng> Connection<R, W, Rng> {
    fn new(role: Role, reader: R, writer: W, rng: Rng, buffers: BufferOptions) -> Self {
        let size = buffers.scratch_size();

        Self {
            role,
            reader: Mutex::new(Reader {
                inner: Some(reader),
                buffer: BytesMut::new(),
                carry: Bytes::new(),
                scratch: Scratch::new(size, buffers.shared),
                max_payload_len: buffers.max_payload_len,
            }),
            writer: Mutex::new(Writer {
                inner: Some(writer),
                scratch: Scratch::new(size, buffers.shared),
                rng,
                mask: matches!(role, Role::Client),
            }),
            signal: CloseSignal::default(),
        }
    }

    /// Wraps a transport that already completed the handshake as a client.
    pub fn client(reader: R, writer: W, rng: Rng, buffers: BufferOptions) -> Self {
        Self::new(Role::Client, reader, writer, rng, buffers)
    }

    /// Wraps a transport that already completed the handshake as a server.
    pub fn server(reader: R, writer: W, rng: Rng, buffers: BufferOptions) -> Self {
        Self::new(Role::Server, reader, writer, rng, buffers)
    }

    /// Returns the role fixed at construction.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` once the connection was closed, locally or by the peer.
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }
}

impl<R, W, Rng> Connection<R, W, Rng>
where
    R: Read,
    W: Write<Error = R::Error>,
    Rng: RngCore,
{
    /// Performs the client handshake and returns the connection.
    ///
    /// `N` is the maximum number of response headers.
    ///
    /// On failure the transport halves are dropped.
    pub async fn connect<const N: usize>(
        options: ConnectOptions<'_, '_>,
        reader: R,
        writer: W,
        rng: Rng,
    ) -> Result<Self, Error<R::Error>> {
        let mut connection = Self::client(reader, writer, rng, options.buffers);

        let signal = &connection.signal;
        let reader = connection.reader.get_mut();
        let writer = connection.writer.get_mut();

        let sec_key = handshake::generate_sec_key(&mut writer.rng);
        let sec_accept = handshake::generate_sec_accept(sec_key.as_bytes());

        let mut headers = Vec::with_capacity(5);

        if let Some(host) = options.host {
            headers.push(Header {
                name: "host",
                value: host.as_bytes(),
            });
        }

        headers.extend([
            Header {
                name: "upgrade",
                value: b"websocket",
            },
            Header {
                name: "connection",
                value: b"Upgrade",
            },
            Header {
                name: "sec-websocket-version",
                value: b"13",
            },
            Header {
                name: "sec-websocket-key",
                value: sec_key.as_bytes(),
            },
        ]);

        let mut request = Vec::new();

        Request::get(options.path, &headers, options.headers).encode(&mut request);

        writer.send_raw(signal, &request).await?;

        reader
            .read_head(signal, options.buffers.scratch_size(), |src| {
                handshake::parse_response::<N>(src, &sec_accept)
                    .map(|len| len.map(|len| ((), len)))
            })
            .await?;

        tracing::debug!(path = options.path, "Client handshake complete");

        Ok(connection)
    }

    /// Reads an upgrade request from the transport, answers it and returns the connection.
    ///
    /// `N` is the maximum number of request headers.
    ///
    /// A request that is not a `GET` is answered with `405`, one that is not a
    /// websocket upgrade or has no key with `400`. The transport halves are
    /// dropped on any failure.
    pub async fn accept<const N: usize>(
        options: AcceptOptions<'_, '_>,
        reader: R,
        writer: W,
        rng: Rng,
    ) -> Result<Self, Error<R::Error>> {
        let mut connection = Self::server(reader, writer, rng, options.buffers);

        let signal = &connection.signal;
        let reader = connection.reader.get_mut();
        let writer = connection.writer.get_mut();

        let accepted = reader
            .read_head(
                signal,
                options.buffers.scratch_size(),
                handshake::parse_request::<N>,
            )
            .await?;

        let sec_accept = match accepted {
            Ok(sec_accept) => sec_accept,
            Err(err) => {
                tracing::warn!(%err, "Rejecting upgrade request");

                if let Some((code, reason, body)) = handshake::rejection(&err) {
                    let headers = &[
                        Header {
                            name: "content-type",
                            value: b"text/plain; charset=utf-8",
                        },
                        Header {
                            name: "connection",
                            value: b"close",
                        },
                    ];

                    let mut response = Vec::new();

                    Response::rejection(code, reason, headers, body).encode(&mut response);

                    // The request fails either way.
                    let _ = writer.send_raw(signal, &response).await;
                }

                return Err(Error::Handshake(err));
            }
        };

        writer
            .switching_protocols(signal, &sec_accept, options.headers)
            .await?;

        tracing::debug!("Server handshake complete");

        Ok(connection)
    }

    /// Completes the server handshake for a transport whose upgrade request was
    /// already read elsewhere, given its `sec-websocket-key`.
    pub async fn upgrade(
        options: AcceptOptions<'_, '_>,
        sec_key: &[u8],
        reader: R,
        writer: W,
        rng: Rng,
    ) -> Result<Self, Error<R::Error>> {
        let mut connection = Self::server(reader, writer, rng, options.buffers);

        let sec_accept = handshake::generate_sec_accept(sec_key);

        connection
            .writer
            .get_mut()
            .switching_protocols(&connection.signal, &sec_accept, options.headers)
            .await?;

        tracing::debug!("Server handshake complete");

        Ok(connection)
    }

    /// Decodes the next frame into `frame`, reading from the transport as needed.
    ///
    /// End of stream closes the connection.
    async fn next_frame(
        &self,
        reader: &mut Reader<R>,
        frame: &mut FrameBuf,
    ) -> Result<(), Error<R::Error>> {
        if self.signal.is_closed() {
            reader.release();

            return Err(Error::Closed);
        }

        loop {
            if frame.decode(&mut reader.buffer, reader.max_payload_len)? {
                tracing::trace!(
                    opcode = ?frame.opcode(),
                    len = frame.payload().len(),
                    "Decoded frame"
                );

                return Ok(());
            }

            match reader.fill(&self.signal).await {
                Ok(()) => {}
                Err(Error::Closed) => {
                    self.shutdown(reader);

                    return Err(Error::Closed);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn shutdown(&self, reader: &mut Reader<R>) {
        if self.signal.close() {
            tracing::debug!(role = ?self.role, "Connection closed by peer");
        }

        reader.release();

        // A busy writer fails on its own once it sees the signal.
        if let Some(mut writer) = self.writer.try_lock() {
            writer.release();
        }
    }

    /// Reads the next frame.
    ///
    /// The frame is checked out of the process-wide frame pool and returns to it on drop.
    pub async fn read_frame(&self) -> Result<Pooled<FrameBuf>, Error<R::Error>> {
        let mut reader = self.reader.lock().await;
        let mut frame = pool::frame();

        self.next_frame(&mut reader, &mut frame).await?;

        Ok(frame)
    }

    /// Sends a single final frame.
    pub async fn write_frame(&self, opcode: OpCode, payload: &[u8]) -> Result<(), Error<R::Error>> {
        let mut writer = self.writer.lock().await;

        if self.signal.is_closed() {
            writer.release();

            return Err(Error::Closed);
        }

        let sent = writer.send(&self.signal, opcode, payload).await;

        self.settle(&mut writer, sent)
    }

    /// Reads payload bytes as a stream, regardless of frame boundaries.
    ///
    /// Payload that does not fit into `dst` is kept for the next call. Empty
    /// frames are skipped, so `Ok(0)` is only returned for an empty `dst`.
    pub async fn read(&self, dst: &mut [u8]) -> Result<usize, Error<R::Error>> {
        if dst.is_empty() {
            return Ok(0);
        }

        let mut reader = self.reader.lock().await;

        if reader.carry.is_empty() {
            let mut frame = pool::frame();

            loop {
                self.next_frame(&mut reader, &mut frame).await?;

                if !frame.payload().is_empty() {
                    break;
                }
            }

            reader.carry = frame.take_payload();
        }

        let n = dst.len().min(reader.carry.len());

        dst[..n].copy_from_slice(&reader.carry[..n]);
        reader.carry.advance(n);

        Ok(n)
    }

    /// Sends `src` as one binary frame.
    pub async fn write(&self, src: &[u8]) -> Result<usize, Error<R::Error>> {
        if src.is_empty() {
            return Ok(0);
        }

        self.write_frame(OpCode::Binary, src).await?;

        Ok(src.len())
    }

    /// Flushes the write half.
    pub async fn flush(&self) -> Result<(), Error<R::Error>> {
        let mut writer = self.writer.lock().await;

        if self.signal.is_closed() {
            writer.release();

            return Err(Error::Closed);
        }

        let flushed = writer.flush(&self.signal).await;

        self.settle(&mut writer, flushed)
    }

    /// Drops the write half when a write was cut short by a close that happened meanwhile.
    ///
    /// The read path only releases the writer when its lock is free, so a write
    /// in flight during an implicit close has to release it here.
    fn settle(
        &self,
        writer: &mut Writer<W, Rng>,
        result: Result<(), Error<R::Error>>,
    ) -> Result<(), Error<R::Error>> {
        if matches!(result, Err(Error::Closed)) && self.signal.is_closed() {
            writer.release();
        }

        result
    }

    /// Closes the connection.
    ///
    /// Pending reads and writes are woken and fail with [`Error::Closed`]. The
    /// write half gets one chance to flush without waiting, then both halves and
    /// all buffers are dropped. Only the first call does any of this; later calls
    /// return `Ok(())`.
    pub async fn close(&self) -> Result<(), Error<R::Error>> {
        if !self.signal.close() {
            return Ok(());
        }

        tracing::debug!(role = ?self.role, "Closing connection");

        self.reader.lock().await.release();

        let mut writer = self.writer.lock().await;

        // A flush that cannot finish right away is abandoned.
        let flushed = match writer.inner.as_mut().map(|inner| inner.flush().now_or_never()) {
            Some(Some(flushed)) => flushed.map_err(Error::from_io),
            _ => Ok(()),
        };

        writer.release();

        match flushed {
            Err(Error::Closed) => Ok(()),
            flushed => flushed,
        }
    }
}

impl<R, W, Rng> ErrorType for &Connection<R, W, Rng>
where
    R: Read,
    W: Write<Error = R::Error>,
{
    type Error = Error<R::Error>;
}

impl<R, W, Rng> Read for &Connection<R, W, Rng>
where
    R: Read,
    W: Write<Error = R::Error>,
    Rng: RngCore,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match Connection::read(*self, buf).await {
            Err(Error::Closed) => Ok(0),
            read => read,
        }
    }
}

impl<R, W, Rng> Write for &Connection<R, W, Rng>
where
    R: Read,
    W: Write<Error = R::Error>,
    Rng: RngCore,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Connection::write(*self, buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Connection::flush(*self).await
    }
}
