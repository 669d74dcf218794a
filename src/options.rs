//! Handshake and buffering options.

use crate::{frame::MAX_HEAD_SIZE, http::Header};

/// Default payload capacity of a scratch buffer.
///
/// Together with the largest frame header this makes a 64 KiB buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 65536 - MAX_HEAD_SIZE;

/// How a connection buffers reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Payload capacity of the read and write scratch buffers.
    pub buffer_size: usize,
    /// Check scratch buffers out of the process-wide pool per operation instead
    /// of owning them for the connection's whole life.
    pub shared: bool,
    /// Reject frames declaring a longer payload.
    pub max_payload_len: Option<usize>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferOptions {
    /// Owned buffers of [`DEFAULT_BUFFER_SIZE`], no payload limit.
    pub const fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            shared: false,
            max_payload_len: None,
        }
    }

    /// Sets [`BufferOptions::buffer_size`].
    pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets [`BufferOptions::shared`].
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Sets [`BufferOptions::max_payload_len`].
    pub const fn with_max_payload_len(mut self, max_payload_len: Option<usize>) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    /// Size of a scratch buffer including room for the largest header.
    pub const fn scratch_size(&self) -> usize {
        self.buffer_size + MAX_HEAD_SIZE
    }
}

/// Client handshake options.
#[derive(Debug)]
pub struct ConnectOptions<'a, 'b> {
    /// Request target.
    pub path: &'a str,
    /// Value of the `host` header, omitted if `None`.
    pub host: Option<&'a str>,
    /// Additional request headers.
    pub headers: &'a [Header<'b>],
    /// Buffering of the resulting connection.
    pub buffers: BufferOptions,
}

impl Default for ConnectOptions<'_, '_> {
    fn default() -> Self {
        Self::new("/")
    }
}

impl<'a, 'b> ConnectOptions<'a, 'b> {
    /// Options for a request to `path` with no extra headers.
    pub const fn new(path: &'a str) -> Self {
        Self {
            path,
            host: None,
            headers: &[],
            buffers: BufferOptions::new(),
        }
    }

    /// Sets the request target.
    pub const fn with_path(mut self, path: &'a str) -> Self {
        self.path = path;
        self
    }

    /// Sets the `host` header.
    pub const fn with_host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the additional headers.
    pub const fn with_headers(mut self, headers: &'a [Header<'b>]) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the buffering options.
    pub const fn with_buffers(mut self, buffers: BufferOptions) -> Self {
        self.buffers = buffers;
        self
    }
}

/// Server handshake options.
#[derive(Debug, Default)]
pub struct AcceptOptions<'a, 'b> {
    /// Additional response headers.
    pub headers: &'a [Header<'b>],
    /// Buffering of the resulting connection.
    pub buffers: BufferOptions,
}

impl<'a, 'b> AcceptOptions<'a, 'b> {
    /// Sets the additional headers.
    pub const fn with_headers(mut self, headers: &'a [Header<'b>]) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the buffering options.
    pub const fn with_buffers(mut self, buffers: BufferOptions) -> Self {
        self.buffers = buffers;
        self
    }
}
